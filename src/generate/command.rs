//! Generator backed by an external program.
//!
//! The prompt goes to the child's stdin and the response is read from its
//! stdout. The system prompt and temperature travel in `SPLICE_SYSTEM_PROMPT`
//! and `SPLICE_TEMPERATURE`.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use super::Generator;
use crate::error::{SpliceError, SpliceResult};

pub const SYSTEM_PROMPT_ENV: &str = "SPLICE_SYSTEM_PROMPT";
pub const TEMPERATURE_ENV: &str = "SPLICE_TEMPERATURE";

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    id: String,
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { id: format!("command:{}", program), program, args }
    }

    fn spawn(&self, prompt: &str, system: Option<&str>, temperature: f64) -> SpliceResult<Child> {
        tracing::debug!("Spawning generator command: {} {:?}", self.program, self.args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(SYSTEM_PROMPT_ENV, system.unwrap_or(""))
            .env(TEMPERATURE_ENV, temperature.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpliceError::Generator(format!("failed to start '{}': {}", self.program, e)))?;

        // Feed stdin from a thread so a chatty child cannot deadlock on a full pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let payload = prompt.as_bytes().to_vec();
            thread::spawn(move || {
                if let Err(e) = stdin.write_all(&payload) {
                    tracing::debug!("Generator stdin closed early: {}", e);
                }
            });
        }
        Ok(child)
    }

    /// Collect stderr on a thread so a child that fills it cannot stall
    /// while stdout is still being read.
    fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
        let mut pipe = child.stderr.take()?;
        Some(thread::spawn(move || {
            let mut stderr = String::new();
            let _ = pipe.read_to_string(&mut stderr);
            stderr
        }))
    }

    fn finish(&self, mut child: Child, stderr: Option<JoinHandle<String>>) -> SpliceResult<()> {
        let status = child.wait()?;
        let stderr = stderr.and_then(|handle| handle.join().ok()).unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        Err(SpliceError::Generator(format!(
            "'{}' exited with {}: {}",
            self.program,
            status,
            stderr.trim()
        )))
    }
}

impl Generator for CommandGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate(&self, prompt: &str, system: Option<&str>, temperature: f64) -> SpliceResult<String> {
        let child = self.spawn(prompt, system, temperature)?;
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SpliceError::Generator(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn stream(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f64,
        on_chunk: &mut dyn FnMut(&str),
    ) -> SpliceResult<String> {
        let mut child = self.spawn(prompt, system, temperature)?;
        let stderr = Self::drain_stderr(&mut child);
        let mut text = String::new();
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            while reader.read_line(&mut line)? > 0 {
                on_chunk(&line);
                text.push_str(&line);
                line.clear();
            }
        }
        self.finish(child, stderr)?;
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn echoes_prompt_through_cat() {
        let generator = CommandGenerator::new("cat".into(), vec![]);
        assert_eq!(generator.generate("def f():\n    pass\n", None, 0.0).expect("cat"), "def f():\n    pass\n");
    }

    #[test]
    fn passes_system_prompt_in_environment() {
        let generator = CommandGenerator::new(
            "sh".into(),
            vec!["-c".into(), format!("cat >/dev/null; printf '%s' \"${}\"", SYSTEM_PROMPT_ENV)],
        );
        assert_eq!(generator.generate("ignored", Some("be terse"), 0.0).expect("sh"), "be terse");
    }

    #[test]
    fn streams_line_by_line() {
        let generator = CommandGenerator::new("cat".into(), vec![]);
        let mut chunks = Vec::new();
        let text = generator
            .stream("a\nb\n", None, 0.0, &mut |c| chunks.push(c.to_string()))
            .expect("stream");
        assert_eq!(text, "a\nb\n");
        assert_eq!(chunks, vec!["a\n".to_string(), "b\n".to_string()]);
    }

    #[test]
    fn streaming_survives_a_flood_on_stderr() {
        let generator = CommandGenerator::new(
            "sh".into(),
            vec!["-c".into(), "cat >/dev/null; head -c 200000 /dev/zero | tr '\\0' x >&2; echo done".into()],
        );
        let mut chunks = Vec::new();
        let text = generator
            .stream("x", None, 0.0, &mut |c| chunks.push(c.to_string()))
            .expect("stream");
        assert_eq!(text, "done\n");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn streaming_failure_reports_stderr() {
        let generator = CommandGenerator::new("sh".into(), vec!["-c".into(), "echo partial; echo boom >&2; exit 2".into()]);
        let err = generator.stream("x", None, 0.0, &mut |_| {}).expect_err("must fail");
        assert!(matches!(err, SpliceError::Generator(ref m) if m.contains("boom")));
    }

    #[test]
    fn non_zero_exit_is_a_generator_error() {
        let generator = CommandGenerator::new("sh".into(), vec!["-c".into(), "echo boom >&2; exit 3".into()]);
        let err = generator.generate("x", None, 0.0).expect_err("must fail");
        assert!(matches!(err, SpliceError::Generator(ref m) if m.contains("boom")));
    }

    #[test]
    fn missing_program_is_a_generator_error() {
        let generator = CommandGenerator::new("definitely-not-a-real-binary-xyz".into(), vec![]);
        assert!(matches!(generator.generate("x", None, 0.0), Err(SpliceError::Generator(_))));
    }
}

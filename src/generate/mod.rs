//! External generator capability.
//!
//! Everything the dispatcher needs from a code generator is the narrow
//! [`Generator`] trait. Concrete providers are chosen once from a
//! [`ProviderSpec`] by [`build_generator`] and handed around as
//! `Arc<dyn Generator>`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ProviderSpec;
use crate::error::{SpliceError, SpliceResult};

pub mod command;
pub mod retry;
pub mod scripted;

pub use command::CommandGenerator;
pub use retry::{call_with_retry, clean_code, GenerationCall};
pub use scripted::ScriptedGenerator;

/// Synchronous text generation.
pub trait Generator: Send + Sync {
    /// Stable identifier used as the registry key.
    fn id(&self) -> &str;

    fn generate(&self, prompt: &str, system: Option<&str>, temperature: f64) -> SpliceResult<String>;

    /// Streaming variant. Providers without incremental output deliver the
    /// whole response as one chunk.
    fn stream(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f64,
        on_chunk: &mut dyn FnMut(&str),
    ) -> SpliceResult<String> {
        let text = self.generate(prompt, system, temperature)?;
        on_chunk(&text);
        Ok(text)
    }
}

/// Resolve a provider spec into a ready generator.
pub fn build_generator(spec: &ProviderSpec) -> SpliceResult<Arc<dyn Generator>> {
    match spec {
        ProviderSpec::Scripted { responses } => {
            Ok(Arc::new(ScriptedGenerator::new(responses.iter().cloned())))
        }
        ProviderSpec::Command { program, args } => {
            if program.trim().is_empty() {
                return Err(SpliceError::Generator("command provider needs a program".into()));
            }
            Ok(Arc::new(CommandGenerator::new(program.clone(), args.clone())))
        }
    }
}

/// Generators available to a run, keyed by [`Generator::id`].
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
    default_id: Option<String>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding the configured provider as its default.
    pub fn from_spec(spec: &ProviderSpec) -> SpliceResult<Self> {
        let mut registry = Self::new();
        registry.register(build_generator(spec)?);
        Ok(registry)
    }

    /// Register a generator. The first one registered becomes the default.
    pub fn register(&mut self, generator: Arc<dyn Generator>) {
        let id = generator.id().to_string();
        if self.default_id.is_none() {
            self.default_id = Some(id.clone());
        }
        self.generators.insert(id, generator);
    }

    pub fn get(&self, id: &str) -> SpliceResult<Arc<dyn Generator>> {
        self.generators
            .get(id)
            .cloned()
            .ok_or_else(|| SpliceError::Generator(format!("unknown generator '{}'", id)))
    }

    pub fn default_generator(&self) -> SpliceResult<Arc<dyn Generator>> {
        match self.default_id.as_deref() {
            Some(id) => self.get(id),
            None => Err(SpliceError::Generator("no generator configured".into())),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.generators.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_scripted_generator_from_spec() {
        let generator = build_generator(&ProviderSpec::Scripted { responses: vec!["ok".into()] })
            .expect("generator");
        assert_eq!(generator.id(), "scripted");
        assert_eq!(generator.generate("p", None, 0.0).expect("text"), "ok");
    }

    #[test]
    fn command_spec_requires_program() {
        let spec = ProviderSpec::Command { program: "  ".into(), args: vec![] };
        assert!(matches!(build_generator(&spec), Err(SpliceError::Generator(_))));
    }

    #[test]
    fn registry_default_is_first_registered() {
        let mut registry = GeneratorRegistry::new();
        assert!(registry.default_generator().is_err());
        registry.register(Arc::new(ScriptedGenerator::new(["a"])));
        registry.register(Arc::new(CommandGenerator::new("cat".into(), vec![])));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.default_generator().expect("default").id(), "scripted");
        assert_eq!(registry.ids(), vec!["command:cat".to_string(), "scripted".to_string()]);
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn default_stream_delivers_one_chunk() {
        let generator = ScriptedGenerator::new(["whole reply"]);
        let mut chunks = Vec::new();
        let text = generator
            .stream("p", None, 0.0, &mut |chunk| chunks.push(chunk.to_string()))
            .expect("stream");
        assert_eq!(text, "whole reply");
        assert_eq!(chunks, vec!["whole reply".to_string()]);
    }
}

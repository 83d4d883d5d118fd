//! Source file reading with UTF-8 fast path and encoding fallback.

use anyhow::{Context, Result};
use chardetng::EncodingDetector;
use encoding_rs::UTF_8;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DEFAULT_SAMPLE_SIZE: usize = 8192;

/// Detect if a file is binary (not text).
///
/// A null byte in the sample, or fewer than 70% printable bytes, means binary.
pub fn is_binary_file(path: &Path) -> bool {
    is_binary_file_impl(path, DEFAULT_SAMPLE_SIZE).unwrap_or(true)
}

fn is_binary_file_impl(path: &Path, sample_size: usize) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut sample = vec![0u8; sample_size];
    let bytes_read = file.read(&mut sample)?;
    sample.truncate(bytes_read);
    Ok(is_binary_sample(&sample))
}

fn is_binary_sample(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let printable_count = sample
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || b == 9 || b == 10 || b == 13 || b >= 128)
        .count();
    (printable_count as f64 / sample.len() as f64) < 0.70
}

/// Decode raw file bytes into text.
///
/// Strict UTF-8 first (a UTF-8 BOM is stripped); otherwise the encoding is
/// guessed with chardetng and decoded with replacement characters.
pub fn decode_source(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, had_errors) = encoding.decode(body);
    if had_errors {
        let (lossy, _, _) = UTF_8.decode(body);
        return lossy.into_owned();
    }
    decoded.into_owned()
}

/// Read a whole source file as text, returning the raw bytes alongside so the
/// caller can hash exactly what is on disk.
pub fn read_source(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok((decode_source(&bytes), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_is_binary_null_byte() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x00, 0x01, 0x02]).unwrap();
        file.flush().unwrap();

        assert!(is_binary_file(file.path()));
    }

    #[test]
    fn test_is_not_binary_text() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("import os\nprint(os.name)\n".as_bytes()).unwrap();
        file.flush().unwrap();

        assert!(!is_binary_file(file.path()));
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"x = 1\n");
        assert_eq!(decode_source(&bytes), "x = 1\n");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "café" in windows-1252
        let text = decode_source(&[0x63, 0x61, 0x66, 0xe9]);
        assert!(text.starts_with("caf"));
        assert_eq!(text.chars().count(), 4);
    }

    #[test]
    fn test_read_source_returns_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("Test content 🚀".as_bytes()).unwrap();
        file.flush().unwrap();

        let (content, bytes) = read_source(file.path()).unwrap();
        assert_eq!(content, "Test content 🚀");
        assert_eq!(bytes, "Test content 🚀".as_bytes());
    }
}

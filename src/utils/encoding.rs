//! Safe source reading with encoding fallback.
//!
//! Source trees that survived a decade of migrations are not uniformly UTF-8.
//! Reading strategy: strict UTF-8 fast path, then chardetng detection with
//! lossy decoding, so a stray latin-1 file degrades to replacement characters
//! instead of aborting a whole-tree pass.

use anyhow::{Context, Result};
use chardetng::EncodingDetector;
use encoding_rs::UTF_8;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SAMPLE_SIZE: usize = 8192;

/// Read a source file to a `String`, decoding non-UTF-8 content best-effort.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    // Fast path: most modern source files are valid UTF-8.
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(err) => Ok(decode_lossy(&err.into_bytes())),
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    let mut detector = EncodingDetector::new();
    let sample_len = bytes.len().min(SAMPLE_SIZE);
    detector.feed(&bytes[..sample_len], sample_len == bytes.len());
    let encoding = detector.guess(None, true);

    let (decoded, _, _) = encoding.decode(bytes);
    if decoded.is_empty() && !bytes.is_empty() {
        // Detector produced nothing useful; fall back to UTF-8 replacement.
        let (decoded, _, _) = UTF_8.decode(bytes);
        return decoded.into_owned();
    }
    decoded.into_owned()
}

/// Detect if a file is binary (not text).
///
/// Null bytes are a strong indicator; otherwise a low ratio of printable
/// ASCII in the leading sample counts as binary.
pub fn is_binary_file(path: &Path) -> bool {
    is_binary_file_impl(path).unwrap_or(true)
}

fn is_binary_file_impl(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut sample = vec![0u8; SAMPLE_SIZE];
    let bytes_read = file.read(&mut sample)?;
    sample.truncate(bytes_read);

    if sample.is_empty() {
        return Ok(false);
    }

    if sample.contains(&0) {
        return Ok(true);
    }

    let printable_count = sample
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || b == 9 || b == 10 || b == 13)
        .count();

    Ok((printable_count as f64 / sample.len() as f64) < 0.70)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_utf8_content() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("import Foo from \"./Foo\"; // ✓".as_bytes()).unwrap();
        file.flush().unwrap();

        let content = read_source(file.path()).unwrap();
        assert!(content.contains("./Foo"));
        assert!(content.contains('✓'));
    }

    #[test]
    fn reads_latin1_content_lossily() {
        let mut file = NamedTempFile::new().unwrap();
        // "café" in latin-1: invalid as UTF-8
        file.write_all(&[0x63, 0x61, 0x66, 0xe9]).unwrap();
        file.flush().unwrap();

        let content = read_source(file.path()).unwrap();
        assert!(content.starts_with("caf"));
        assert_eq!(content.chars().count(), 4);
    }

    #[test]
    fn binary_detection_on_null_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x00, 0x01, 0x02]).unwrap();
        file.flush().unwrap();

        assert!(is_binary_file(file.path()));
    }

    #[test]
    fn text_is_not_binary() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"export const x = 1;\n").unwrap();
        file.flush().unwrap();

        assert!(!is_binary_file(file.path()));
    }
}

//! Tamper-evident log lines.
//!
//! Each line is suffixed with ` #<counter># #<hash>#`, where `hash` is the
//! base64 SHA-256 over the previous line's hash, the counter and the line
//! itself. Removing, reordering or editing a line breaks every hash after it.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eidas_crypto::DigestAlgorithm;
use eidas_crypto::hash::{constant_time_eq, digest_parts};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{SecurityError, SecurityResult};

#[derive(Debug, Default)]
struct ChainState {
    counter: u64,
    previous: Vec<u8>,
}

fn chain_hash(previous: &[u8], counter: u64, line: &str) -> Vec<u8> {
    let counter = counter.to_string();
    digest_parts(
        DigestAlgorithm::Sha256,
        &[previous, counter.as_bytes(), line.as_bytes()],
    )
}

/// Appends counters and chained hashes to log lines.
///
/// ## NIST 800-53 Rev5 Controls
///
/// - AU-9: Protection of audit information
#[derive(Debug, Default)]
pub struct HashAndCounterGenerator {
    state: Mutex<ChainState>,
}

impl HashAndCounterGenerator {
    /// Creates a generator starting a new chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `line` with its counter and chained hash appended.
    pub fn append(&self, line: &str) -> String {
        let mut state = self.state.lock();
        state.counter += 1;
        let hash = chain_hash(&state.previous, state.counter, line);
        let encoded = STANDARD.encode(&hash);
        let counter = state.counter;
        state.previous = hash;
        format!("{line} #{counter}# #{encoded}#")
    }

    /// Returns the counter of the last appended line.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }
}

/// Splits a chained line into message, counter and hash.
fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let rest = line.strip_suffix('#')?;
    let (rest, hash) = rest.rsplit_once(" #")?;
    let rest = rest.strip_suffix('#')?;
    let (message, counter) = rest.rsplit_once(" #")?;
    Some((message, counter, hash))
}

/// Verifies files written through [`HashAndCounterGenerator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HashFileChecker;

impl HashFileChecker {
    /// Replays `lines` and returns how many were verified. Empty lines are
    /// skipped.
    pub fn check_lines<'a, I>(lines: I) -> SecurityResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut previous = Vec::new();
        let mut expected: u64 = 1;
        let mut verified = 0;

        for (index, line) in lines.into_iter().enumerate() {
            let number = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let broken = |reason: &str| {
                warn!(line = number, reason, "log chain broken");
                SecurityError::ChainBroken {
                    line: number,
                    reason: reason.to_string(),
                }
            };

            let (message, counter, hash) = split_line(line).ok_or_else(|| broken("missing counter or hash"))?;
            let counter: u64 = counter.parse().map_err(|_| broken("invalid counter"))?;
            if counter != expected {
                return Err(broken(&format!("expected counter {expected}, found {counter}")));
            }
            let hash = STANDARD.decode(hash).map_err(|_| broken("invalid hash encoding"))?;
            let computed = chain_hash(&previous, counter, message);
            if !constant_time_eq(&computed, &hash) {
                return Err(broken("hash mismatch"));
            }

            previous = computed;
            expected += 1;
            verified += 1;
        }
        debug!(verified, "log chain verified");
        Ok(verified)
    }

    /// Reads and verifies a log file.
    pub fn check_file(path: impl AsRef<Path>) -> SecurityResult<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::check_lines(content.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chain(lines: &[&str]) -> Vec<String> {
        let generator = HashAndCounterGenerator::new();
        lines.iter().map(|l| generator.append(l)).collect()
    }

    #[test]
    fn appended_line_format() {
        let generator = HashAndCounterGenerator::new();
        let line = generator.append("request received");
        assert!(line.starts_with("request received #1# #"));
        assert!(line.ends_with('#'));
        assert_eq!(generator.counter(), 1);

        let (message, counter, _) = split_line(&line).unwrap();
        assert_eq!(message, "request received");
        assert_eq!(counter, "1");
    }

    #[test]
    fn intact_chain_verifies() {
        let lines = chain(&["first", "second # with hash sign", "third"]);
        let count = HashFileChecker::check_lines(lines.iter().map(String::as_str)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn edited_line_is_detected() {
        let mut lines = chain(&["first", "second", "third"]);
        lines[1] = lines[1].replacen("second", "s3cond", 1);
        let err = HashFileChecker::check_lines(lines.iter().map(String::as_str)).unwrap_err();
        assert!(matches!(err, SecurityError::ChainBroken { line: 2, .. }));
    }

    #[test]
    fn removed_line_is_detected() {
        let mut lines = chain(&["first", "second", "third"]);
        lines.remove(1);
        let err = HashFileChecker::check_lines(lines.iter().map(String::as_str)).unwrap_err();
        assert!(matches!(err, SecurityError::ChainBroken { line: 2, .. }));
    }

    #[test]
    fn unchained_line_is_detected() {
        let err = HashFileChecker::check_lines(["plain line"]).unwrap_err();
        assert!(matches!(err, SecurityError::ChainBroken { line: 1, .. }));
    }

    #[test]
    fn file_check() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in chain(&["a", "b", "c", "d"]) {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        assert_eq!(HashFileChecker::check_file(file.path()).unwrap(), 4);

        let missing = HashFileChecker::check_file("/nonexistent/eidas.log").unwrap_err();
        assert!(matches!(missing, SecurityError::Io(_)));
    }
}

//! The deletion ledger and the per-round frontier.
//!
//! The ledger is the pipeline's only durable state: an append-only, plain-text
//! log of canonical specifiers for deleted files, one per line, partitioned
//! into rounds by a sentinel marker line. The driver snapshots the current
//! partition into an in-process [`Frontier`] before each round, writes a
//! boundary marker, lets the round append, then compacts the file down to the
//! entries the round produced. An empty ledger after compaction means the
//! fixpoint is reached.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::MatchMode;

/// Round boundary sentinel. Cannot collide with an entry: every canonical
/// specifier starts with `@`.
const ROUND_MARKER: &str = "#round";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only, round-partitioned deletion log.
///
/// Appends are safe under concurrent writers within a round; entry order
/// inside a round is not significant. All other operations are driver-side
/// and sequential.
pub struct Ledger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl Ledger {
    /// Create (or truncate) the ledger at `path`. The pipeline must never
    /// inherit entries from a previous run.
    pub fn create(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
        std::fs::write(path, "").map_err(|e| io_err(path, e))?;
        let writer = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        Ok(Self { path: path.to_path_buf(), writer: Mutex::new(writer) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably record one canonical specifier.
    pub fn append(&self, specifier: &str) -> Result<(), LedgerError> {
        debug_assert!(!specifier.contains('\n'));
        let mut file = self.writer.lock().expect("ledger writer poisoned");
        writeln!(file, "{specifier}").map_err(|e| io_err(&self.path, e))?;
        file.flush().map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Substring membership test over the serialized log. Callers must pass
    /// the exact canonical specifier; partial strings can false-positive.
    pub fn contains_text(&self, needle: &str) -> Result<bool, LedgerError> {
        Ok(self.read_all()?.contains(needle))
    }

    /// Append the round boundary sentinel.
    pub fn mark_round_boundary(&self) -> Result<(), LedgerError> {
        let mut file = self.writer.lock().expect("ledger writer poisoned");
        writeln!(file, "{ROUND_MARKER}").map_err(|e| io_err(&self.path, e))?;
        file.flush().map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Discard everything up to and including the most recent boundary
    /// marker, leaving only entries appended after it. No-op when the log
    /// holds no marker.
    pub fn compact_to_latest_round(&self) -> Result<(), LedgerError> {
        let content = self.read_all()?;
        let lines: Vec<&str> = content.lines().collect();
        let Some(last_marker) = lines.iter().rposition(|l| *l == ROUND_MARKER) else {
            return Ok(());
        };

        let mut kept = String::new();
        for line in &lines[last_marker + 1..] {
            kept.push_str(line);
            kept.push('\n');
        }

        let mut file = self.writer.lock().expect("ledger writer poisoned");
        std::fs::write(&self.path, kept).map_err(|e| io_err(&self.path, e))?;
        // Reopen the append handle so its cursor tracks the rewritten file on
        // every platform.
        *file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Entries of the current partition, in log order.
    pub fn entries(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .read_all()?
            .lines()
            .filter(|l| !l.is_empty() && *l != ROUND_MARKER)
            .map(str::to_string)
            .collect())
    }

    /// Termination test: no entries survived the latest compaction.
    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.entries()?.is_empty())
    }

    fn read_all(&self) -> Result<String, LedgerError> {
        std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io { path: path.to_path_buf(), source }
}

/// Immutable snapshot of the specifiers deleted in the previous round — the
/// only input a closure round needs. Taken before the round's boundary marker
/// is written, so appends made during the round never affect its matching.
#[derive(Debug, Clone)]
pub struct Frontier {
    entries: BTreeSet<String>,
    serialized: String,
    mode: MatchMode,
}

impl Frontier {
    pub fn new(entries: Vec<String>, mode: MatchMode) -> Self {
        let serialized = entries.join("\n");
        Self { entries: entries.into_iter().collect(), serialized, mode }
    }

    /// Test a resolved canonical specifier against the frontier.
    pub fn matches(&self, specifier: &str) -> bool {
        match self.mode {
            MatchMode::Exact => self.entries.contains(specifier),
            MatchMode::Substring => self.serialized.contains(specifier),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_in(dir: &TempDir) -> Ledger {
        Ledger::create(&dir.path().join("ledger")).unwrap()
    }

    #[test]
    fn create_truncates_previous_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger");
        std::fs::write(&path, "@stale/Entry\n").unwrap();

        let ledger = Ledger::create(&path).unwrap();
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn round_lifecycle_keeps_only_latest_partition() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger_in(&tmp);

        ledger.append("@stores/Foo").unwrap();
        assert_eq!(ledger.entries().unwrap(), vec!["@stores/Foo"]);

        ledger.mark_round_boundary().unwrap();
        ledger.append("@widgets/Bar").unwrap();
        ledger.compact_to_latest_round().unwrap();

        assert_eq!(ledger.entries().unwrap(), vec!["@widgets/Bar"]);
        assert!(!ledger.is_empty().unwrap());
    }

    #[test]
    fn compaction_after_empty_round_empties_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger_in(&tmp);

        ledger.append("@widgets/Baz").unwrap();
        ledger.mark_round_boundary().unwrap();
        // Round produced nothing.
        ledger.compact_to_latest_round().unwrap();

        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn compaction_without_marker_is_noop() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger_in(&tmp);

        ledger.append("@stores/Foo").unwrap();
        ledger.compact_to_latest_round().unwrap();
        assert_eq!(ledger.entries().unwrap(), vec!["@stores/Foo"]);
    }

    #[test]
    fn serialized_format_is_line_oriented() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger_in(&tmp);

        ledger.append("@stores/Foo").unwrap();
        ledger.mark_round_boundary().unwrap();
        ledger.append("@widgets/Bar").unwrap();

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        insta::assert_snapshot!(content, @r###"
        @stores/Foo
        #round
        @widgets/Bar
        "###);
    }

    #[test]
    fn appends_are_safe_under_concurrent_writers() {
        let tmp = TempDir::new().unwrap();
        let ledger = std::sync::Arc::new(ledger_in(&tmp));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        ledger.append(&format!("@mod/T{t}N{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 200);
        // Every line intact — no interleaved partial writes.
        assert!(entries.iter().all(|e| e.starts_with("@mod/T")));
    }

    #[test]
    fn contains_text_is_a_substring_test() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger_in(&tmp);
        ledger.append("@stores/FooBar").unwrap();

        // The documented hazard: a shorter specifier is found inside a longer
        // entry. Exact frontier matching exists because of this.
        assert!(ledger.contains_text("@stores/Foo").unwrap());
        assert!(ledger.contains_text("@stores/FooBar").unwrap());
        assert!(!ledger.contains_text("@stores/Quux").unwrap());
    }

    #[test]
    fn frontier_exact_vs_substring_matching() {
        let entries = vec!["@stores/FooBar".to_string()];

        let exact = Frontier::new(entries.clone(), MatchMode::Exact);
        assert!(!exact.matches("@stores/Foo"));
        assert!(exact.matches("@stores/FooBar"));

        let substring = Frontier::new(entries, MatchMode::Substring);
        assert!(substring.matches("@stores/Foo"));
        assert!(substring.matches("@stores/FooBar"));
    }
}

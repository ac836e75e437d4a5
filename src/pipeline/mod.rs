//! Migration passes and the fixpoint driver.
//!
//! One "sweep" is a full-tree run of the rewrite engine: per-file work is
//! independent and runs in parallel; deleting a flagged file and appending
//! its canonical specifier to the ledger happen inside the per-file task.
//! The frontier a closure round matches against is snapshotted before the
//! round starts, so nothing a sweep appends can influence its own matching.

pub mod closure;
pub mod driver;
pub mod seed;

pub use driver::Driver;

use anyhow::{Context, Result};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{DeleteFailure, DeletedFile, PassReport, SourceFile};
use crate::engine::{EngineError, RewriteEngine, Rule};
use crate::ledger::Ledger;
use crate::utils::read_source;

/// Deletes files, or pretends to under `--dry-run`.
///
/// Simulated deletions are tracked so dry-run rounds see the same shrinking
/// tree a destructive run would: a file "deleted" in round N is invisible to
/// round N+1's scan.
pub struct Deleter {
    dry_run: bool,
    simulated: Mutex<HashSet<PathBuf>>,
}

impl Deleter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run, simulated: Mutex::new(HashSet::new()) }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn delete(&self, path: &Path) -> std::io::Result<()> {
        if self.dry_run {
            self.simulated.lock().expect("deleter poisoned").insert(path.to_path_buf());
            return Ok(());
        }
        std::fs::remove_file(path)
    }

    pub fn is_deleted(&self, path: &Path) -> bool {
        self.dry_run && self.simulated.lock().expect("deleter poisoned").contains(path)
    }
}

/// Shared collaborators for one sweep.
pub struct SweepContext<'a> {
    pub engine: &'a RewriteEngine,
    pub ledger: &'a Ledger,
    pub deleter: &'a Deleter,
    pub show_progress: bool,
}

enum FileOutcome {
    Deleted(DeletedFile),
    DeleteFailed(DeleteFailure),
    Rewritten,
    ParseSkipped(String),
    Clean,
}

/// Run one full-tree sweep of `rules` over `files`.
///
/// Flagged files are deleted and recorded in the ledger; files the rules
/// merely edited are written back in place. Ledger failures abort the run
/// (the ledger is the pipeline's only state); everything else degrades
/// per-file.
pub fn sweep(
    label: &str,
    files: &[SourceFile],
    rules: &[Box<dyn Rule>],
    ctx: &SweepContext<'_>,
) -> Result<PassReport> {
    let progress = if ctx.show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{msg:12} [{bar:30}] {pos}/{len}")
                .expect("valid progress template")
                .progress_chars("=> "),
        );
        pb.set_message(label.to_string());
        pb
    } else {
        ProgressBar::hidden()
    };

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .progress_with(progress)
        .map(|file| process_file(file, rules, ctx))
        .collect::<Result<_>>()?;

    let mut report = PassReport { files_scanned: files.len(), ..PassReport::default() };
    for outcome in outcomes {
        match outcome {
            FileOutcome::Deleted(record) => report.deleted.push(record),
            FileOutcome::DeleteFailed(failure) => report.delete_failures.push(failure),
            FileOutcome::Rewritten => report.files_rewritten += 1,
            FileOutcome::ParseSkipped(path) => report.parse_failures.push(path),
            FileOutcome::Clean => {}
        }
    }
    // Deterministic report output regardless of worker interleaving.
    report.deleted.sort_by(|a, b| a.path.cmp(&b.path));
    report.delete_failures.sort_by(|a, b| a.path.cmp(&b.path));
    report.parse_failures.sort();
    Ok(report)
}

fn process_file(
    file: &SourceFile,
    rules: &[Box<dyn Rule>],
    ctx: &SweepContext<'_>,
) -> Result<FileOutcome> {
    let source = match read_source(&file.path) {
        Ok(source) => source,
        Err(err) => {
            warn!("skipping unreadable file {}: {err:#}", file.rel_path);
            return Ok(FileOutcome::ParseSkipped(file.rel_path.clone()));
        }
    };

    let outcome = match ctx.engine.apply(rules, file, &source) {
        Ok(outcome) => outcome,
        Err(err @ EngineError::Parse { .. }) => {
            debug!("{err}; skipped for this pass");
            return Ok(FileOutcome::ParseSkipped(file.rel_path.clone()));
        }
        Err(err) => {
            warn!("{err}; file left untouched");
            return Ok(FileOutcome::ParseSkipped(file.rel_path.clone()));
        }
    };

    if let Some(signal) = outcome.signals.first() {
        let specifier = file.canonical_specifier();
        let delete_result = ctx.deleter.delete(&file.path);
        // The ledger entry is written even when deletion fails: the closure
        // must still propagate through this module. The failure surfaces in
        // the final report.
        ctx.ledger
            .append(&specifier)
            .with_context(|| format!("recording deletion of {}", file.rel_path))?;
        debug!(rule = signal.rule, matched = %signal.matched, "flagged {}", file.rel_path);

        return Ok(match delete_result {
            Ok(()) => FileOutcome::Deleted(DeletedFile {
                path: file.rel_path.clone(),
                specifier,
                matched: signal.matched.clone(),
                content_sha: short_sha(&source),
            }),
            Err(err) => {
                warn!("failed to delete {}: {err}", file.rel_path);
                FileOutcome::DeleteFailed(DeleteFailure {
                    path: file.rel_path.clone(),
                    reason: err.to_string(),
                })
            }
        });
    }

    if outcome.changed {
        if !ctx.deleter.dry_run() {
            if let Err(err) = std::fs::write(&file.path, &outcome.text) {
                warn!("failed to write rewritten {}: {err}", file.rel_path);
                return Ok(FileOutcome::Clean);
            }
        }
        debug!(rules = ?outcome.fired, "rewrote {}", file.rel_path);
        return Ok(FileOutcome::Rewritten);
    }

    Ok(FileOutcome::Clean)
}

/// First 16 hex chars of the content's SHA-256; the report's audit handle
/// for a deleted file.
fn short_sha(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    format!("{hash:x}")[..16].to_string()
}

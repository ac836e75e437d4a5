//! Core domain types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{canonical_dir, canonical_specifier};

/// Languages the rewrite engine can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl Lang {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(Lang::TypeScript),
            "tsx" => Some(Lang::Tsx),
            "js" => Some(Lang::JavaScript),
            "jsx" => Some(Lang::Jsx),
            _ => None,
        }
    }
}

/// One file discovered by a tree scan.
///
/// The canonical specifier is derived from the path at construction and used
/// for ledger entries; `canonical_dir` anchors relative-import resolution.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scan root, forward slashes.
    pub rel_path: String,
    /// Path relative to the package root, forward slashes.
    pub pkg_rel_path: String,
    pub language: Lang,
}

impl SourceFile {
    pub fn new(path: PathBuf, rel_path: String, pkg_rel_path: String, language: Lang) -> Self {
        Self { path, rel_path, pkg_rel_path, language }
    }

    pub fn canonical_specifier(&self) -> String {
        canonical_specifier(&self.pkg_rel_path)
    }

    pub fn canonical_dir(&self) -> String {
        canonical_dir(&self.canonical_specifier()).to_string()
    }
}

/// How closure matching compares resolved import specifiers to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Whole-entry comparison. `@stores/Foo` does not match `@stores/FooBar`.
    #[default]
    Exact,
    /// Substring comparison over the serialized frontier, as the original
    /// migration scripts did. Kept behind a compatibility flag.
    Substring,
}

/// A file removed (or slated for removal under `--dry-run`) by a pass.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedFile {
    pub path: String,
    pub specifier: String,
    /// Frontier entry (or seed module) whose match caused the deletion.
    pub matched: String,
    /// First 16 hex chars of the SHA-256 of the file content at deletion time.
    pub content_sha: String,
}

/// A deletion that failed. The ledger entry is written regardless, so the
/// tree may still hold a file the ledger records as deleted; surfacing these
/// lets a caller assert that never happened.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of one full-tree sweep (seed pass or one closure round).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub deleted: Vec<DeletedFile>,
    pub delete_failures: Vec<DeleteFailure>,
    /// Files skipped this pass because they did not parse. Re-evaluated fresh
    /// on every later pass; never deleted, never recorded in the ledger.
    pub parse_failures: Vec<String>,
}

impl PassReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// One closure round: the frontier it started from and what it swept.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: usize,
    pub frontier: Vec<String>,
    #[serde(flatten)]
    pub pass: PassReport,
}

/// Full pipeline run, serialized with `--report`.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub root: String,
    pub seed_module: String,
    pub dry_run: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub seed: PassReport,
    pub rounds: Vec<RoundReport>,
}

impl PipelineReport {
    pub fn total_deleted(&self) -> usize {
        self.seed.deleted_count()
            + self.rounds.iter().map(|r| r.pass.deleted_count()).sum::<usize>()
    }

    pub fn total_delete_failures(&self) -> usize {
        self.seed.delete_failures.len()
            + self.rounds.iter().map(|r| r.pass.delete_failures.len()).sum::<usize>()
    }

    pub fn total_parse_failures(&self) -> usize {
        self.seed.parse_failures.len()
            + self.rounds.iter().map(|r| r.pass.parse_failures.len()).sum::<usize>()
    }
}

//! Configuration loading
//!
//! Settings come from a config file discovered next to the tree root (or
//! passed explicitly), with CLI arguments taking precedence over file values.

pub mod loader;

pub use loader::load_config;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::MatchMode;
use crate::scan::scanner::default_exclude_globs;

/// A `from -> to` rename, for import paths or JSX tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePair {
    pub from: String,
    pub to: String,
}

/// File-level configuration for `repo-migrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tree root to scan. Usually given on the command line instead.
    pub path: Option<PathBuf>,
    /// Directory canonical specifiers are derived relative to, as a path
    /// relative to the tree root (e.g. "src/pkg"). Defaults to the root.
    pub package_root: Option<String>,
    /// The deprecated module whose importers seed the deletion closure.
    pub seed_module: Option<String>,
    pub include_extensions: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub respect_gitignore: bool,
    pub follow_symlinks: bool,
    /// Directory nesting cap for the walk. Unbounded when absent.
    pub max_depth: Option<usize>,
    /// Closure rounds allowed before the run is declared non-converging.
    pub max_rounds: usize,
    /// Ledger file location, relative to the tree root when not absolute.
    pub ledger_path: PathBuf,
    pub match_mode: MatchMode,
    /// Import path renames applied during every sweep.
    pub rename_imports: Vec<RenamePair>,
    /// JSX tag renames applied during every sweep.
    pub rename_tags: Vec<RenamePair>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            package_root: None,
            seed_module: None,
            include_extensions: crate::utils::SOURCE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_globs: default_exclude_globs(),
            respect_gitignore: true,
            follow_symlinks: false,
            max_depth: None,
            max_rounds: 64,
            ledger_path: PathBuf::from(".migrate/ledger"),
            match_mode: MatchMode::default(),
            rename_imports: Vec::new(),
            rename_tags: Vec::new(),
        }
    }
}

impl Config {
    /// Normalize values that accept loose user input: extensions gain a
    /// leading dot, empty strings are dropped.
    pub fn normalize(&mut self) {
        self.include_extensions = self
            .include_extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('.') { e.to_string() } else { format!(".{e}") })
            .collect();
    }
}

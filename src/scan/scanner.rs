//! Tree scanner for migration passes.
//!
//! Every pass re-scans the live tree from scratch — the pipeline substitutes
//! brute-force rescans for graph traversal, so the scanner must be cheap,
//! deterministic, and honest about what it skipped. Walks with gitignore
//! support via the `ignore` crate; depth is unbounded unless capped.

use crate::domain::{Lang, SourceFile};
use crate::utils::{is_binary_file, normalize_path};
use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_skipped_extension: usize,
    pub files_skipped_glob: usize,
    pub files_skipped_binary: usize,
    pub files_included: usize,
}

/// Scanner that discovers migration-eligible source files under a root.
pub struct SourceScanner {
    root_path: PathBuf,
    package_root: PathBuf,
    include_extensions: Vec<String>,
    exclude_globs: Vec<String>,
    respect_gitignore: bool,
    follow_symlinks: bool,
    max_depth: Option<usize>,
    stats: ScanStats,
}

impl SourceScanner {
    pub fn new(root_path: PathBuf) -> Self {
        let package_root = root_path.clone();
        Self {
            root_path,
            package_root,
            include_extensions: crate::utils::SOURCE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_globs: default_exclude_globs(),
            respect_gitignore: true,
            follow_symlinks: false,
            max_depth: None,
            stats: ScanStats::default(),
        }
    }

    /// Directory canonical specifiers are derived relative to. Defaults to
    /// the scan root.
    pub fn package_root(mut self, package_root: PathBuf) -> Self {
        self.package_root = package_root;
        self
    }

    /// Set file extensions to include (e.g., ".ts", ".tsx")
    pub fn include_extensions(mut self, extensions: Vec<String>) -> Self {
        self.include_extensions = extensions;
        self
    }

    /// Set glob patterns to exclude
    pub fn exclude_globs(mut self, globs: Vec<String>) -> Self {
        self.exclude_globs = globs;
        self
    }

    /// Set whether to respect gitignore files
    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Set whether to follow symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Cap directory nesting. `None` walks arbitrarily deep.
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    fn build_exclude_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        Ok(builder.build()?)
    }

    fn language_for(&self, path: &Path) -> Option<Lang> {
        let ext = path.extension().and_then(|e| e.to_str())?.to_lowercase();
        let ext_with_dot = format!(".{ext}");
        if !self.include_extensions.contains(&ext_with_dot) {
            return None;
        }
        Lang::from_extension(&ext)
    }

    /// Scan the tree and return eligible files in deterministic order by
    /// relative path.
    pub fn scan(&mut self) -> Result<Vec<SourceFile>> {
        self.stats = ScanStats::default();
        let exclude_globset = self.build_exclude_globset()?;

        let dir_filter = |entry: &ignore::DirEntry| -> bool {
            if let Some(file_type) = entry.file_type() {
                if file_type.is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        // Dependency and build output trees are never part of
                        // the package source.
                        if matches!(name, "node_modules" | ".git" | "dist" | "build") {
                            return false;
                        }
                        if name.starts_with('.') {
                            return false;
                        }
                    }
                }
            }
            true
        };

        let mut builder = WalkBuilder::new(&self.root_path);
        builder
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .follow_links(self.follow_symlinks)
            .hidden(false)
            .parents(self.respect_gitignore)
            .max_depth(self.max_depth)
            .filter_entry(dir_filter);

        let mut files: Vec<SourceFile> = Vec::new();
        for entry_result in builder.build() {
            let entry = match entry_result {
                Ok(e) => e,
                Err(_) => continue,
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            self.stats.files_seen += 1;

            let rel_path = match path.strip_prefix(&self.root_path) {
                Ok(p) => normalize_path(&p.to_string_lossy()),
                Err(_) => continue,
            };

            if exclude_globset.is_match(&rel_path) {
                self.stats.files_skipped_glob += 1;
                continue;
            }

            let Some(language) = self.language_for(path) else {
                self.stats.files_skipped_extension += 1;
                continue;
            };

            if is_binary_file(path) {
                self.stats.files_skipped_binary += 1;
                continue;
            }

            // Canonical specifiers anchor to the package root; files outside
            // it fall back to the scan root.
            let pkg_rel_path = match path.strip_prefix(&self.package_root) {
                Ok(p) => normalize_path(&p.to_string_lossy()),
                Err(_) => rel_path.clone(),
            };

            self.stats.files_included += 1;
            files.push(SourceFile::new(path.to_path_buf(), rel_path, pkg_rel_path, language));
        }

        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(files)
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

pub fn default_exclude_globs() -> Vec<String> {
    ["node_modules/**", "dist/**", "build/**", "**/*.d.ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

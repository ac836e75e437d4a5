//! Rewrite command implementation
//!
//! Applies the configured rewrite rules across the tree and writes files in
//! place. No deletion, no ledger: this is the non-destructive half of a
//! migration, usually run before `prune`.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::utils::{parse_csv, parse_rename};
use crate::config::load_config;
use crate::engine::rules::{RenameImportRule, RenameTagRule};
use crate::engine::{EngineError, RewriteEngine, Rule};
use crate::scan::SourceScanner;

#[derive(Args)]
pub struct RewriteArgs {
    /// Tree root to rewrite
    #[arg(short, long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Path to config file (repo-migrate.toml or .repo-migrate.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rename an import path prefix (FROM=TO, repeatable)
    #[arg(long, value_name = "FROM=TO")]
    pub rename_import: Vec<String>,

    /// Rename a JSX tag (FROM=TO, repeatable)
    #[arg(long, value_name = "FROM=TO")]
    pub rename_tag: Vec<String>,

    /// Include only these extensions (comma-separated, e.g. '.ts,.tsx')
    #[arg(short = 'i', long, value_name = "EXTS")]
    pub include_ext: Option<String>,

    /// Exclude paths matching these globs (comma-separated)
    #[arg(short = 'e', long, value_name = "GLOBS")]
    pub exclude_glob: Option<String>,

    /// Ignore .gitignore rules
    #[arg(long)]
    pub no_gitignore: bool,

    /// Parse and report without writing anything back
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

pub fn run(args: RewriteArgs) -> Result<()> {
    let config_root = match &args.path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine working directory")?,
    };
    let mut cfg = load_config(&config_root, args.config.as_deref())?;

    if let Some(exts) = parse_csv(&args.include_ext) {
        cfg.include_extensions = exts;
        cfg.normalize();
    }
    if let Some(globs) = parse_csv(&args.exclude_glob) {
        cfg.exclude_globs = globs;
    }
    if args.no_gitignore {
        cfg.respect_gitignore = false;
    }

    let root = args
        .path
        .clone()
        .or_else(|| cfg.path.clone())
        .context("--path is required (or set `path` in the config file)")?;
    let root = root
        .canonicalize()
        .with_context(|| format!("tree root not found: {}", root.display()))?;

    let mut rules: Vec<Box<dyn Rule>> = Vec::new();
    for pair in &cfg.rename_imports {
        rules.push(Box::new(RenameImportRule::new(&pair.from, &pair.to)));
    }
    for pair in &cfg.rename_tags {
        rules.push(Box::new(RenameTagRule::new(&pair.from, &pair.to)));
    }
    for raw in &args.rename_import {
        let (from, to) = parse_rename(raw)?;
        rules.push(Box::new(RenameImportRule::new(from, to)));
    }
    for raw in &args.rename_tag {
        let (from, to) = parse_rename(raw)?;
        rules.push(Box::new(RenameTagRule::new(from, to)));
    }
    if rules.is_empty() {
        anyhow::bail!(
            "no rewrite rules given; pass --rename-import/--rename-tag or \
             configure rename_imports/rename_tags"
        );
    }

    let package_root = match &cfg.package_root {
        Some(rel) => root.join(rel),
        None => root.clone(),
    };
    let mut scanner = SourceScanner::new(root.clone())
        .package_root(package_root)
        .include_extensions(cfg.include_extensions.clone())
        .exclude_globs(cfg.exclude_globs.clone())
        .respect_gitignore(cfg.respect_gitignore)
        .follow_symlinks(cfg.follow_symlinks)
        .max_depth(cfg.max_depth);
    let files = scanner.scan()?;

    let engine = RewriteEngine::new();
    let progress = if std::io::stderr().is_terminal() {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<FileResult> = files
        .par_iter()
        .progress_with(progress)
        .map(|file| {
            let source = match crate::utils::read_source(&file.path) {
                Ok(source) => source,
                Err(err) => {
                    warn!("skipping unreadable file {}: {err:#}", file.rel_path);
                    return FileResult::Skipped;
                }
            };
            let outcome = match engine.apply(&rules, file, &source) {
                Ok(outcome) => outcome,
                Err(err @ EngineError::Parse { .. }) => {
                    debug!("{err}; skipped");
                    return FileResult::Skipped;
                }
                Err(err) => {
                    warn!("{err}; file left untouched");
                    return FileResult::Skipped;
                }
            };
            if !outcome.changed {
                return FileResult::Clean;
            }
            if !args.dry_run {
                if let Err(err) = std::fs::write(&file.path, &outcome.text) {
                    warn!("failed to write rewritten {}: {err}", file.rel_path);
                    return FileResult::Skipped;
                }
            }
            FileResult::Rewritten
        })
        .collect();

    let rewritten = results.iter().filter(|r| matches!(r, FileResult::Rewritten)).count();
    let skipped = results.iter().filter(|r| matches!(r, FileResult::Skipped)).count();

    let verb = if args.dry_run { "Would rewrite" } else { "Rewrote" };
    println!("{} {} of {} files", style(verb).bold(), rewritten, files.len());
    if skipped > 0 {
        println!(
            "{} {} file(s) skipped (unreadable or unparseable)",
            style("warning:").yellow().bold(),
            skipped
        );
    }

    Ok(())
}

enum FileResult {
    Rewritten,
    Clean,
    Skipped,
}

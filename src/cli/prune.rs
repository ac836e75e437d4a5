//! Prune command implementation

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::io::IsTerminal;
use std::path::PathBuf;

use super::utils::parse_csv;
use crate::config::load_config;
use crate::domain::{MatchMode, PipelineReport};
use crate::pipeline::Driver;

#[derive(Args)]
pub struct PruneArgs {
    /// Tree root to migrate
    #[arg(short, long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Deprecated module whose importers seed the deletion closure
    #[arg(short = 's', long, value_name = "SPECIFIER")]
    pub seed_module: Option<String>,

    /// Path to config file (repo-migrate.toml or .repo-migrate.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory canonical specifiers are derived relative to, as a path
    /// relative to the tree root (e.g. 'src/pkg')
    #[arg(long, value_name = "DIR")]
    pub package_root: Option<String>,

    /// Include only these extensions (comma-separated, e.g. '.ts,.tsx')
    #[arg(short = 'i', long, value_name = "EXTS")]
    pub include_ext: Option<String>,

    /// Exclude paths matching these globs (comma-separated)
    #[arg(short = 'e', long, value_name = "GLOBS")]
    pub exclude_glob: Option<String>,

    /// Ignore .gitignore rules
    #[arg(long)]
    pub no_gitignore: bool,

    /// Follow symbolic links when scanning
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Cap directory nesting depth (default: unbounded)
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,

    /// Abort if the closure has not converged after this many rounds
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<usize>,

    /// Ledger file location (default: .migrate/ledger under the root)
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,

    /// Match frontier entries by substring, as the legacy migration scripts
    /// did. Risks false-positive deletions on prefix-colliding specifiers.
    #[arg(long)]
    pub substring_match: bool,

    /// Report what would be deleted without touching the tree
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

pub fn run(args: PruneArgs) -> Result<()> {
    let config_root = match &args.path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine working directory")?,
    };
    let mut cfg = load_config(&config_root, args.config.as_deref())?;

    // CLI flags take precedence over file values.
    if args.seed_module.is_some() {
        cfg.seed_module = args.seed_module.clone();
    }
    if let Some(exts) = parse_csv(&args.include_ext) {
        cfg.include_extensions = exts;
        cfg.normalize();
    }
    if let Some(globs) = parse_csv(&args.exclude_glob) {
        cfg.exclude_globs = globs;
    }
    if args.package_root.is_some() {
        cfg.package_root = args.package_root.clone();
    }
    if args.no_gitignore {
        cfg.respect_gitignore = false;
    }
    if args.follow_symlinks {
        cfg.follow_symlinks = true;
    }
    if args.max_depth.is_some() {
        cfg.max_depth = args.max_depth;
    }
    if let Some(max_rounds) = args.max_rounds {
        cfg.max_rounds = max_rounds;
    }
    if let Some(ledger) = args.ledger.clone() {
        cfg.ledger_path = ledger;
    }
    if args.substring_match {
        cfg.match_mode = MatchMode::Substring;
    }

    let root = args
        .path
        .clone()
        .or_else(|| cfg.path.clone())
        .context("--path is required (or set `path` in the config file)")?;
    let root = root
        .canonicalize()
        .with_context(|| format!("tree root not found: {}", root.display()))?;

    let seed_module = cfg
        .seed_module
        .clone()
        .context("--seed-module is required (or set `seed_module` in the config file)")?;
    if !crate::utils::is_valid_specifier(&seed_module) {
        anyhow::bail!("invalid seed module specifier '{seed_module}'");
    }

    if !args.dry_run && !args.yes {
        if std::io::stderr().is_terminal() {
            let confirmed = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "Delete files under {} that depend on {}?",
                    root.display(),
                    seed_module
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }
        } else {
            anyhow::bail!(
                "refusing to delete files without --yes in a non-interactive \
                 session (use --dry-run to preview)"
            );
        }
    }

    let show_progress = std::io::stderr().is_terminal();
    let report = Driver::new(root, cfg, args.dry_run)
        .show_progress(show_progress)
        .run()?;

    print_summary(&report);

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("failed to write report to {}", report_path.display()))?;
    }

    Ok(())
}

fn print_summary(report: &PipelineReport) {
    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    println!(
        "{} {} files ({} in the seed pass, {} closure rounds)",
        style(verb).bold(),
        report.total_deleted(),
        report.seed.deleted_count(),
        report.rounds.len(),
    );

    for round in &report.rounds {
        if round.pass.deleted_count() > 0 {
            println!(
                "  round {}: {} deleted (frontier of {})",
                round.round,
                round.pass.deleted_count(),
                round.frontier.len()
            );
        }
    }

    let parse_failures = report.total_parse_failures();
    if parse_failures > 0 {
        println!(
            "{} {} file(s) skipped as unparseable; re-run after fixing them",
            style("warning:").yellow().bold(),
            parse_failures
        );
    }

    let delete_failures = report.total_delete_failures();
    if delete_failures > 0 {
        println!(
            "{} {} file(s) recorded in the ledger but not deleted:",
            style("warning:").red().bold(),
            delete_failures
        );
        for failure in report
            .seed
            .delete_failures
            .iter()
            .chain(report.rounds.iter().flat_map(|r| r.pass.delete_failures.iter()))
        {
            println!("    {} ({})", failure.path, failure.reason);
        }
    } else {
        println!("{} ledger empty, closure converged", style("ok:").green().bold());
    }
}

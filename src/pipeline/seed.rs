//! The seed pass.
//!
//! Runs exactly once, before any closure round: every file importing the
//! designated deprecated module is deleted and its canonical specifier
//! appended to the ledger, seeding the frontier for round 1. Configured
//! rename rules ride along in the same sweep and are persisted for files
//! that survive.

use anyhow::Result;

use crate::domain::{PassReport, SourceFile};
use crate::engine::rules::FlagImportRule;
use crate::engine::Rule;
use crate::pipeline::{sweep, SweepContext};

pub fn run(
    files: &[SourceFile],
    seed_module: &str,
    mut rewrite_rules: Vec<Box<dyn Rule>>,
    ctx: &SweepContext<'_>,
) -> Result<PassReport> {
    rewrite_rules.push(Box::new(FlagImportRule::new(seed_module)));
    sweep("seed", files, &rewrite_rules, ctx)
}

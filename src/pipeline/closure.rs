//! One closure round.
//!
//! Re-scans the entire remaining tree (there is no materialized dependency
//! graph to walk) and deletes every file whose imports, resolved to
//! canonical form, match the frontier the round started from. Each deleted
//! file's own canonical specifier is appended to the ledger, becoming the
//! next round's frontier after compaction. Matching never observes appends
//! made during the round: one hop per round, by construction.

use anyhow::Result;

use crate::domain::{PassReport, SourceFile};
use crate::engine::rules::FrontierRule;
use crate::engine::Rule;
use crate::ledger::Frontier;
use crate::pipeline::{sweep, SweepContext};

pub fn run(
    round: usize,
    files: &[SourceFile],
    frontier: Frontier,
    mut rewrite_rules: Vec<Box<dyn Rule>>,
    ctx: &SweepContext<'_>,
) -> Result<PassReport> {
    rewrite_rules.push(Box::new(FrontierRule::new(frontier)));
    sweep(&format!("round {round}"), files, &rewrite_rules, ctx)
}

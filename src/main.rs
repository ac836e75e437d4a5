//! repo-migrate: rewrite imports and prune transitively dead files
//!
//! This tool applies AST-level rewrite rules across a source tree and runs
//! the fixpoint deletion pipeline for codebase migrations.

use anyhow::Result;

fn main() -> Result<()> {
    repo_migrate::cli::run()
}

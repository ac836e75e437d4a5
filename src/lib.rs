//! repo-migrate: rewrite imports and prune transitively dead files
//!
//! The pipeline rewrites import statements and syntax patterns across a
//! source tree with AST-level rules, then computes — by repeated whole-tree
//! scans — the transitive closure of files that depend on a removed module,
//! deleting them as it goes. The ledger of deleted modules' canonical
//! specifiers is the only state carried between rounds.

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ledger;
pub mod pipeline;
pub mod scan;
pub mod utils;

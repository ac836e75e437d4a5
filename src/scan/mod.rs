//! Source tree scanning.

pub mod scanner;

pub use scanner::{ScanStats, SourceScanner};

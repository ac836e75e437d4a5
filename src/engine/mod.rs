//! Structural rewrite engine.
//!
//! Parses one file with tree-sitter, evaluates every rule against the parsed
//! structure, and returns the rewritten text plus the rules that fired, the
//! imports found, and any detection signals. The engine itself has no side
//! effects — callers decide whether to write the text back or delete the
//! file.
//!
//! A tree whose root contains ERROR nodes counts as a parse failure. A single
//! unparseable file must never abort a whole-tree pass: the error carries the
//! path, the caller skips and reports, and every other file proceeds.

pub mod imports;
pub mod rules;

pub use imports::{extract_imports, ImportRef};
pub use rules::{Edit, Rule, RuleContext, RuleOutcome};

use thiserror::Error;
use tree_sitter::{Language, Parser};

use crate::domain::{Lang, SourceFile};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to parse {path}")]
    Parse { path: String },
    #[error("grammar unavailable: {source}")]
    Grammar {
        #[from]
        source: tree_sitter::LanguageError,
    },
    #[error("rules produced overlapping edits in {path}")]
    ConflictingEdits { path: String },
}

/// Signal raised by a rule for one file: the detection condition fired and
/// `matched` is the specifier that triggered it.
#[derive(Debug, Clone)]
pub struct Signal {
    pub rule: &'static str,
    pub matched: String,
}

/// Result of applying a rule set to one file's source text.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub text: String,
    pub changed: bool,
    pub fired: Vec<&'static str>,
    pub imports: Vec<ImportRef>,
    pub signals: Vec<Signal>,
}

fn language_for(lang: Lang) -> Language {
    match lang {
        Lang::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Lang::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Lang::JavaScript | Lang::Jsx => tree_sitter_javascript::LANGUAGE.into(),
    }
}

#[derive(Default)]
pub struct RewriteEngine;

impl RewriteEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse `source` and evaluate `rules` in order.
    pub fn apply(
        &self,
        rules: &[Box<dyn Rule>],
        file: &SourceFile,
        source: &str,
    ) -> Result<RewriteOutcome, EngineError> {
        let mut parser = Parser::new();
        parser.set_language(&language_for(file.language))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| EngineError::Parse { path: file.rel_path.clone() })?;
        if tree.root_node().has_error() {
            return Err(EngineError::Parse { path: file.rel_path.clone() });
        }

        let imports = extract_imports(tree.root_node(), source);
        let ctx = RuleContext { file, source, tree: &tree, imports: &imports };

        let mut edits: Vec<Edit> = Vec::new();
        let mut fired = Vec::new();
        let mut signals = Vec::new();
        for rule in rules {
            let outcome = rule.apply(&ctx);
            if outcome.edits.is_empty() && outcome.flagged.is_none() {
                continue;
            }
            fired.push(rule.name());
            edits.extend(outcome.edits);
            if let Some(matched) = outcome.flagged {
                signals.push(Signal { rule: rule.name(), matched });
            }
        }

        let text = apply_edits(source, edits)
            .ok_or_else(|| EngineError::ConflictingEdits { path: file.rel_path.clone() })?;

        Ok(RewriteOutcome {
            changed: text != source,
            text,
            fired,
            imports,
            signals,
        })
    }
}

/// Splice edits into `source`. Returns `None` when spans overlap.
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> Option<String> {
    if edits.is_empty() {
        return Some(source.to_string());
    }
    edits.sort_by_key(|e| e.span.start);

    let mut out = String::with_capacity(source.len());
    let mut last = 0usize;
    for edit in &edits {
        if edit.span.start < last || edit.span.end > source.len() {
            return None;
        }
        out.push_str(&source[last..edit.span.start]);
        out.push_str(&edit.replacement);
        last = edit.span.end;
    }
    out.push_str(&source[last..]);
    Some(out)
}

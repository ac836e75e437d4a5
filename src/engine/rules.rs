//! Migration rules.
//!
//! A rule is a pure function over one parsed file: it may produce byte-range
//! edits (rewrites) and may raise a signal (the file matched a detection
//! condition, carrying the matched specifier). The engine applies edits;
//! passes act on signals. Rules never touch the filesystem.

use std::ops::Range;
use tree_sitter::Tree;

use crate::domain::SourceFile;
use crate::engine::imports::ImportRef;
use crate::ledger::Frontier;
use crate::utils::canonicalize_import;

/// Everything a rule may inspect for one file.
pub struct RuleContext<'a> {
    pub file: &'a SourceFile,
    pub source: &'a str,
    pub tree: &'a Tree,
    pub imports: &'a [ImportRef],
}

/// A single text replacement, expressed as a byte span of the original
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub edits: Vec<Edit>,
    /// Specifier whose match flagged this file, when the rule's detection
    /// condition fired.
    pub flagged: Option<String>,
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, ctx: &RuleContext<'_>) -> RuleOutcome;
}

/// Specifier match for module-level targets: the module itself or any
/// subpath of it (`@toolkit/api`, `@toolkit/api/orders`).
fn matches_module(specifier: &str, module: &str) -> bool {
    specifier == module
        || (specifier.len() > module.len()
            && specifier.starts_with(module)
            && specifier.as_bytes()[module.len()] == b'/')
}

/// Seed rule: flags any file importing the designated deprecated module.
pub struct FlagImportRule {
    module: String,
}

impl FlagImportRule {
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into() }
    }
}

impl Rule for FlagImportRule {
    fn name(&self) -> &'static str {
        "flag-deprecated-import"
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let flagged = ctx
            .imports
            .iter()
            .find(|imp| matches_module(&imp.raw, &self.module))
            .map(|_| self.module.clone());
        RuleOutcome { edits: Vec::new(), flagged }
    }
}

/// Closure rule: flags any file whose imports, resolved to canonical form,
/// hit the round's frontier. One match suffices; remaining imports are not
/// checked.
pub struct FrontierRule {
    frontier: Frontier,
}

impl FrontierRule {
    pub fn new(frontier: Frontier) -> Self {
        Self { frontier }
    }
}

impl Rule for FrontierRule {
    fn name(&self) -> &'static str {
        "flag-frontier-reference"
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let owner_dir = ctx.file.canonical_dir();
        for imp in ctx.imports {
            let Some(resolved) = canonicalize_import(&owner_dir, &imp.raw) else {
                continue;
            };
            if self.frontier.matches(&resolved) {
                return RuleOutcome { edits: Vec::new(), flagged: Some(resolved) };
            }
        }
        RuleOutcome::default()
    }
}

/// Rewrite rule: renames an import path prefix (`@plus/old` -> `@plus/new`),
/// covering the module itself and its subpaths.
pub struct RenameImportRule {
    from: String,
    to: String,
}

impl RenameImportRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

impl Rule for RenameImportRule {
    fn name(&self) -> &'static str {
        "rename-import"
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let edits = ctx
            .imports
            .iter()
            .filter(|imp| matches_module(&imp.raw, &self.from))
            .map(|imp| Edit {
                span: imp.span.start..imp.span.start + self.from.len(),
                replacement: self.to.clone(),
            })
            .collect();
        RuleOutcome { edits, flagged: None }
    }
}

/// Rewrite rule: renames a JSX element tag (`<Markdown>` -> `<RichText>`),
/// covering opening, closing, and self-closing forms. Member-expression tags
/// (`<Foo.Bar>`) are left alone.
pub struct RenameTagRule {
    from: String,
    to: String,
}

impl RenameTagRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

impl Rule for RenameTagRule {
    fn name(&self) -> &'static str {
        "rename-jsx-tag"
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut edits = Vec::new();
        collect_tag_edits(
            ctx.tree.root_node(),
            ctx.source,
            &self.from,
            &self.to,
            &mut edits,
        );
        RuleOutcome { edits, flagged: None }
    }
}

fn collect_tag_edits(
    node: tree_sitter::Node<'_>,
    source: &str,
    from: &str,
    to: &str,
    out: &mut Vec<Edit>,
) {
    if matches!(
        node.kind(),
        "jsx_opening_element" | "jsx_closing_element" | "jsx_self_closing_element"
    ) {
        if let Some(name) = node.child_by_field_name("name") {
            if name.kind() == "identifier" && name.utf8_text(source.as_bytes()) == Ok(from) {
                out.push(Edit { span: name.byte_range(), replacement: to.to_string() });
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_tag_edits(child, source, from, to, out);
    }
}

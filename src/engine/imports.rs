//! Import specifier extraction from parsed source.
//!
//! Collects every external module reference a file makes: static `import`
//! statements, `export ... from`, CommonJS `require(...)`, and dynamic
//! `import(...)`. Each reference keeps the literal specifier text as written
//! plus its byte span inside the string literal, so rules can rewrite it in
//! place and the closure pass can resolve it against the ledger.

use std::ops::Range;
use tree_sitter::Node;

/// One import reference extracted transiently during a pass. Never persisted;
/// recomputed every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// Specifier text as written, without quotes.
    pub raw: String,
    /// Byte span of the specifier text (quotes excluded).
    pub span: Range<usize>,
}

/// Walk the tree and collect all import references, in source order.
pub fn extract_imports(root: Node<'_>, source: &str) -> Vec<ImportRef> {
    let mut imports = Vec::new();
    visit(root, source, &mut imports);
    imports
}

fn visit(node: Node<'_>, source: &str, out: &mut Vec<ImportRef>) {
    match node.kind() {
        "import_statement" | "export_statement" => {
            if let Some(string_node) = node.child_by_field_name("source") {
                push_string(string_node, source, out);
            }
        }
        "call_expression" => {
            if let Some(function) = node.child_by_field_name("function") {
                let callee_is_import = function.kind() == "import";
                let callee_is_require = function.kind() == "identifier"
                    && function.utf8_text(source.as_bytes()) == Ok("require");
                if callee_is_import || callee_is_require {
                    if let Some(arg) = first_string_argument(node) {
                        push_string(arg, source, out);
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, out);
    }
}

fn first_string_argument<'tree>(call: Node<'tree>) -> Option<Node<'tree>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args.named_children(&mut cursor).next()?;
    (first.kind() == "string").then_some(first)
}

fn push_string(string_node: Node<'_>, source: &str, out: &mut Vec<ImportRef>) {
    if string_node.kind() != "string" {
        return;
    }

    // The specifier span is the string content between the quotes. Prefer the
    // string_fragment child; an empty literal has none.
    let mut cursor = string_node.walk();
    let fragment = string_node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "string_fragment");

    let span = match fragment {
        Some(frag) => frag.byte_range(),
        None => {
            let range = string_node.byte_range();
            if range.len() < 2 {
                return;
            }
            range.start + 1..range.end - 1
        }
    };

    let raw = source[span.clone()].to_string();
    out.push(ImportRef { raw, span });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse_ts(source: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    fn specs(source: &str) -> Vec<String> {
        let tree = parse_ts(source);
        extract_imports(tree.root_node(), source)
            .into_iter()
            .map(|i| i.raw)
            .collect()
    }

    #[test]
    fn extracts_static_imports() {
        let source = r#"
import Foo from "@stores/Foo";
import { computed } from "mobx";
import * as url from "./url";
"#;
        assert_eq!(specs(source), vec!["@stores/Foo", "mobx", "./url"]);
    }

    #[test]
    fn extracts_export_from() {
        let source = r#"export { Campaign } from "../model/Campaign";"#;
        assert_eq!(specs(source), vec!["../model/Campaign"]);
    }

    #[test]
    fn extracts_require_and_dynamic_import() {
        let source = r#"
const legacy = require("@legacy/core/url");
const lazy = () => import("@widgets/Bar");
"#;
        assert_eq!(specs(source), vec!["@legacy/core/url", "@widgets/Bar"]);
    }

    #[test]
    fn plain_exports_have_no_source() {
        let source = "export const x = 1;\nexport { x as y };\n";
        assert!(specs(source).is_empty());
    }

    #[test]
    fn spans_index_the_specifier_text() {
        let source = r#"import Foo from "@stores/Foo";"#;
        let tree = parse_ts(source);
        let imports = extract_imports(tree.root_node(), source);
        assert_eq!(imports.len(), 1);
        assert_eq!(&source[imports[0].span.clone()], "@stores/Foo");
    }
}

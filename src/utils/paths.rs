//! Path normalization and canonical module specifiers.
//!
//! A canonical specifier is the common currency the pipeline uses to compare
//! import targets against ledger entries: `@` followed by the file's path
//! relative to the package root, separators preserved, source extension
//! stripped. `pkg/stores/Foo.ts` under package root `pkg` becomes
//! `@stores/Foo`. It is always derived from the path, never stored.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sigil prefixing every canonical specifier. Ledger round markers rely on
/// this: any line not starting with `@` cannot be a specifier.
pub const SPECIFIER_SIGIL: char = '@';

/// Shape of a user-supplied module specifier (seed module, rename target):
/// no whitespace, no quotes. The ledger is line-oriented, so anything that
/// could smuggle a newline is rejected at the edge.
static SPECIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\s'"`]+$"#).expect("valid specifier regex"));

pub fn is_valid_specifier(specifier: &str) -> bool {
    SPECIFIER_RE.is_match(specifier)
}

/// Source extensions recognized when stripping and when matching files.
pub const SOURCE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

pub fn normalize_path(path: &str) -> String {
    // Convert backslashes to forward slashes and normalize
    path.replace('\\', "/")
}

/// Strip a recognized source extension, leaving other dots alone
/// (`types-v2.ts` -> `types-v2`, `moment.timezone` unchanged).
pub fn strip_source_extension(path: &str) -> &str {
    for ext in SOURCE_EXTENSIONS {
        if let Some(stem) = path.strip_suffix(ext) {
            return stem;
        }
    }
    path
}

/// Derive the canonical specifier for a file at `rel_path` (relative to the
/// package root, forward slashes).
pub fn canonical_specifier(rel_path: &str) -> String {
    let normalized = normalize_path(rel_path);
    let stem = strip_source_extension(normalized.trim_start_matches('/'));
    format!("{}{}", SPECIFIER_SIGIL, stem)
}

/// Directory portion of a canonical specifier, without the sigil.
/// `@stores/deep/Foo` -> `stores/deep`; `@Foo` -> ``.
pub fn canonical_dir(specifier: &str) -> &str {
    let body = specifier.strip_prefix(SPECIFIER_SIGIL).unwrap_or(specifier);
    match body.rfind('/') {
        Some(idx) => &body[..idx],
        None => "",
    }
}

/// Whether an import specifier is relative (`./x`, `../x`, or bare `.`/`..`).
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolve a relative import specifier against the importing file's canonical
/// directory, returning the canonical specifier of the target.
///
/// Returns `None` when the specifier walks above the package root — such a
/// target can never correspond to a ledger entry.
pub fn resolve_relative(owner_dir: &str, raw: &str) -> Option<String> {
    let raw = normalize_path(raw);
    let mut components: Vec<&str> =
        owner_dir.split('/').filter(|c| !c.is_empty()).collect();

    for part in raw.split('/').filter(|c| !c.is_empty()) {
        match part {
            "." => {}
            ".." => {
                components.pop()?;
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return None;
    }

    let joined = components.join("/");
    Some(format!("{}{}", SPECIFIER_SIGIL, strip_source_extension(&joined)))
}

/// Canonicalize an import specifier as the Closure Pass sees it: relative
/// specifiers resolve against the owning file's canonical directory, anything
/// else is used as written.
pub fn canonicalize_import(owner_dir: &str, raw: &str) -> Option<String> {
    if is_relative(raw) {
        resolve_relative(owner_dir, raw)
    } else {
        Some(raw.to_string())
    }
}

//! Reference directive extraction.
//!
//! Guest source may carry `#r "<assembly>"` lines naming references the
//! compilation needs. The line-comment form `//#r "<assembly>"` is equivalent,
//! which lets the same file stay valid for tools that do not understand the
//! directive. Directive lines are removed; everything else passes through.

use std::sync::LazyLock;

use regex::Regex;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?://\s*)?#r\s+(?:"([^"]+)"|'([^']+)')\s*;?\s*$"#).expect("invalid regex")
});

/// Source text with its reference directives split out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSource {
    /// Source with directive lines removed.
    pub text: String,
    /// References in order of appearance, duplicates kept.
    pub references: Vec<String>,
}

/// Split reference directives out of `source`.
#[must_use]
pub fn extract_references(source: &str) -> ExtractedSource {
    let mut text = String::with_capacity(source.len());
    let mut references = Vec::new();

    for line in source.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        match parse_directive(content) {
            Some(reference) => references.push(reference.to_owned()),
            None => text.push_str(line),
        }
    }

    ExtractedSource { text, references }
}

/// The reference named by a directive line, if `line` is one.
#[must_use]
pub fn parse_directive(line: &str) -> Option<&str> {
    let captures = DIRECTIVE.captures(line)?;
    captures.get(1).or_else(|| captures.get(2)).map(|m| m.as_str())
}

//! Source resolution.
//!
//! Normalizes the accepted descriptor shapes into one [`ResolvedSource`]:
//!
//! - a string holding source text;
//! - a string ending in a recognized extension, read through a [`SourceLoader`];
//! - the text of a host function whose `/* ... */` comment carries the source;
//! - a [`FuncOptions`] record wrapping any of the above plus overrides.
//!
//! A bare lambda such as `async (input) => { ... }` is wrapped into a type with
//! the entry names in effect, so later stages only ever see type + method.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tandem_config::BridgeConfig;
use tracing::debug;

use crate::directive::extract_references;
use crate::error::{BridgeError, BridgeResult};
use crate::loader::SourceLoader;

/// Where the source text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A string: inline source, or a file path if it ends in a recognized
    /// extension.
    Text(String),
    /// An explicit file path.
    File(PathBuf),
    /// The textual form of a host function whose comment block holds the
    /// source. Only the text between the first `/*` and the last `*/` is used.
    Embedded(String),
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<PathBuf> for Source {
    fn from(value: PathBuf) -> Self {
        Self::File(value)
    }
}

/// Explicit configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncOptions {
    /// The source, in any of the [`Source`] forms.
    pub source: Source,
    /// Entry type override.
    pub type_name: Option<String>,
    /// Entry method override.
    pub method_name: Option<String>,
    /// References added ahead of those named by directives in the source.
    pub references: Vec<String>,
}

impl FuncOptions {
    /// Create options around a source.
    #[must_use]
    pub fn new(source: impl Into<Source>) -> Self {
        Self {
            source: source.into(),
            type_name: None,
            method_name: None,
            references: Vec::new(),
        }
    }

    /// Set the entry type.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the entry method.
    #[must_use]
    pub fn with_method_name(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = Some(method_name.into());
        self
    }

    /// Add a reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }
}

/// What a caller hands to [`Bridge::func`](crate::Bridge::func).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A bare source.
    Source(Source),
    /// An explicit configuration record.
    Options(FuncOptions),
}

impl Descriptor {
    /// Descriptor for the textual form of a host function with a comment body.
    #[must_use]
    pub fn embedded(function_text: impl Into<String>) -> Self {
        Self::Source(Source::Embedded(function_text.into()))
    }

    /// Descriptor for an explicit file path.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::Source(Source::File(path.into()))
    }
}

impl From<&str> for Descriptor {
    fn from(value: &str) -> Self {
        Self::Source(Source::from(value))
    }
}

impl From<String> for Descriptor {
    fn from(value: String) -> Self {
        Self::Source(Source::from(value))
    }
}

impl From<Source> for Descriptor {
    fn from(value: Source) -> Self {
        Self::Source(value)
    }
}

impl From<FuncOptions> for Descriptor {
    fn from(value: FuncOptions) -> Self {
        Self::Options(value)
    }
}

impl TryFrom<serde_json::Value> for Descriptor {
    type Error = BridgeError;

    /// Accepts a string, or `{ source, typeName?, methodName?, references? }`.
    fn try_from(value: serde_json::Value) -> BridgeResult<Self> {
        let mut object = match value {
            serde_json::Value::String(s) => return Ok(Self::from(s)),
            serde_json::Value::Object(object) => object,
            other => {
                return Err(BridgeError::Resolution(format!(
                    "descriptor must be a string or an object with a 'source' field, got {other}"
                )));
            },
        };

        let source = match object.remove("source") {
            Some(serde_json::Value::String(s)) => s,
            _ => {
                return Err(BridgeError::Resolution(
                    "descriptor object requires a string 'source' field".to_owned(),
                ));
            },
        };

        let mut options = FuncOptions::new(source);
        options.type_name = optional_string(&mut object, "typeName")?;
        options.method_name = optional_string(&mut object, "methodName")?;
        if let Some(refs) = object.remove("references") {
            let serde_json::Value::Array(items) = refs else {
                return Err(BridgeError::Resolution(
                    "'references' must be an array of strings".to_owned(),
                ));
            };
            for item in items {
                let serde_json::Value::String(reference) = item else {
                    return Err(BridgeError::Resolution(
                        "'references' must be an array of strings".to_owned(),
                    ));
                };
                options.references.push(reference);
            }
        }
        Ok(Self::Options(options))
    }
}

fn optional_string(
    object: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> BridgeResult<Option<String>> {
    match object.remove(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(BridgeError::Resolution(format!("'{key}' must be a string"))),
    }
}

/// Which descriptor shape produced a resolved source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Inline source string.
    Literal,
    /// File path.
    FilePath,
    /// Comment block of a host function.
    EmbeddedComment,
    /// Explicit configuration record.
    Explicit,
}

/// Whether the source declared types or was a single lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// One or more type declarations.
    Class,
    /// A single lambda, wrapped into a synthesized type.
    Lambda {
        /// Whether the lambda was declared `async`.
        asynchronous: bool,
    },
}

/// A descriptor normalized for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Shape of the descriptor.
    pub kind: SourceKind,
    /// Source as supplied, before directive stripping or lambda wrapping.
    pub raw_text: String,
    /// Text handed to the compiler.
    pub text: String,
    /// Entry type.
    pub type_name: String,
    /// Entry method.
    pub method_name: String,
    /// References in forwarding order: configured, explicit, then directives.
    pub references: Vec<String>,
    /// Class or lambda.
    pub shape: SourceShape,
}

/// Turns descriptors into [`ResolvedSource`]s.
pub struct SourceResolver<'a> {
    loader: &'a dyn SourceLoader,
    config: &'a BridgeConfig,
}

impl<'a> SourceResolver<'a> {
    /// Create a resolver.
    #[must_use]
    pub fn new(loader: &'a dyn SourceLoader, config: &'a BridgeConfig) -> Self {
        Self { loader, config }
    }

    /// Resolve a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Resolution`] if the descriptor carries no usable
    /// source, or [`BridgeError::Load`] if a named file cannot be read.
    pub fn resolve(&self, descriptor: Descriptor) -> BridgeResult<ResolvedSource> {
        let (kind, source, type_name, method_name, explicit_refs) = match descriptor {
            Descriptor::Source(source) => (None, source, None, None, Vec::new()),
            Descriptor::Options(options) => (
                Some(SourceKind::Explicit),
                options.source,
                options.type_name,
                options.method_name,
                options.references,
            ),
        };

        let (source_kind, raw_text) = self.read(source)?;
        let kind = kind.unwrap_or(source_kind);

        let raw_text = raw_text.trim().to_owned();
        if raw_text.is_empty() {
            return Err(BridgeError::Resolution("source is empty".to_owned()));
        }

        let extracted = extract_references(&raw_text);
        let mut references = self.config.compiler.references.clone();
        references.extend(explicit_refs);
        references.extend(extracted.references);

        let entry = &self.config.entry;
        let type_name = type_name.unwrap_or_else(|| entry.type_name.clone());
        let method_name = method_name.unwrap_or_else(|| entry.method_name.clone());
        let resolved = if let Some(lambda) = parse_lambda(&extracted.text) {
            let text = lambda.wrap(&type_name, &method_name);
            debug!(source = %text, "wrapped lambda expression");
            ResolvedSource {
                kind,
                raw_text,
                text,
                type_name,
                method_name,
                references,
                shape: SourceShape::Lambda {
                    asynchronous: lambda.asynchronous,
                },
            }
        } else {
            ResolvedSource {
                kind,
                raw_text,
                text: extracted.text,
                type_name,
                method_name,
                references,
                shape: SourceShape::Class,
            }
        };
        Ok(resolved)
    }

    fn read(&self, source: Source) -> BridgeResult<(SourceKind, String)> {
        match source {
            Source::Text(text) if self.config.source.is_source_path(&text) => {
                let path = PathBuf::from(text.trim());
                self.load(path)
                    .map(|content| (SourceKind::FilePath, content))
            },
            Source::Text(text) => Ok((SourceKind::Literal, text)),
            Source::File(path) => self
                .load(path)
                .map(|content| (SourceKind::FilePath, content)),
            Source::Embedded(function_text) => extract_embedded(&function_text)
                .map(|body| (SourceKind::EmbeddedComment, body.to_owned())),
        }
    }

    fn load(&self, path: PathBuf) -> BridgeResult<String> {
        debug!(path = %path.display(), "loading source file");
        self.loader
            .load(&path)
            .map_err(|source| BridgeError::Load { path, source })
    }
}

/// The text between the first `/*` and the last `*/` of a host function's
/// textual form.
///
/// # Errors
///
/// Returns [`BridgeError::Resolution`] if the text has no comment block.
pub fn extract_embedded(function_text: &str) -> BridgeResult<&str> {
    let start = function_text.find("/*");
    let end = function_text.rfind("*/");
    match (start, end) {
        (Some(start), Some(end)) if start.saturating_add(2) <= end => {
            Ok(&function_text[start.saturating_add(2)..end])
        },
        _ => Err(BridgeError::Resolution(
            "function text carries no /* */ comment block".to_owned(),
        )),
    }
}

static USING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^using\s+[^;(){}]+;").expect("invalid regex"));

static LAMBDA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^(async\b\s*)?(?:\(\s*(?:([A-Za-z_][\w.<>,\[\] ]*?)\s+)?([A-Za-z_]\w*)\s*\)|([A-Za-z_]\w*))\s*=>\s*(.+)$",
    )
    .expect("invalid regex")
});

/// A single-parameter lambda expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Lambda<'a> {
    usings: Vec<&'a str>,
    asynchronous: bool,
    param_type: &'a str,
    param_name: &'a str,
    body: &'a str,
}

fn parse_lambda(text: &str) -> Option<Lambda<'_>> {
    let mut usings = Vec::new();
    let mut rest = text.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/")?.1;
        } else if let Some(found) = USING.find(rest) {
            usings.push(found.as_str());
            rest = &rest[found.end()..];
        } else {
            break;
        }
        rest = rest.trim_start();
    }

    let captures = LAMBDA.captures(rest.trim_end())?;
    let param_name = captures.get(3).or_else(|| captures.get(4))?.as_str();
    Some(Lambda {
        usings,
        asynchronous: captures.get(1).is_some(),
        param_type: captures.get(2).map_or("object", |m| m.as_str().trim()),
        param_name,
        body: trim_body(captures.get(5)?.as_str()),
    })
}

/// Drop trailing comments and statement terminators after a lambda body.
fn trim_body(body: &str) -> &str {
    let mut body = body.trim_end();
    loop {
        let line_start = body.rfind('\n').map_or(0, |i| i.saturating_add(1));
        let stripped = if let Some(offset) = line_comment_start(&body[line_start..]) {
            &body[..line_start.saturating_add(offset)]
        } else if body.ends_with("*/") {
            match body.rfind("/*") {
                Some(open) => &body[..open],
                None => return body,
            }
        } else if let Some(rest) = body.strip_suffix(';') {
            rest
        } else {
            return body;
        };
        body = stripped.trim_end();
    }
}

/// Byte offset of a `//` comment in `line`, ignoring string and character
/// literals.
fn line_comment_start(line: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {},
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '/' && chars.peek().is_some_and(|&(_, next)| next == '/') => {
                return Some(i);
            },
            None => {},
        }
    }
    None
}

impl Lambda<'_> {
    /// Wrap the lambda into a type declaring one method with its parameter
    /// and body.
    fn wrap(&self, type_name: &str, method_name: &str) -> String {
        let (namespace, class) = match type_name.rsplit_once('.') {
            Some((ns, class)) => (Some(ns), class),
            None => (None, type_name),
        };
        let signature = if self.asynchronous {
            "public async Task<object>"
        } else {
            "public object"
        };
        let body = match self
            .body
            .strip_prefix('{')
            .and_then(|b| b.strip_suffix('}'))
        {
            Some(block) => block.trim().to_owned(),
            None => format!("return {};", self.body),
        };

        let mut text = String::new();
        for using in &self.usings {
            text.push_str(using);
            text.push('\n');
        }
        text.push_str("using System.Threading.Tasks;\n\n");
        if let Some(ns) = namespace {
            text.push_str(&format!("namespace {ns}\n{{\n"));
        }
        text.push_str(&format!(
            "public class {class}\n{{\n    {signature} {method_name}({} {})\n    {{\n        {body}\n    }}\n}}\n",
            self.param_type, self.param_name
        ));
        if namespace.is_some() {
            text.push_str("}\n");
        }
        text
    }
}

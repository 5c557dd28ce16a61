//! Configuration types for the tandem bridge.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header in a file produces a working
//! configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Entry-point naming conventions.
    pub entry: EntrySection,
    /// How string descriptors are classified.
    pub source: SourceSection,
    /// What every compilation receives.
    pub compiler: CompilerSection,
    /// Compiled-unit reuse across descriptors.
    pub cache: CacheSection,
}

/// Default type and method used when a descriptor names neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrySection {
    /// Fully qualified entry type name.
    pub type_name: String,
    /// Entry method name on that type.
    pub method_name: String,
}

impl Default for EntrySection {
    fn default() -> Self {
        Self {
            type_name: "Startup".to_owned(),
            method_name: "Invoke".to_owned(),
        }
    }
}

/// Source classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Extensions (without the leading dot) that make a string descriptor a
    /// file path rather than inline source.
    pub file_extensions: Vec<String>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            file_extensions: vec!["csx".to_owned(), "cs".to_owned()],
        }
    }
}

impl SourceSection {
    /// Whether `candidate` ends in one of the configured extensions.
    #[must_use]
    pub fn is_source_path(&self, candidate: &str) -> bool {
        let Some((stem, ext)) = candidate.trim().rsplit_once('.') else {
            return false;
        };
        !stem.is_empty()
            && self
                .file_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// Settings forwarded to the compilation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSection {
    /// References prepended to every compilation request.
    pub references: Vec<String>,
    /// Name of the guest runtime used in resolution diagnostics.
    pub runtime_label: String,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            references: Vec::new(),
            runtime_label: "guest".to_owned(),
        }
    }
}

/// Compiled-unit cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Reuse compiled units for identical source and references.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.entry.type_name, "Startup");
        assert_eq!(config.entry.method_name, "Invoke");
        assert_eq!(config.source.file_extensions, vec!["csx", "cs"]);
        assert!(config.compiler.references.is_empty());
        assert_eq!(config.compiler.runtime_label, "guest");
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_bare_section_uses_defaults() {
        let config: BridgeConfig = toml::from_str("[entry]\n").unwrap();
        assert_eq!(config.entry, EntrySection::default());
    }

    #[test]
    fn test_is_source_path() {
        let source = SourceSection::default();
        assert!(source.is_source_path("hello_lambda.csx"));
        assert!(source.is_source_path("/tmp/dir/hello_class.cs"));
        assert!(source.is_source_path("Hello.CS"));
        assert!(!source.is_source_path("hello.txt"));
        assert!(!source.is_source_path(".cs"));
        assert!(!source.is_source_path("async (input) => input"));
    }
}

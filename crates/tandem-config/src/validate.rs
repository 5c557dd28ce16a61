//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::BridgeConfig;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &BridgeConfig) -> ConfigResult<()> {
    validate_entry(config)?;
    validate_source(config)?;
    validate_compiler(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_entry(config: &BridgeConfig) -> ConfigResult<()> {
    let entry = &config.entry;
    if entry.type_name.trim().is_empty() {
        return Err(invalid("entry.type_name", "must not be empty"));
    }
    if entry.method_name.trim().is_empty() {
        return Err(invalid("entry.method_name", "must not be empty"));
    }
    if entry.method_name.contains('.') {
        return Err(invalid(
            "entry.method_name",
            format!("'{}' must be a bare method name", entry.method_name),
        ));
    }
    Ok(())
}

fn validate_source(config: &BridgeConfig) -> ConfigResult<()> {
    for ext in &config.source.file_extensions {
        if ext.is_empty() || ext.starts_with('.') || ext.contains(char::is_whitespace) {
            return Err(invalid(
                "source.file_extensions",
                format!("'{ext}' must be a bare extension such as \"csx\""),
            ));
        }
    }
    Ok(())
}

fn validate_compiler(config: &BridgeConfig) -> ConfigResult<()> {
    if config.compiler.runtime_label.trim().is_empty() {
        return Err(invalid("compiler.runtime_label", "must not be empty"));
    }
    if config.compiler.references.iter().any(|r| r.trim().is_empty()) {
        return Err(invalid("compiler.references", "entries must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_type_name_rejected() {
        let mut config = BridgeConfig::default();
        config.entry.type_name = "  ".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("entry.type_name"));
    }

    #[test]
    fn test_dotted_method_name_rejected() {
        let mut config = BridgeConfig::default();
        config.entry.method_name = "Startup.Invoke".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_extension_with_dot_rejected() {
        let mut config = BridgeConfig::default();
        config.source.file_extensions = vec![".csx".into()];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.file_extensions"));
    }

    #[test]
    fn test_empty_reference_rejected() {
        let mut config = BridgeConfig::default();
        config.compiler.references = vec!["System.Data.dll".into(), String::new()];
        assert!(validate(&config).is_err());
    }
}

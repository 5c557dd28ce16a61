use std::collections::HashMap;

use crate::merge::{contains_path, set_path};

/// Environment variables consulted for fields the config file leaves unset,
/// paired with the dotted field they fill.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("TANDEM_CACHE", "cache.enabled"),
    ("TANDEM_RUNTIME_LABEL", "compiler.runtime_label"),
    ("TANDEM_ENTRY_TYPE", "entry.type_name"),
    ("TANDEM_ENTRY_METHOD", "entry.method_name"),
];

/// Snapshot the `TANDEM_*` environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("TANDEM_"))
        .collect()
}

/// Fill fields that no file layer set from `env_vars`.
///
/// `file_layer` is the user-supplied overlay only; a field it sets is never
/// overridden. Returns the number of fields filled.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_layer: Option<&toml::Value>,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for (var, path) in ENV_FALLBACKS {
        let Some(raw) = env_vars.get(*var) else {
            continue;
        };
        if file_layer.is_some_and(|layer| contains_path(layer, path)) {
            continue;
        }
        set_path(merged, path, env_value(path, raw));
        applied = applied.saturating_add(1);
    }
    applied
}

fn env_value(path: &str, raw: &str) -> toml::Value {
    if path == "cache.enabled" {
        let enabled = !matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        );
        toml::Value::Boolean(enabled)
    } else {
        toml::Value::String(raw.to_owned())
    }
}

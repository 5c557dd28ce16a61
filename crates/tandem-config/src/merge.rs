/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Whether the dotted `path` resolves to a value inside `tree`.
#[must_use]
pub fn contains_path(tree: &toml::Value, path: &str) -> bool {
    let mut current = tree;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

/// Set the dotted `path` inside `tree`, creating intermediate tables.
pub fn set_path(tree: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = tree;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_per_field() {
        let mut base = parse("[entry]\ntype_name = \"Startup\"\nmethod_name = \"Invoke\"\n");
        let overlay = parse("[entry]\nmethod_name = \"Run\"\n");
        deep_merge(&mut base, &overlay);

        assert_eq!(base["entry"]["type_name"].as_str(), Some("Startup"));
        assert_eq!(base["entry"]["method_name"].as_str(), Some("Run"));
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = parse("[source]\nfile_extensions = [\"csx\", \"cs\"]\n");
        let overlay = parse("[source]\nfile_extensions = [\"script\"]\n");
        deep_merge(&mut base, &overlay);

        let exts = base["source"]["file_extensions"].as_array().unwrap();
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].as_str(), Some("script"));
    }

    #[test]
    fn test_contains_and_set_path() {
        let mut tree = parse("[cache]\n");
        assert!(contains_path(&tree, "cache"));
        assert!(!contains_path(&tree, "cache.enabled"));

        set_path(&mut tree, "cache.enabled", toml::Value::Boolean(true));
        assert!(contains_path(&tree, "cache.enabled"));

        set_path(&mut tree, "compiler.runtime_label", toml::Value::String("CLR".into()));
        assert_eq!(tree["compiler"]["runtime_label"].as_str(), Some("CLR"));
    }
}

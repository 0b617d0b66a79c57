//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WraptraceSettings::default()`]
//! 2. If `~/.wraptrace/settings.json` exists, deep-merge it over the defaults
//! 3. Apply `WRAPTRACE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::WraptraceSettings;

/// Resolve the path to the settings file (`~/.wraptrace/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wraptrace").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WraptraceSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<WraptraceSettings> {
    let defaults = serde_json::to_value(WraptraceSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: WraptraceSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `WRAPTRACE_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut WraptraceSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are ignored with
/// a warning.
pub fn apply_overrides_from<F>(settings: &mut WraptraceSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("WRAPTRACE_LOG_LEVEL").filter(|v| !v.is_empty()) {
        settings.logging.level = v;
    }
    if let Some(v) = read_bool(&lookup, "WRAPTRACE_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = read_bool(&lookup, "WRAPTRACE_DOMAINS") {
        settings.domains.enabled = v;
    }
    if let Some(v) = read_usize(&lookup, "WRAPTRACE_DESTROY_QUEUE_CAPACITY", 0, 1 << 20) {
        settings.destroy_queue.initial_capacity = v;
    }
    if let Some(v) = read_usize(&lookup, "WRAPTRACE_DESTROY_BATCH_WARN", 1, usize::MAX) {
        settings.destroy_queue.batch_warn_threshold = v;
    }
    if let Some(v) = read_usize(&lookup, "WRAPTRACE_MAX_SCOPE_DEPTH", 0, 1 << 20) {
        settings.scopes.max_depth = v;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_bool<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<bool> {
    let val = lookup(name)?;
    let result = parse_bool(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_usize<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    name: &str,
    min: usize,
    max: usize,
) -> Option<usize> {
    let val = lookup(name)?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"destroyQueue": {"initialCapacity": 64, "batchWarnThreshold": 10}});
        let source = serde_json::json!({"destroyQueue": {"initialCapacity": 8}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["destroyQueue"]["initialCapacity"], 8);
        assert_eq!(merged["destroyQueue"]["batchWarnThreshold"], 10);
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replaces() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.destroy_queue, WraptraceSettings::default().destroy_queue);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"scopes": {"maxDepth": 128}, "destroyQueue": {"batchWarnThreshold": 500}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.scopes.max_depth, 128);
        assert_eq!(settings.destroy_queue.batch_warn_threshold, 500);
        assert_eq!(settings.destroy_queue.initial_capacity, 64);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"domains": {"enabled": "sometimes"}}"#).unwrap();

        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut settings = WraptraceSettings::default();
        apply_overrides_from(
            &mut settings,
            env_of(&[
                ("WRAPTRACE_LOG_LEVEL", "trace"),
                ("WRAPTRACE_DOMAINS", "yes"),
                ("WRAPTRACE_DESTROY_BATCH_WARN", "25"),
                ("WRAPTRACE_MAX_SCOPE_DEPTH", "16"),
            ]),
        );
        assert_eq!(settings.logging.level, "trace");
        assert!(settings.domains.enabled);
        assert_eq!(settings.destroy_queue.batch_warn_threshold, 25);
        assert_eq!(settings.scopes.max_depth, 16);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = WraptraceSettings::default();
        apply_overrides_from(
            &mut settings,
            env_of(&[
                ("WRAPTRACE_DOMAINS", "maybe"),
                ("WRAPTRACE_DESTROY_BATCH_WARN", "0"),
                ("WRAPTRACE_DESTROY_QUEUE_CAPACITY", "lots"),
                ("WRAPTRACE_LOG_LEVEL", ""),
            ]),
        );
        assert_eq!(settings, WraptraceSettings::default());
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("5", 1, 10), Some(5));
        assert_eq!(parse_usize_range(" 10 ", 1, 10), Some(10));
        assert_eq!(parse_usize_range("11", 1, 10), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }
}

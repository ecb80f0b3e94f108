//! Field-by-field merging of configuration tiers.
//!
//! Tiers are parsed into `serde_json::Value` and folded together. Objects
//! merge recursively; every other value (arrays included) is replaced by the
//! higher tier. An explicit `null` in a higher tier counts as "not set".

use serde_json::Value;

/// Merge `overlay` onto `base`, with `overlay` winning.
///
/// ```
/// use serde_json::json;
/// use taskzen::config::deep_merge;
///
/// let base = json!({ "generation": { "model": "a", "timeout_secs": 60 } });
/// let overlay = json!({ "generation": { "model": "b" } });
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged, json!({ "generation": { "model": "b", "timeout_secs": 60 } }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(upper)) => {
            for (key, upper_value) in upper {
                let value = match merged.remove(&key) {
                    Some(lower_value) => deep_merge(lower_value, upper_value),
                    None => upper_value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold tiers from lowest to highest priority.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

//! JSON-Schema validation for generated output.
//!
//! Schemas are compiled once per distinct schema document and cached for the
//! life of the process; the flow schemas are fixed, so the cache stays small.

use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// First schema violation found, with the JSON pointer of the offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

fn pointer(path: String) -> String {
    if path.is_empty() { "/".to_string() } else { path }
}

fn compiled(schema: &Value) -> Result<Arc<JSONSchema>, Violation> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<JSONSchema>>>> = OnceLock::new();
    let key = schema.to_string();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    if let Some(hit) = cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return Ok(Arc::clone(hit));
    }

    let compiled = JSONSchema::compile(schema).map_err(|e| Violation {
        path: pointer(e.schema_path.to_string()),
        reason: format!("invalid schema: {}", e),
    })?;
    let compiled = Arc::new(compiled);
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, Arc::clone(&compiled));
    Ok(compiled)
}

/// Validate `value` against `schema`, reporting the first error.
pub fn validate(schema: &Value, value: &Value) -> Result<(), Violation> {
    let compiled = compiled(schema)?;
    let first = match compiled.validate(value) {
        Ok(()) => return Ok(()),
        Err(mut errors) => errors.next().map(|e| Violation {
            path: pointer(e.instance_path.to_string()),
            reason: e.to_string(),
        }),
    };
    Err(first.unwrap_or_else(|| Violation {
        path: "/".to_string(),
        reason: "value does not match schema".to_string(),
    }))
}

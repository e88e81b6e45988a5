use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untyped key-value projection of a credential's fields
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Project a serializable struct onto a `FieldMap`.
///
/// Values that fail to serialize, or do not serialize to a JSON object,
/// project to an empty map and log a warning.
pub fn to_field_map<T: Serialize>(value: &T) -> FieldMap {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(
                kind = json_kind(&other),
                "Credential fields did not serialize to an object, projecting an empty map"
            );
            FieldMap::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize credential fields, projecting an empty map");
            FieldMap::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Image discovered in a registry namespace, normalized across providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Provider-side image identifier (e.g. the manifest or config digest)
    pub docker_image_id: String,
    /// Fully qualified repository name (e.g. "alice/web")
    pub docker_image_name: String,
    pub docker_image_tag: String,
    /// Compressed size in bytes as reported by the registry
    #[serde(default)]
    pub docker_image_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_digest: Option<String>,
    /// Provider-specific extra attributes (architecture, os, last pusher, ...)
    #[serde(default)]
    pub metadata: FieldMap,
}

impl ImageRecord {
    /// Image reference in `name:tag` form
    pub fn reference(&self) -> String {
        format!("{}:{}", self.docker_image_name, self.docker_image_tag)
    }
}

use std::collections::BTreeMap;

use serde_json::Value;

/// Caller-defined key/value payload attached to an entity. The storage layer
/// never inspects it.
pub type Metadata = BTreeMap<String, Value>;

/// Encodes metadata for a TEXT column. Empty metadata is stored as NULL.
pub fn encode_metadata(metadata: &Metadata) -> serde_json::Result<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(metadata).map(Some)
}

/// Decodes a stored metadata payload. Undecodable payloads yield an empty map.
pub fn decode_metadata(raw: Option<&str>) -> Metadata {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Metadata::new();
    };

    match serde_json::from_str::<Metadata>(raw) {
        Ok(metadata) => metadata,
        Err(error) => {
            tracing::warn!(
                error = %error,
                payload_len = raw.len(),
                "discarding undecodable metadata payload"
            );
            Metadata::new()
        }
    }
}

// ! Protocol version handling
// !
// ! Module defines the closed set of supported MCP protocol versions and
// ! the version-conditioned wire filtering: annotations only exist on the
// ! wire from 2025-03-26 on, and audio content is rejected before it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{McpError, McpResult};

/// JSON-RPC version string, always the literal "2.0"
pub const JSONRPC_VERSION: &str = "2.0";

/// A protocol revision this runtime understands.
///
/// Serialized as the wire-format date string (`"2024-11-05"` or
/// `"2025-03-26"`). The set is closed; unknown strings fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// The 2024-11-05 revision
    V2024_11_05,
    /// The 2025-03-26 revision (annotations, audio content)
    V2025_03_26,
}

impl ProtocolVersion {
    /// The most recent revision this runtime speaks
    pub const LATEST: ProtocolVersion = ProtocolVersion::V2025_03_26;

    /// All revisions this runtime accepts during negotiation
    pub const SUPPORTED: [ProtocolVersion; 2] =
        [ProtocolVersion::V2024_11_05, ProtocolVersion::V2025_03_26];

    /// The wire-format date string for this revision
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2024_11_05 => "2024-11-05",
            ProtocolVersion::V2025_03_26 => "2025-03-26",
        }
    }

    /// Whether content annotations (audience + priority) exist on the wire
    pub fn supports_annotations(&self) -> bool {
        *self >= ProtocolVersion::V2025_03_26
    }

    /// Whether audio content exists on the wire
    pub fn supports_audio(&self) -> bool {
        *self >= ProtocolVersion::V2025_03_26
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::LATEST
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2024-11-05" => Ok(ProtocolVersion::V2024_11_05),
            "2025-03-26" => Ok(ProtocolVersion::V2025_03_26),
            other => Err(McpError::Protocol(format!(
                "Protocol Version {other} is not supported"
            ))),
        }
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serialize a value for a negotiated protocol version.
///
/// Annotations are stripped recursively for revisions that predate them;
/// every other field passes through untouched.
pub fn encode_versioned<T: Serialize>(value: &T, version: ProtocolVersion) -> McpResult<Value> {
    let mut json = serde_json::to_value(value)?;
    if !version.supports_annotations() {
        strip_annotations(&mut json);
    }
    Ok(json)
}

/// Deserialize a value received on a session with a negotiated version.
///
/// For old revisions, `annotations` keys are ignored rather than parsed and
/// audio content is rejected outright.
pub fn decode_versioned<T: serde::de::DeserializeOwned>(
    mut value: Value,
    version: ProtocolVersion,
) -> McpResult<T> {
    if !version.supports_audio() && contains_audio_content(&value) {
        return Err(McpError::Protocol(format!(
            "audio content is not available before {}",
            ProtocolVersion::V2025_03_26
        )));
    }
    if !version.supports_annotations() {
        strip_annotations(&mut value);
    }
    Ok(serde_json::from_value(value)?)
}

fn strip_annotations(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("annotations");
            for v in map.values_mut() {
                strip_annotations(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_annotations(v);
            }
        }
        _ => {}
    }
}

fn contains_audio_content(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("audio") {
                return true;
            }
            map.values().any(contains_audio_content)
        }
        Value::Array(items) => items.iter().any(contains_audio_content),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_strings() {
        assert_eq!(ProtocolVersion::V2024_11_05.as_str(), "2024-11-05");
        assert_eq!(ProtocolVersion::V2025_03_26.as_str(), "2025-03-26");
        assert_eq!(ProtocolVersion::LATEST, ProtocolVersion::V2025_03_26);
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(
            "2024-11-05".parse::<ProtocolVersion>().unwrap(),
            ProtocolVersion::V2024_11_05
        );
        assert!("9999-99-99".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::V2024_11_05 < ProtocolVersion::V2025_03_26);
        assert!(!ProtocolVersion::V2024_11_05.supports_annotations());
        assert!(ProtocolVersion::V2025_03_26.supports_audio());
    }

    #[test]
    fn test_serde_as_date_string() {
        let json = serde_json::to_value(ProtocolVersion::LATEST).unwrap();
        assert_eq!(json, json!("2025-03-26"));
        let back: ProtocolVersion = serde_json::from_value(json).unwrap();
        assert_eq!(back, ProtocolVersion::LATEST);
    }

    #[test]
    fn test_encode_strips_annotations_for_old_version() {
        let value = json!({
            "content": [{
                "type": "text",
                "text": "hi",
                "annotations": { "priority": 1.0 }
            }]
        });
        let encoded = encode_versioned(&value, ProtocolVersion::V2024_11_05).unwrap();
        assert!(encoded["content"][0].get("annotations").is_none());

        let encoded = encode_versioned(&value, ProtocolVersion::V2025_03_26).unwrap();
        assert!(encoded["content"][0].get("annotations").is_some());
    }

    #[test]
    fn test_decode_rejects_audio_for_old_version() {
        let value = json!({ "type": "audio", "data": "AAAA", "mimeType": "audio/wav" });
        let err = decode_versioned::<Value>(value.clone(), ProtocolVersion::V2024_11_05);
        assert!(err.is_err());
        let ok = decode_versioned::<Value>(value, ProtocolVersion::V2025_03_26);
        assert!(ok.is_ok());
    }
}

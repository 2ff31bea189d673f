//! Protocol-layer invariants: versioned round trips, minimal emission,
//! union selection, and wire shapes.

use duplex_mcp::prelude::*;
use duplex_mcp::protocol::{decode_versioned, encode_versioned};
use pretty_assertions::assert_eq;

fn annotated_text(text: &str) -> MessageContent {
    MessageContent::Text(TextContent {
        text: text.to_string(),
        annotations: Some(Annotations {
            audience: Some(vec![Role::User, Role::Assistant]),
            priority: Some(0.5),
        }),
    })
}

#[test]
fn round_trip_preserves_values_per_version() {
    let version = ProtocolVersion::V2025_03_26;

    let samples: Vec<Value> = vec![
        serde_json::to_value(Resource::new("file:///a", "a").with_mime_type("text/plain")).unwrap(),
        serde_json::to_value(ResourceTemplate::new("file:///{path}", "files")).unwrap(),
        serde_json::to_value(Prompt::new("greet").with_description("hi")).unwrap(),
        serde_json::to_value(PromptMessage::user_text("hello")).unwrap(),
        serde_json::to_value(annotated_text("with annotations")).unwrap(),
        serde_json::to_value(MessageContent::audio("AAAA", "audio/wav")).unwrap(),
        serde_json::to_value(ToolResultContent::resource(ResourceContents::blob(
            "file:///b", "AAAA",
        )))
        .unwrap(),
        serde_json::to_value(Root::new("file:///ws")).unwrap(),
    ];

    for sample in samples {
        let encoded = encode_versioned(&sample, version).unwrap();
        let decoded: Value = decode_versioned(encoded, version).unwrap();
        assert_eq!(decoded, sample);
    }
}

#[test]
fn old_version_round_trip_without_excluded_fields() {
    let version = ProtocolVersion::V2024_11_05;
    // No annotations, no audio: the round trip is lossless.
    let content = MessageContent::text("plain");
    let encoded = encode_versioned(&content, version).unwrap();
    let decoded: MessageContent = decode_versioned(encoded, version).unwrap();
    assert_eq!(decoded, content);
}

#[test]
fn annotations_are_version_gated() {
    let content = annotated_text("hi");

    let new = encode_versioned(&content, ProtocolVersion::V2025_03_26).unwrap();
    assert!(new.get("annotations").is_some());

    let old = encode_versioned(&content, ProtocolVersion::V2024_11_05).unwrap();
    assert!(old.get("annotations").is_none());

    // Decoding at the old version ignores annotations instead of parsing.
    let decoded: MessageContent = decode_versioned(
        json!({ "type": "text", "text": "hi", "annotations": { "priority": 1.0 } }),
        ProtocolVersion::V2024_11_05,
    )
    .unwrap();
    assert_eq!(decoded, MessageContent::text("hi"));
}

#[test]
fn audio_content_requires_new_version() {
    let audio = json!({ "type": "audio", "data": "AAAA", "mimeType": "audio/wav" });
    assert!(
        decode_versioned::<MessageContent>(audio.clone(), ProtocolVersion::V2024_11_05).is_err()
    );
    assert!(decode_versioned::<MessageContent>(audio, ProtocolVersion::V2025_03_26).is_ok());
}

#[test]
fn minimal_emission_omits_defaults() {
    // Optional fields equal to a freshly constructed sibling's stay off
    // the wire; required fields are always present.
    let json = serde_json::to_value(Prompt::new("p")).unwrap();
    assert_eq!(json, json!({ "name": "p" }));

    let json = serde_json::to_value(CallToolResult::default()).unwrap();
    assert_eq!(json, json!({ "content": [] }));

    let json = serde_json::to_value(ListResourcesResult::default()).unwrap();
    assert_eq!(json, json!({ "resources": [] }));
}

#[test]
fn union_decode_is_exclusive() {
    // A lone matching variant decodes; an object matching nothing fails
    // with a diagnostic naming its keys.
    let ok: ResourceContents =
        serde_json::from_value(json!({ "uri": "file:///x", "text": "t" })).unwrap();
    assert!(matches!(ok, ResourceContents::Text(_)));

    let err = serde_json::from_value::<ResourceContents>(json!({ "uri": "file:///x" }))
        .unwrap_err()
        .to_string();
    assert!(err.contains("no variant matches"), "diagnostic was {err}");
}

#[test]
fn mixed_tool_result_content_decodes() {
    let value = json!([
        { "type": "text", "text": "done" },
        { "type": "image", "data": "AAAA", "mimeType": "image/png" },
        { "type": "resource", "resource": { "uri": "file:///log", "text": "lines" } }
    ]);
    let content: Vec<ToolResultContent> = serde_json::from_value(value).unwrap();
    assert_eq!(content.len(), 3);
    assert!(matches!(content[2], ToolResultContent::Resource(_)));
}

#[test]
fn initialize_result_wire_shape() {
    let result = InitializeResult {
        protocol_version: ProtocolVersion::LATEST.to_string(),
        capabilities: ServerCapabilities::default(),
        server_info: ServerInfo::new("srv", "1.0"),
        instructions: None,
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json,
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "serverInfo": { "name": "srv", "version": "1.0" }
        })
    );
}

#[test]
fn request_ids_accept_both_shapes() {
    let numeric: RequestId = serde_json::from_value(json!(3)).unwrap();
    let text: RequestId = serde_json::from_value(json!("abc-3")).unwrap();
    assert_ne!(numeric, text);
    assert_eq!(serde_json::to_value(&text).unwrap(), json!("abc-3"));
}

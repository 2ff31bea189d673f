// ! JSON-RPC batch handling
// !
// ! A wire frame is either one envelope or an array of envelopes. Each
// ! array element is dispatched independently; responses to the requests
// ! in a batch are returned as a batch in input order.

use serde_json::Value;

/// A decoded wire frame: the envelope objects it carried and whether they
/// arrived as a batch array.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchInput {
    /// The envelope objects, in input order
    pub items: Vec<Value>,
    /// True when the frame was an array
    pub is_batch: bool,
}

/// Split a wire frame into its envelope objects.
///
/// An empty array yields an empty item list; the dispatcher logs and
/// drops such frames.
pub fn split_frame(value: Value) -> BatchInput {
    match value {
        Value::Array(items) => BatchInput {
            items,
            is_batch: true,
        },
        other => BatchInput {
            items: vec![other],
            is_batch: false,
        },
    }
}

/// Join the responses produced for one frame back into a single wire value.
///
/// Responses must already be in input order. Returns `None` when the frame
/// produced no responses (notifications only).
pub fn join_responses(responses: Vec<Value>, is_batch: bool) -> Option<Value> {
    if responses.is_empty() {
        return None;
    }
    if is_batch {
        Some(Value::Array(responses))
    } else {
        responses.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_frame() {
        let input = split_frame(json!({ "jsonrpc": "2.0", "method": "ping", "id": 1 }));
        assert!(!input.is_batch);
        assert_eq!(input.items.len(), 1);
    }

    #[test]
    fn test_batch_frame_preserves_order() {
        let input = split_frame(json!([
            { "jsonrpc": "2.0", "method": "ping", "id": 1 },
            { "jsonrpc": "2.0", "method": "notifications/initialized" },
            { "jsonrpc": "2.0", "method": "tools/list", "id": 2 }
        ]));
        assert!(input.is_batch);
        assert_eq!(input.items.len(), 3);
        assert_eq!(input.items[0]["id"], json!(1));
        assert_eq!(input.items[2]["id"], json!(2));
    }

    #[test]
    fn test_join_responses() {
        assert_eq!(join_responses(vec![], false), None);
        assert_eq!(join_responses(vec![], true), None);

        let single = join_responses(vec![json!({ "id": 1 })], false).unwrap();
        assert_eq!(single, json!({ "id": 1 }));

        let batch = join_responses(vec![json!({ "id": 1 }), json!({ "id": 2 })], true).unwrap();
        assert_eq!(batch, json!([{ "id": 1 }, { "id": 2 }]));
    }
}

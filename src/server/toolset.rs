// ! Tool sets
// !
// ! A tool set is a named bundle of callable methods a session exposes as
// ! tools. Each method declares its parameters from a closed kind set;
// ! the input schema is synthesized from those declarations, with
// ! session-identifier parameters elided from the schema and injected by
// ! the dispatcher at call time.

use base64::Engine;
use serde_json::{Map, Value, json};

use crate::protocol::types::{Tool, ToolInputSchema, ToolResultContent};
use crate::transport::traits::SessionId;

/// The closed set of parameter kinds that map cleanly onto a tool schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A JSON string
    String,
    /// An integral JSON number
    Integer,
    /// A JSON boolean
    Boolean,
    /// The calling session; never part of the schema
    SessionId,
}

impl ParamKind {
    /// The JSON-schema type name, or None for injected parameters
    fn json_type(&self) -> Option<&'static str> {
        match self {
            ParamKind::String => Some("string"),
            ParamKind::Integer => Some("number"),
            ParamKind::Boolean => Some("boolean"),
            ParamKind::SessionId => None,
        }
    }
}

/// One declared parameter of a tool method
#[derive(Debug, Clone)]
pub struct ToolParam {
    /// Parameter name as it appears in the schema and arguments
    pub name: String,
    /// Declared kind
    pub kind: ParamKind,
    /// Optional schema description
    pub description: Option<String>,
}

/// A converted argument handed to a tool method
#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Session(SessionId),
}

impl ToolValue {
    /// The string payload, if this is a string argument
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer argument
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ToolValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean argument
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ToolValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// What a tool method returns; the dispatcher wraps this into content
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// No content (trigger actions)
    Unit,
    /// Text content
    Text(String),
    /// Rendered as the text "true" or "false"
    Boolean(bool),
    /// PNG image bytes, emitted as base64 image content
    ImagePng(Vec<u8>),
}

type ToolFn = Box<dyn Fn(&[ToolValue]) -> ToolOutput + Send + Sync>;

/// One callable method of a tool set
pub struct ToolMethod {
    name: String,
    description: Option<String>,
    params: Vec<ToolParam>,
    invoke: ToolFn,
}

impl ToolMethod {
    /// Declare a method with its handler
    pub fn new<S, F>(name: S, handler: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[ToolValue]) -> ToolOutput + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
            invoke: Box::new(handler),
        }
    }

    /// Set the human-readable description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare the next parameter
    pub fn param<S: Into<String>>(mut self, name: S, kind: ParamKind) -> Self {
        self.params.push(ToolParam {
            name: name.into(),
            kind,
            description: None,
        });
        self
    }

    /// Declare the next parameter with a schema description
    pub fn described_param<S: Into<String>>(
        mut self,
        name: S,
        kind: ParamKind,
        description: S,
    ) -> Self {
        self.params.push(ToolParam {
            name: name.into(),
            kind,
            description: Some(description.into()),
        });
        self
    }

    /// Build the input schema: every declared parameter is required,
    /// session identifiers are elided.
    fn input_schema(&self) -> ToolInputSchema {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let Some(json_type) = param.kind.json_type() else {
                continue;
            };
            let mut fragment = json!({ "type": json_type });
            if let Some(description) = &param.description {
                fragment["description"] = json!(description);
            }
            properties.insert(param.name.clone(), fragment);
            required.push(param.name.clone());
        }
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required,
        }
    }

    /// Convert JSON arguments into declared-order values.
    ///
    /// The argument keys must match the declared non-session parameters
    /// exactly; any conversion failure aborts the call.
    fn convert_arguments(
        &self,
        session: SessionId,
        arguments: &Map<String, Value>,
    ) -> Option<Vec<ToolValue>> {
        let declared: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.kind != ParamKind::SessionId)
            .map(|p| p.name.as_str())
            .collect();
        if arguments.len() != declared.len()
            || !declared.iter().all(|name| arguments.contains_key(*name))
        {
            return None;
        }

        let mut values = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let value = match param.kind {
                ParamKind::SessionId => ToolValue::Session(session),
                ParamKind::String => {
                    ToolValue::String(arguments.get(&param.name)?.as_str()?.to_string())
                }
                ParamKind::Integer => ToolValue::Integer(arguments.get(&param.name)?.as_i64()?),
                ParamKind::Boolean => ToolValue::Boolean(arguments.get(&param.name)?.as_bool()?),
            };
            values.push(value);
        }
        Some(values)
    }
}

/// A named bundle of tool methods
pub struct ToolSet {
    name: String,
    methods: Vec<ToolMethod>,
}

impl ToolSet {
    /// Create a named tool set; its tools are exposed as `<name>/<method>`
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Create an unnamed tool set; its tools keep their bare method names
    pub fn anonymous() -> Self {
        Self::new("")
    }

    /// The set name, empty for anonymous sets
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a method
    pub fn method(mut self, method: ToolMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a zero-argument trigger action returning no content
    pub fn trigger<S, F>(self, name: S, description: S, action: F) -> Self
    where
        S: Into<String>,
        F: Fn() + Send + Sync + 'static,
    {
        self.method(
            ToolMethod::new(name, move |_args| {
                action();
                ToolOutput::Unit
            })
            .with_description(description),
        )
    }

    fn tool_name(&self, method: &ToolMethod) -> String {
        if self.name.is_empty() {
            method.name.clone()
        } else {
            format!("{}/{}", self.name, method.name)
        }
    }

    /// The tools this set exposes
    pub fn tools(&self) -> Vec<Tool> {
        self.methods
            .iter()
            .map(|method| Tool {
                name: self.tool_name(method),
                description: method.description.clone(),
                input_schema: method.input_schema(),
            })
            .collect()
    }

    /// Invoke a tool by its full name.
    ///
    /// Returns None when no method of this set carries the name. A
    /// matching method whose arguments fail to convert yields
    /// `(empty, false)` without invoking the handler.
    pub fn call(
        &self,
        session: SessionId,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Option<(Vec<ToolResultContent>, bool)> {
        let method = self
            .methods
            .iter()
            .find(|method| self.tool_name(method) == name)?;

        let Some(values) = method.convert_arguments(session, arguments) else {
            tracing::warn!("argument conversion failed for {name}: {arguments:?}");
            return Some((Vec::new(), false));
        };

        let content = match (method.invoke)(&values) {
            ToolOutput::Unit => Vec::new(),
            ToolOutput::Text(text) => vec![ToolResultContent::text(text)],
            ToolOutput::Boolean(b) => {
                vec![ToolResultContent::text(if b { "true" } else { "false" })]
            }
            ToolOutput::ImagePng(bytes) => {
                let data = base64::engine::general_purpose::STANDARD.encode(bytes);
                vec![ToolResultContent::image(data, "image/png".to_string())]
            }
        };
        Some((content, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_set() -> ToolSet {
        ToolSet::anonymous().method(
            ToolMethod::new("echo", |args| {
                ToolOutput::Text(args[0].as_str().unwrap_or_default().to_string())
            })
            .with_description("Echo a message")
            .param("message", ParamKind::String),
        )
    }

    #[test]
    fn test_schema_generation() {
        let tools = echo_set().tools();
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.name, "echo");
        let schema = serde_json::to_value(&tool.input_schema).unwrap();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["message"]["type"], json!("string"));
        assert_eq!(schema["required"], json!(["message"]));
    }

    #[test]
    fn test_named_set_prefixes_tool_names() {
        let set = ToolSet::new("editor").method(ToolMethod::new("clear", |_| ToolOutput::Unit));
        assert_eq!(set.tools()[0].name, "editor/clear");
        assert!(
            set.call(SessionId::new_v4(), "clear", &Map::new())
                .is_none()
        );
        let (content, ok) = set
            .call(SessionId::new_v4(), "editor/clear", &Map::new())
            .unwrap();
        assert!(ok);
        assert!(content.is_empty());
    }

    #[test]
    fn test_session_param_elided_and_injected() {
        let set = ToolSet::anonymous().method(
            ToolMethod::new("whoami", |args| match args[0] {
                ToolValue::Session(id) => ToolOutput::Text(id.to_string()),
                _ => ToolOutput::Unit,
            })
            .param("session", ParamKind::SessionId),
        );

        let schema = serde_json::to_value(&set.tools()[0].input_schema).unwrap();
        assert_eq!(schema, json!({ "type": "object" }));

        let session = SessionId::new_v4();
        let (content, ok) = set.call(session, "whoami", &Map::new()).unwrap();
        assert!(ok);
        assert_eq!(
            content,
            vec![ToolResultContent::text(session.to_string())]
        );
    }

    #[test]
    fn test_call_with_matching_arguments() {
        let set = echo_set();
        let args = json!({ "message": "Hello" });
        let (content, ok) = set
            .call(SessionId::new_v4(), "echo", args.as_object().unwrap())
            .unwrap();
        assert!(ok);
        assert_eq!(content, vec![ToolResultContent::text("Hello")]);
    }

    #[test]
    fn test_conversion_failure_aborts_call() {
        let set = echo_set();
        // Wrong type for "message".
        let args = json!({ "message": 42 });
        let (content, ok) = set
            .call(SessionId::new_v4(), "echo", args.as_object().unwrap())
            .unwrap();
        assert!(!ok);
        assert!(content.is_empty());

        // Extraneous argument.
        let args = json!({ "message": "hi", "volume": 11 });
        let (_, ok) = set
            .call(SessionId::new_v4(), "echo", args.as_object().unwrap())
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_trigger_action_fires_and_returns_nothing() {
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = fired.clone();
        let set = ToolSet::anonymous().trigger("save", "Save the document", move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let schema = serde_json::to_value(&set.tools()[0].input_schema).unwrap();
        assert_eq!(schema, json!({ "type": "object" }));

        let (content, ok) = set.call(SessionId::new_v4(), "save", &Map::new()).unwrap();
        assert!(ok);
        assert!(content.is_empty());
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_boolean_param_conversion() {
        let set = ToolSet::anonymous().method(
            ToolMethod::new("set_enabled", |args| {
                ToolOutput::Boolean(args[0].as_bool().unwrap_or(false))
            })
            .param("enabled", ParamKind::Boolean),
        );
        let args = json!({ "enabled": true });
        let (content, ok) = set
            .call(SessionId::new_v4(), "set_enabled", args.as_object().unwrap())
            .unwrap();
        assert!(ok);
        assert_eq!(content, vec![ToolResultContent::text("true")]);
    }

    #[test]
    fn test_boolean_return_becomes_text() {
        let set = ToolSet::anonymous().method(
            ToolMethod::new("is_even", |args| {
                ToolOutput::Boolean(args[0].as_i64().unwrap_or(1) % 2 == 0)
            })
            .param("n", ParamKind::Integer),
        );
        let args = json!({ "n": 4 });
        let (content, ok) = set
            .call(SessionId::new_v4(), "is_even", args.as_object().unwrap())
            .unwrap();
        assert!(ok);
        assert_eq!(content, vec![ToolResultContent::text("true")]);
    }

    #[test]
    fn test_image_return_is_base64_png() {
        let bytes = vec![0x89, 0x50, 0x4e, 0x47];
        let expected = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let set = ToolSet::anonymous()
            .method(ToolMethod::new("shot", move |_| {
                ToolOutput::ImagePng(vec![0x89, 0x50, 0x4e, 0x47])
            }));
        let (content, ok) = set
            .call(SessionId::new_v4(), "shot", &Map::new())
            .unwrap();
        assert!(ok);
        match &content[0] {
            ToolResultContent::Image(image) => {
                assert_eq!(image.data, expected);
                assert_eq!(image.mime_type, "image/png");
            }
            other => panic!("unexpected content {other:?}"),
        }
    }
}

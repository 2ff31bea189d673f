// ! Core MCP protocol types
// !
// ! Module contains the data model shared by both halves of the runtime:
// ! scalar kinds, capability descriptors, the polymorphic content unions,
// ! resource/prompt/tool descriptors and the JSON-RPC envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub use crate::protocol::version::JSONRPC_VERSION;

// ============================================================================
// Scalar kinds
// ============================================================================

/// A JSON-RPC request identifier: an integer or an opaque string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier
    Number(i64),
    /// String identifier
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

/// Progress tokens share the shape of request identifiers
pub type ProgressToken = RequestId;

/// Opaque pagination cursor
pub type Cursor = String;

/// The sender or recipient of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Logging severity, syslog-style
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

// ============================================================================
// Implementation info
// ============================================================================

/// Name and version of an MCP implementation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

impl Implementation {
    /// Create a new implementation descriptor
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Server identity in an initialize result
pub type ServerInfo = Implementation;
/// Client identity in an initialize request
pub type ClientInfo = Implementation;

// ============================================================================
// Capabilities
// ============================================================================

/// Capabilities a server advertises during initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerCapabilities {
    /// Experimental, non-standard capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// Present if the server supports sending log messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    /// Present if the server offers prompts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Present if the server offers resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Present if the server offers tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Capabilities a client advertises during initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// Present if the client supports listing roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Present if the client supports sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
}

/// Prompt-related server capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PromptsCapability {
    /// Whether the server emits prompt list change notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resource-related server capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourcesCapability {
    /// Whether the server supports resource subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether the server emits resource list change notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tool-related server capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolsCapability {
    /// Whether the server emits tool list change notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Logging server capability marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingCapability {
    #[serde(flatten)]
    pub additional_properties: HashMap<String, Value>,
}

/// Roots client capability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RootsCapability {
    /// Whether the client emits roots list change notifications
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Sampling client capability marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SamplingCapability {
    #[serde(flatten)]
    pub additional_properties: HashMap<String, Value>,
}

// ============================================================================
// Annotations (2025-03-26 and later)
// ============================================================================

/// Audience and priority hints attached to content and resources.
///
/// These exist on the wire only at protocol version 2025-03-26 or later;
/// the versioned encoders strip them for older sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Annotations {
    /// Who this content is intended for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Importance, 1 = effectively required, 0 = fully optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

// ============================================================================
// Content variants
// ============================================================================

/// Plain text content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TextContent {
    /// The text payload
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Base64-encoded image content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImageContent {
    /// Base64-encoded image data
    pub data: String,
    /// MIME type of the image
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Base64-encoded audio content (2025-03-26 and later)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AudioContent {
    /// Base64-encoded audio data
    pub data: String,
    /// MIME type of the audio
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// A resource embedded into a message or tool result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedResource {
    /// The embedded contents, text or blob
    pub resource: ResourceContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Contents of a resource: text or binary.
///
/// The variants are distinguished by their unique required property
/// (`text` vs `blob`); both carry the source URI.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    /// Textual contents
    Text(TextResourceContents),
    /// Binary contents, base64-encoded
    Blob(BlobResourceContents),
}

/// Text contents of a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TextResourceContents {
    /// URI of the source resource
    pub uri: String,
    /// MIME type, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// The text of the resource
    pub text: String,
}

/// Binary contents of a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BlobResourceContents {
    /// URI of the source resource
    pub uri: String,
    /// MIME type, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded payload
    pub blob: String,
}

impl ResourceContents {
    /// Text contents for a URI
    pub fn text<S: Into<String>>(uri: S, text: S) -> Self {
        ResourceContents::Text(TextResourceContents {
            uri: uri.into(),
            mime_type: None,
            text: text.into(),
        })
    }

    /// Blob contents for a URI
    pub fn blob<S: Into<String>>(uri: S, blob: S) -> Self {
        ResourceContents::Blob(BlobResourceContents {
            uri: uri.into(),
            mime_type: None,
            blob: blob.into(),
        })
    }

    /// URI of the source resource
    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text(t) => &t.uri,
            ResourceContents::Blob(b) => &b.uri,
        }
    }
}

// ============================================================================
// anyOf variant selection
// ============================================================================

/// One variant of a discriminated union: its tag, required properties and
/// the full set of properties it declares.
struct VariantSpec {
    tag: &'static str,
    required: &'static [&'static str],
    declared: &'static [&'static str],
}

/// Select the variant of a union for a JSON object.
///
/// Selection order follows the protocol: an explicit `type` discriminator
/// wins; else a union-specific `mimeType` override hook; else the unique
/// variant whose required properties are all present and whose declared
/// property set covers every key in the object. Zero or multiple matches
/// fail with a diagnostic.
fn select_variant(
    map: &Map<String, Value>,
    variants: &[VariantSpec],
    mime_hook: bool,
) -> Result<&'static str, String> {
    if let Some(tag) = map.get("type").and_then(Value::as_str) {
        return variants
            .iter()
            .find(|v| v.tag == tag)
            .map(|v| v.tag)
            .ok_or_else(|| format!("unknown content type {tag:?}"));
    }

    if mime_hook {
        if let Some(mime) = map.get("mimeType").and_then(Value::as_str) {
            if mime.starts_with("image/") {
                return Ok("image");
            }
            if mime.starts_with("audio/") {
                return Ok("audio");
            }
        }
    }

    let matches: Vec<&VariantSpec> = variants
        .iter()
        .filter(|v| {
            v.required.iter().all(|r| map.contains_key(*r))
                && map.keys().all(|k| v.declared.contains(&k.as_str()))
        })
        .collect();

    match matches.as_slice() {
        [one] => Ok(one.tag),
        [] => Err(format!(
            "no variant matches object with keys {:?}",
            map.keys().collect::<Vec<_>>()
        )),
        many => Err(format!(
            "ambiguous object with keys {:?} matches variants {:?}",
            map.keys().collect::<Vec<_>>(),
            many.iter().map(|v| v.tag).collect::<Vec<_>>()
        )),
    }
}

const MESSAGE_CONTENT_VARIANTS: &[VariantSpec] = &[
    VariantSpec {
        tag: "text",
        required: &["text"],
        declared: &["type", "text", "annotations"],
    },
    VariantSpec {
        tag: "image",
        required: &["data", "mimeType"],
        declared: &["type", "data", "mimeType", "annotations"],
    },
    VariantSpec {
        tag: "audio",
        required: &["data", "mimeType"],
        declared: &["type", "data", "mimeType", "annotations"],
    },
];

const TOOL_RESULT_CONTENT_VARIANTS: &[VariantSpec] = &[
    VariantSpec {
        tag: "text",
        required: &["text"],
        declared: &["type", "text", "annotations"],
    },
    VariantSpec {
        tag: "image",
        required: &["data", "mimeType"],
        declared: &["type", "data", "mimeType", "annotations"],
    },
    VariantSpec {
        tag: "audio",
        required: &["data", "mimeType"],
        declared: &["type", "data", "mimeType", "annotations"],
    },
    VariantSpec {
        tag: "resource",
        required: &["resource"],
        declared: &["type", "resource", "annotations"],
    },
];

fn object_for_variant<'de, D: Deserializer<'de>>(value: Value) -> Result<Map<String, Value>, D::Error> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(serde::de::Error::custom(format!(
            "expected a content object, got {other}"
        ))),
    }
}

fn decode_variant<T: serde::de::DeserializeOwned, E: serde::de::Error>(
    map: Map<String, Value>,
) -> Result<T, E> {
    serde_json::from_value(Value::Object(map)).map_err(serde::de::Error::custom)
}

// ============================================================================
// Content unions
// ============================================================================

/// Content of a sampling or prompt message: text, image or audio
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    /// Text content
    Text(TextContent),
    /// Image content
    Image(ImageContent),
    /// Audio content (2025-03-26 and later)
    Audio(AudioContent),
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = object_for_variant::<D>(Value::deserialize(deserializer)?)?;
        match select_variant(&map, MESSAGE_CONTENT_VARIANTS, true)
            .map_err(serde::de::Error::custom)?
        {
            "text" => Ok(MessageContent::Text(decode_variant(map)?)),
            "image" => Ok(MessageContent::Image(decode_variant(map)?)),
            "audio" => Ok(MessageContent::Audio(decode_variant(map)?)),
            other => Err(serde::de::Error::custom(format!(
                "content type {other:?} is not valid in a message"
            ))),
        }
    }
}

impl MessageContent {
    /// Text message content
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent {
            text: text.into(),
            annotations: None,
        })
    }

    /// Image message content
    pub fn image<S: Into<String>>(data: S, mime_type: S) -> Self {
        MessageContent::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        })
    }

    /// Audio message content
    pub fn audio<S: Into<String>>(data: S, mime_type: S) -> Self {
        MessageContent::Audio(AudioContent {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        })
    }
}

/// Content of a tool call result: text, image, audio or embedded resource
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResultContent {
    /// Text content
    Text(TextContent),
    /// Image content
    Image(ImageContent),
    /// Audio content (2025-03-26 and later)
    Audio(AudioContent),
    /// Embedded resource content
    Resource(EmbeddedResource),
}

impl<'de> Deserialize<'de> for ToolResultContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = object_for_variant::<D>(Value::deserialize(deserializer)?)?;
        match select_variant(&map, TOOL_RESULT_CONTENT_VARIANTS, true)
            .map_err(serde::de::Error::custom)?
        {
            "text" => Ok(ToolResultContent::Text(decode_variant(map)?)),
            "image" => Ok(ToolResultContent::Image(decode_variant(map)?)),
            "audio" => Ok(ToolResultContent::Audio(decode_variant(map)?)),
            "resource" => Ok(ToolResultContent::Resource(decode_variant(map)?)),
            other => Err(serde::de::Error::custom(format!(
                "content type {other:?} is not valid in a tool result"
            ))),
        }
    }
}

impl ToolResultContent {
    /// Text tool result content
    pub fn text<S: Into<String>>(text: S) -> Self {
        ToolResultContent::Text(TextContent {
            text: text.into(),
            annotations: None,
        })
    }

    /// Image tool result content
    pub fn image<S: Into<String>>(data: S, mime_type: S) -> Self {
        ToolResultContent::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        })
    }

    /// Audio tool result content
    pub fn audio<S: Into<String>>(data: S, mime_type: S) -> Self {
        ToolResultContent::Audio(AudioContent {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        })
    }

    /// Embedded resource tool result content
    pub fn resource(resource: ResourceContents) -> Self {
        ToolResultContent::Resource(EmbeddedResource {
            resource,
            annotations: None,
        })
    }
}

impl<'de> Deserialize<'de> for ResourceContents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        const VARIANTS: &[VariantSpec] = &[
            VariantSpec {
                tag: "text",
                required: &["uri", "text"],
                declared: &["uri", "mimeType", "text"],
            },
            VariantSpec {
                tag: "blob",
                required: &["uri", "blob"],
                declared: &["uri", "mimeType", "blob"],
            },
        ];

        let map = object_for_variant::<D>(Value::deserialize(deserializer)?)?;
        match select_variant(&map, VARIANTS, false).map_err(serde::de::Error::custom)? {
            "text" => Ok(ResourceContents::Text(decode_variant(map)?)),
            _ => Ok(ResourceContents::Blob(decode_variant(map)?)),
        }
    }
}

// ============================================================================
// Resources, prompts, tools, roots
// ============================================================================

/// A URI-addressed datum a server can list, read and notify about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Resource {
    /// URI of the resource
    pub uri: String,
    /// Human-readable name
    pub name: String,
    /// Description of what this resource represents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size in bytes, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl Resource {
    /// Create a resource with a URI and a name
    pub fn new<S: Into<String>>(uri: S, name: S) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the MIME type
    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A URI template describing a family of resources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceTemplate {
    /// RFC 6570 URI template
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// Human-readable name for the template family
    pub name: String,
    /// Description of what the templated resources represent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type shared by all matching resources, if any
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl ResourceTemplate {
    /// Create a resource template
    pub fn new<S: Into<String>>(uri_template: S, name: S) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A named, templated message sequence a server can materialize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Prompt {
    /// Name of the prompt
    pub name: String,
    /// What the prompt does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments the prompt accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

impl Prompt {
    /// Create a prompt with a name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One argument a prompt accepts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// What the argument controls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// A message produced by materializing a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    /// Who speaks this message
    pub role: Role,
    /// The message content
    pub content: MessageContent,
}

impl PromptMessage {
    /// A user-role text message
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::text(text),
        }
    }

    /// An assistant-role text message
    pub fn assistant_text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::text(text),
        }
    }
}

/// A message exchanged during sampling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingMessage {
    /// Who speaks this message
    pub role: Role,
    /// The message content
    pub content: MessageContent,
}

impl SamplingMessage {
    /// A user-role text message
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::text(text),
        }
    }

    /// An assistant-role text message
    pub fn assistant_text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::text(text),
        }
    }
}

/// Input schema of a tool: a JSON-Schema object shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    /// Always the literal "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property name to schema fragment
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub properties: Map<String, Value>,
    /// Names of required properties
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// A named, schema-described callable exposed by a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Tool name
    pub name: String,
    /// What the tool does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema of the tool's arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
}

impl Tool {
    /// Create a tool with an empty object schema
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: ToolInputSchema::default(),
        }
    }

    /// Set the description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A client-side URI boundary a server may enumerate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Root {
    /// Root URI, typically file://
    pub uri: String,
    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    /// Create a root
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }
}

// ============================================================================
// Sampling model preferences
// ============================================================================

/// Preferences the server expresses for sampling model selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelPreferences {
    /// Ordered model hints, best first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    /// How much to weigh cost, 0..1
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// How much to weigh latency, 0..1
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// How much to weigh capability, 0..1
    #[serde(
        rename = "intelligencePriority",
        skip_serializing_if = "Option::is_none"
    )]
    pub intelligence_priority: Option<f64>,
}

/// A hint naming a model family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelHint {
    /// Substring-matched model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// JSON-RPC envelope
// ============================================================================

/// A JSON-RPC request (has both `id` and `method`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Correlation identifier
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request envelope
    pub fn new<T: Serialize>(
        id: RequestId,
        method: &str,
        params: Option<T>,
    ) -> Result<Self, serde_json::Error> {
        let params = params.map(serde_json::to_value).transpose()?;
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        })
    }
}

/// A successful JSON-RPC response (has `id` and `result`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Correlation identifier copied from the request
    pub id: RequestId,
    /// Result payload
    pub result: Value,
}

impl JsonRpcResponse {
    /// Create a successful response envelope
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }
}

/// A JSON-RPC error response (has `id` and `error`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Correlation identifier copied from the request
    pub id: RequestId,
    /// Error payload
    pub error: ErrorObject,
}

impl JsonRpcError {
    /// Create an error response envelope
    pub fn new(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error,
        }
    }
}

/// The error payload of a JSON-RPC error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    /// Error code; this protocol uses positive codes for lifecycle errors
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Optional structured detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error object without detail data
    pub fn new<S: Into<String>>(code: i64, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A JSON-RPC notification (has `method` only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification envelope
    pub fn new<T: Serialize>(method: &str, params: Option<T>) -> Result<Self, serde_json::Error> {
        let params = params.map(serde_json::to_value).transpose()?;
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        })
    }
}

/// Any single JSON-RPC envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Request: `id` + `method`
    Request(JsonRpcRequest),
    /// Error response: `id` + `error`
    Error(JsonRpcError),
    /// Successful response: `id` + `result`
    Response(JsonRpcResponse),
    /// Notification: `method` only
    Notification(JsonRpcNotification),
}

// ============================================================================
// Error codes
// ============================================================================

/// JSON-RPC error codes used by this runtime
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not handled
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Lifecycle error: "Initialized" on re-init, "Not initialized" before
    /// the initialized notification. The reference protocol uses this
    /// positive code for both.
    pub const LIFECYCLE: i64 = 1;
    /// The requested protocol version is outside the supported set
    pub const UNSUPPORTED_PROTOCOL_VERSION: i64 = 20241105;
}

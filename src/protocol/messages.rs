// ! MCP protocol messages
// !
// ! Module defines the parameter and result types for every method in the
// ! catalogue, and the envelope unions used when decoding batches of
// ! messages from either side of the conversation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::error::{McpError, McpResult};
use crate::protocol::methods;
use crate::protocol::types::*;
use crate::protocol::version::ProtocolVersion;

// ============================================================================
// Request parameter types
// ============================================================================

/// Parameters for the initialize request.
///
/// The version travels as its raw wire string so that a server can name an
/// unsupported revision in its error message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    /// Protocol version the client wants to speak
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities
    pub capabilities: ClientCapabilities,
    /// Client implementation info
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Initialize parameters for a client speaking the given version
    pub fn new(client_info: ClientInfo, version: ProtocolVersion) -> Self {
        Self {
            protocol_version: version.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// Parameters for a ping request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PingParams {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

/// Parameters shared by the paginated list requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListParams {
    /// Pagination cursor from a previous result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// Parameters for resources/read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceParams {
    /// URI of the resource to read
    pub uri: String,
}

/// Parameters for resources/subscribe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribeParams {
    /// URI to watch for updates
    pub uri: String,
}

/// Parameters for resources/unsubscribe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnsubscribeParams {
    /// URI to stop watching
    pub uri: String,
}

/// Parameters for prompts/get
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptParams {
    /// Name of the prompt to materialize
    pub name: String,
    /// Template arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// Parameters for tools/call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolParams {
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments keyed by parameter name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// Parameters for logging/setLevel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetLevelParams {
    /// Minimum severity the client wants to receive
    pub level: LoggingLevel,
}

/// Parameters for completion/complete
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteParams {
    /// What is being completed: a prompt or a resource template
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// The argument under completion
    pub argument: CompletionArgument,
}

/// Reference to the item a completion applies to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// A prompt, by name
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    /// A resource template, by URI
    #[serde(rename = "ref/resource")]
    Resource { uri: String },
}

/// Name and partial value of the argument under completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionArgument {
    /// Argument name
    pub name: String,
    /// Value typed so far
    pub value: String,
}

/// Parameters for sampling/createMessage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageParams {
    /// The conversation so far
    pub messages: Vec<SamplingMessage>,
    /// Model selection preferences
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// Optional system prompt
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Which servers' context to include
    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<String>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// Stop sequences
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Provider-specific metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

/// Parameters for roots/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRootsParams {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

// ============================================================================
// Notification parameter types
// ============================================================================

/// Parameters for notifications/cancelled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelledParams {
    /// ID of the request being cancelled
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Optional human-readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Parameters for notifications/progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressParams {
    /// Token from the originating request's `_meta`
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// Progress so far; increases monotonically
    pub progress: f64,
    /// Total units of work, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Parameters for notifications/message (server log output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingMessageParams {
    /// Severity of this message
    pub level: LoggingLevel,
    /// Optional logger name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Arbitrary payload to log
    pub data: Value,
}

/// Parameters for notifications/resources/updated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceUpdatedParams {
    /// URI of the resource that changed
    pub uri: String,
}

// ============================================================================
// Result types
// ============================================================================

/// A result with no specialized fields, only the `_meta` container and any
/// additional properties a peer chose to attach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EmptyResult {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of initialize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    /// The version the server chose for this session
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Server implementation info
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Usage instructions for the client's model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Result of resources/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListResourcesResult {
    /// One page of resources
    pub resources: Vec<Resource>,
    /// Cursor for the next page, absent on the final page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Result of resources/templates/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListResourceTemplatesResult {
    /// One page of resource templates
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    /// Cursor for the next page, absent on the final page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Result of resources/read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReadResourceResult {
    /// Every contents entry whose resource URI matched the request
    pub contents: Vec<ResourceContents>,
}

/// Result of prompts/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListPromptsResult {
    /// One page of prompts
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page, absent on the final page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Result of prompts/get
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GetPromptResult {
    /// Description of the materialized prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The materialized messages
    pub messages: Vec<PromptMessage>,
}

/// Result of tools/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListToolsResult {
    /// One page of tools
    pub tools: Vec<Tool>,
    /// Cursor for the next page, absent on the final page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Result of tools/call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CallToolResult {
    /// Content produced by the tool
    pub content: Vec<ToolResultContent>,
    /// True when the tool itself failed
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Result of completion/complete
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompleteResult {
    /// The completion values
    pub completion: Completion,
}

/// Completion values for one argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Completion {
    /// Candidate values, at most 100
    pub values: Vec<String>,
    /// Total candidates available, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Whether more candidates exist beyond `values`
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// Result of sampling/createMessage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageResult {
    /// Who produced the completion
    pub role: Role,
    /// The completion content
    pub content: MessageContent,
    /// Name of the model that produced it
    pub model: String,
    /// Why generation stopped
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Result of roots/list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRootsResult {
    /// The client's root boundaries
    pub roots: Vec<Root>,
}

// ============================================================================
// Envelope unions
// ============================================================================

fn decode_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: &Option<Value>,
) -> McpResult<T> {
    match params {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| McpError::InvalidParams(format!("{method}: {e}"))),
        None => Err(McpError::InvalidParams(format!("{method}: missing params"))),
    }
}

fn decode_params_or_default<T: serde::de::DeserializeOwned + Default>(
    method: &str,
    params: &Option<Value>,
) -> McpResult<T> {
    match params {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| McpError::InvalidParams(format!("{method}: {e}"))),
        None => Ok(T::default()),
    }
}

/// Every request a client may issue, with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Initialize(InitializeParams),
    Ping(PingParams),
    ListResources(ListParams),
    ReadResource(ReadResourceParams),
    ListResourceTemplates(ListParams),
    Subscribe(SubscribeParams),
    Unsubscribe(UnsubscribeParams),
    ListPrompts(ListParams),
    GetPrompt(GetPromptParams),
    ListTools(ListParams),
    CallTool(CallToolParams),
    SetLevel(SetLevelParams),
    Complete(CompleteParams),
}

impl ClientRequest {
    /// The fixed method name of this request
    pub fn method(&self) -> &'static str {
        match self {
            ClientRequest::Initialize(_) => methods::INITIALIZE,
            ClientRequest::Ping(_) => methods::PING,
            ClientRequest::ListResources(_) => methods::RESOURCES_LIST,
            ClientRequest::ReadResource(_) => methods::RESOURCES_READ,
            ClientRequest::ListResourceTemplates(_) => methods::RESOURCES_TEMPLATES_LIST,
            ClientRequest::Subscribe(_) => methods::RESOURCES_SUBSCRIBE,
            ClientRequest::Unsubscribe(_) => methods::RESOURCES_UNSUBSCRIBE,
            ClientRequest::ListPrompts(_) => methods::PROMPTS_LIST,
            ClientRequest::GetPrompt(_) => methods::PROMPTS_GET,
            ClientRequest::ListTools(_) => methods::TOOLS_LIST,
            ClientRequest::CallTool(_) => methods::TOOLS_CALL,
            ClientRequest::SetLevel(_) => methods::LOGGING_SET_LEVEL,
            ClientRequest::Complete(_) => methods::COMPLETION_COMPLETE,
        }
    }

    /// Decode a typed request from a raw envelope
    pub fn from_request(request: &JsonRpcRequest) -> McpResult<Self> {
        let m = request.method.as_str();
        let p = &request.params;
        match m {
            methods::INITIALIZE => Ok(Self::Initialize(decode_params(m, p)?)),
            methods::PING => Ok(Self::Ping(decode_params_or_default(m, p)?)),
            methods::RESOURCES_LIST => Ok(Self::ListResources(decode_params_or_default(m, p)?)),
            methods::RESOURCES_READ => Ok(Self::ReadResource(decode_params(m, p)?)),
            methods::RESOURCES_TEMPLATES_LIST => {
                Ok(Self::ListResourceTemplates(decode_params_or_default(m, p)?))
            }
            methods::RESOURCES_SUBSCRIBE => Ok(Self::Subscribe(decode_params(m, p)?)),
            methods::RESOURCES_UNSUBSCRIBE => Ok(Self::Unsubscribe(decode_params(m, p)?)),
            methods::PROMPTS_LIST => Ok(Self::ListPrompts(decode_params_or_default(m, p)?)),
            methods::PROMPTS_GET => Ok(Self::GetPrompt(decode_params(m, p)?)),
            methods::TOOLS_LIST => Ok(Self::ListTools(decode_params_or_default(m, p)?)),
            methods::TOOLS_CALL => Ok(Self::CallTool(decode_params(m, p)?)),
            methods::LOGGING_SET_LEVEL => Ok(Self::SetLevel(decode_params(m, p)?)),
            methods::COMPLETION_COMPLETE => Ok(Self::Complete(decode_params(m, p)?)),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }
}

/// Every request a server may issue, with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    Ping(PingParams),
    CreateMessage(Box<CreateMessageParams>),
    ListRoots(ListRootsParams),
}

impl ServerRequest {
    /// The fixed method name of this request
    pub fn method(&self) -> &'static str {
        match self {
            ServerRequest::Ping(_) => methods::PING,
            ServerRequest::CreateMessage(_) => methods::SAMPLING_CREATE_MESSAGE,
            ServerRequest::ListRoots(_) => methods::ROOTS_LIST,
        }
    }

    /// Decode a typed request from a raw envelope
    pub fn from_request(request: &JsonRpcRequest) -> McpResult<Self> {
        let m = request.method.as_str();
        let p = &request.params;
        match m {
            methods::PING => Ok(Self::Ping(decode_params_or_default(m, p)?)),
            methods::SAMPLING_CREATE_MESSAGE => {
                Ok(Self::CreateMessage(Box::new(decode_params(m, p)?)))
            }
            methods::ROOTS_LIST => Ok(Self::ListRoots(decode_params_or_default(m, p)?)),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }
}

/// Every notification a client may emit
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    Initialized,
    Cancelled(CancelledParams),
    Progress(ProgressParams),
    RootsListChanged,
}

impl ClientNotification {
    /// The fixed method name of this notification
    pub fn method(&self) -> &'static str {
        match self {
            ClientNotification::Initialized => methods::INITIALIZED,
            ClientNotification::Cancelled(_) => methods::CANCELLED,
            ClientNotification::Progress(_) => methods::PROGRESS,
            ClientNotification::RootsListChanged => methods::ROOTS_LIST_CHANGED,
        }
    }

    /// Decode a typed notification from a raw envelope
    pub fn from_notification(notification: &JsonRpcNotification) -> McpResult<Self> {
        let m = notification.method.as_str();
        let p = &notification.params;
        match m {
            methods::INITIALIZED => Ok(Self::Initialized),
            methods::CANCELLED => Ok(Self::Cancelled(decode_params(m, p)?)),
            methods::PROGRESS => Ok(Self::Progress(decode_params(m, p)?)),
            methods::ROOTS_LIST_CHANGED => Ok(Self::RootsListChanged),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }
}

/// Every notification a server may emit
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    Cancelled(CancelledParams),
    Progress(ProgressParams),
    LoggingMessage(LoggingMessageParams),
    ResourcesListChanged,
    ResourcesUpdated(ResourceUpdatedParams),
    PromptsListChanged,
    ToolsListChanged,
}

impl ServerNotification {
    /// The fixed method name of this notification
    pub fn method(&self) -> &'static str {
        match self {
            ServerNotification::Cancelled(_) => methods::CANCELLED,
            ServerNotification::Progress(_) => methods::PROGRESS,
            ServerNotification::LoggingMessage(_) => methods::LOGGING_MESSAGE,
            ServerNotification::ResourcesListChanged => methods::RESOURCES_LIST_CHANGED,
            ServerNotification::ResourcesUpdated(_) => methods::RESOURCES_UPDATED,
            ServerNotification::PromptsListChanged => methods::PROMPTS_LIST_CHANGED,
            ServerNotification::ToolsListChanged => methods::TOOLS_LIST_CHANGED,
        }
    }

    /// The parameters of this notification, if any
    pub fn params(&self) -> McpResult<Option<Value>> {
        let params = match self {
            ServerNotification::Cancelled(p) => Some(serde_json::to_value(p)?),
            ServerNotification::Progress(p) => Some(serde_json::to_value(p)?),
            ServerNotification::LoggingMessage(p) => Some(serde_json::to_value(p)?),
            ServerNotification::ResourcesUpdated(p) => Some(serde_json::to_value(p)?),
            ServerNotification::ResourcesListChanged
            | ServerNotification::PromptsListChanged
            | ServerNotification::ToolsListChanged => None,
        };
        Ok(params)
    }

    /// Decode a typed notification from a raw envelope
    pub fn from_notification(notification: &JsonRpcNotification) -> McpResult<Self> {
        let m = notification.method.as_str();
        let p = &notification.params;
        match m {
            methods::CANCELLED => Ok(Self::Cancelled(decode_params(m, p)?)),
            methods::PROGRESS => Ok(Self::Progress(decode_params(m, p)?)),
            methods::LOGGING_MESSAGE => Ok(Self::LoggingMessage(decode_params(m, p)?)),
            methods::RESOURCES_LIST_CHANGED => Ok(Self::ResourcesListChanged),
            methods::RESOURCES_UPDATED => Ok(Self::ResourcesUpdated(decode_params(m, p)?)),
            methods::PROMPTS_LIST_CHANGED => Ok(Self::PromptsListChanged),
            methods::TOOLS_LIST_CHANGED => Ok(Self::ToolsListChanged),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }
}

/// Results a client can return for server-initiated requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClientResult {
    /// Result of sampling/createMessage
    CreateMessage(CreateMessageResult),
    /// Result of roots/list
    ListRoots(ListRootsResult),
    /// Result of ping or any unspecialized request
    Empty(EmptyResult),
}

// ! Per-session server state
// !
// ! A session owns its resource, template, prompt, tool and root
// ! registries plus the subscription set. List mutations debounce a single
// ! list-changed notification per event-loop cycle per kind; replacing a
// ! subscribed resource emits an updated notification immediately.

use serde_json::Map;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::protocol::messages::ServerNotification;
use crate::protocol::types::{
    ClientInfo, Cursor, LoggingLevel, Prompt, PromptMessage, Resource, ResourceContents,
    ResourceTemplate, Root, Tool, ToolResultContent,
};
use crate::protocol::version::ProtocolVersion;
use crate::server::toolset::ToolSet;
use crate::transport::traits::SessionId;

/// Default page size for the paginated list endpoints
pub const PAGE_SIZE: usize = 50;

/// Return one page of `items` starting at the integer-offset cursor, plus
/// the cursor for the next page when more remain. Invalid or out-of-range
/// cursors restart from the beginning.
pub fn paginate<T: Clone>(items: &[T], cursor: Option<&str>) -> (Vec<T>, Option<Cursor>) {
    let mut start = cursor
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    if start >= items.len() {
        start = 0;
    }

    let end = (start + PAGE_SIZE).min(items.len());
    let page = items[start..end].to_vec();
    let next = if end < items.len() {
        Some(end.to_string())
    } else {
        None
    };
    (page, next)
}

/// Which session list a debounced notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Resources,
    Prompts,
    Tools,
}

impl ListKind {
    fn notification(self) -> ServerNotification {
        match self {
            ListKind::Resources => ServerNotification::ResourcesListChanged,
            ListKind::Prompts => ServerNotification::PromptsListChanged,
            ListKind::Tools => ServerNotification::ToolsListChanged,
        }
    }
}

/// Channel the server drains to turn session events into wire traffic
pub type NotificationSender = mpsc::UnboundedSender<(SessionId, ServerNotification)>;

/// State of one client connection on the server side
pub struct ServerSession {
    id: SessionId,
    initialized: bool,
    protocol_version: ProtocolVersion,
    client_info: Option<ClientInfo>,
    resources: Vec<(Resource, ResourceContents)>,
    resource_templates: Vec<ResourceTemplate>,
    prompts: Vec<(Prompt, PromptMessage)>,
    tool_sets: Vec<Arc<ToolSet>>,
    roots: Vec<Root>,
    subscriptions: HashSet<String>,
    logging_level: Option<LoggingLevel>,
    notify_tx: NotificationSender,
    /// List kinds with a coalesced notification still in flight
    dirty: Arc<Mutex<HashSet<ListKind>>>,
}

impl ServerSession {
    /// Create the state for a freshly announced session
    pub fn new(id: SessionId, notify_tx: NotificationSender) -> Self {
        Self {
            id,
            initialized: false,
            protocol_version: ProtocolVersion::default(),
            client_info: None,
            resources: Vec::new(),
            resource_templates: Vec::new(),
            prompts: Vec::new(),
            tool_sets: Vec::new(),
            roots: Vec::new(),
            subscriptions: HashSet::new(),
            logging_level: None,
            notify_tx,
            dirty: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the initialized notification has arrived
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Flip the initialization flag
    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    /// The version negotiated during initialize
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Record the negotiated version
    pub fn set_protocol_version(&mut self, version: ProtocolVersion) {
        self.protocol_version = version;
    }

    /// The peer's identity from the initialize request
    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    /// Record the peer's identity
    pub fn set_client_info(&mut self, info: ClientInfo) {
        self.client_info = Some(info);
    }

    /// Coalesce a list-changed notification: the first mutation of a kind
    /// in an event-loop cycle schedules one notification, later mutations
    /// in the same cycle fold into it.
    fn mark_list_changed(&self, kind: ListKind) {
        {
            let mut dirty = match self.dirty.lock() {
                Ok(dirty) => dirty,
                Err(_) => return,
            };
            if !dirty.insert(kind) {
                return;
            }
        }

        let dirty = Arc::clone(&self.dirty);
        let notify_tx = self.notify_tx.clone();
        let session = self.id;
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            if let Ok(mut dirty) = dirty.lock() {
                dirty.remove(&kind);
            }
            let _ = notify_tx.send((session, kind.notification()));
        });
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Append a resource with its readable contents
    pub fn append_resource(&mut self, resource: Resource, contents: ResourceContents) {
        self.resources.push((resource, contents));
        self.mark_list_changed(ListKind::Resources);
    }

    /// Insert a resource at an index
    pub fn insert_resource(&mut self, index: usize, resource: Resource, contents: ResourceContents) {
        self.resources.insert(index, (resource, contents));
        self.mark_list_changed(ListKind::Resources);
    }

    /// Replace the resource at a URI.
    ///
    /// Emits a resources/updated notification iff the URI is in the
    /// session's subscription set at replace time.
    pub fn replace_resource(
        &mut self,
        uri: &str,
        resource: Resource,
        contents: ResourceContents,
    ) -> bool {
        let Some(slot) = self.resources.iter_mut().find(|(r, _)| r.uri == uri) else {
            return false;
        };
        *slot = (resource, contents);
        if self.subscriptions.contains(uri) {
            let _ = self.notify_tx.send((
                self.id,
                ServerNotification::ResourcesUpdated(
                    crate::protocol::messages::ResourceUpdatedParams {
                        uri: uri.to_string(),
                    },
                ),
            ));
        }
        true
    }

    /// Remove the first resource at a URI
    pub fn remove_resource(&mut self, uri: &str) -> bool {
        let Some(index) = self.resources.iter().position(|(r, _)| r.uri == uri) else {
            return false;
        };
        self.resources.remove(index);
        self.mark_list_changed(ListKind::Resources);
        true
    }

    /// One page of the session's resources
    pub fn resources(&self, cursor: Option<&str>) -> (Vec<Resource>, Option<Cursor>) {
        let all: Vec<Resource> = self.resources.iter().map(|(r, _)| r.clone()).collect();
        paginate(&all, cursor)
    }

    /// Every contents entry whose resource URI matches
    pub fn contents(&self, uri: &str) -> Vec<ResourceContents> {
        self.resources
            .iter()
            .filter(|(r, _)| r.uri == uri)
            .map(|(_, c)| c.clone())
            .collect()
    }

    // ========================================================================
    // Resource templates
    // ========================================================================

    /// Append a resource template
    pub fn append_resource_template(&mut self, template: ResourceTemplate) {
        self.resource_templates.push(template);
    }

    /// Insert a resource template at an index
    pub fn insert_resource_template(&mut self, index: usize, template: ResourceTemplate) {
        self.resource_templates.insert(index, template);
    }

    /// Replace the resource template at an index
    pub fn replace_resource_template(&mut self, index: usize, template: ResourceTemplate) {
        self.resource_templates[index] = template;
    }

    /// Remove a resource template by its URI template
    pub fn remove_resource_template(&mut self, uri_template: &str) -> bool {
        let Some(index) = self
            .resource_templates
            .iter()
            .position(|t| t.uri_template == uri_template)
        else {
            return false;
        };
        self.resource_templates.remove(index);
        true
    }

    /// One page of the session's resource templates
    pub fn resource_templates(&self, cursor: Option<&str>) -> (Vec<ResourceTemplate>, Option<Cursor>) {
        paginate(&self.resource_templates, cursor)
    }

    // ========================================================================
    // Prompts
    // ========================================================================

    /// Append a prompt with the message it materializes into
    pub fn append_prompt(&mut self, prompt: Prompt, message: PromptMessage) {
        self.prompts.push((prompt, message));
        self.mark_list_changed(ListKind::Prompts);
    }

    /// Insert a prompt at an index
    pub fn insert_prompt(&mut self, index: usize, prompt: Prompt, message: PromptMessage) {
        self.prompts.insert(index, (prompt, message));
        self.mark_list_changed(ListKind::Prompts);
    }

    /// Replace the prompt at an index
    pub fn replace_prompt(&mut self, index: usize, prompt: Prompt, message: PromptMessage) {
        self.prompts[index] = (prompt, message);
        self.mark_list_changed(ListKind::Prompts);
    }

    /// Remove every prompt with a name
    pub fn remove_prompt(&mut self, name: &str) -> bool {
        let before = self.prompts.len();
        self.prompts.retain(|(p, _)| p.name != name);
        if self.prompts.len() != before {
            self.mark_list_changed(ListKind::Prompts);
            true
        } else {
            false
        }
    }

    /// One page of the session's prompts
    pub fn prompts(&self, cursor: Option<&str>) -> (Vec<Prompt>, Option<Cursor>) {
        let all: Vec<Prompt> = self.prompts.iter().map(|(p, _)| p.clone()).collect();
        paginate(&all, cursor)
    }

    /// The messages of every prompt with a name
    pub fn prompt_messages(&self, name: &str) -> Vec<PromptMessage> {
        self.prompts
            .iter()
            .filter(|(p, _)| p.name == name)
            .map(|(_, m)| m.clone())
            .collect()
    }

    // ========================================================================
    // Tools
    // ========================================================================

    /// Register a tool set on this session
    pub fn register_tool_set(&mut self, tool_set: Arc<ToolSet>) {
        self.tool_sets.push(tool_set);
        self.mark_list_changed(ListKind::Tools);
    }

    /// Unregister every tool set with a name
    pub fn unregister_tool_set(&mut self, name: &str) -> bool {
        let before = self.tool_sets.len();
        self.tool_sets.retain(|set| set.name() != name);
        if self.tool_sets.len() != before {
            self.mark_list_changed(ListKind::Tools);
            true
        } else {
            false
        }
    }

    /// The session's tools, sorted by name
    pub fn tools(&self, cursor: Option<&str>) -> (Vec<Tool>, Option<Cursor>) {
        let mut all: Vec<Tool> = self
            .tool_sets
            .iter()
            .flat_map(|set| set.tools())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        paginate(&all, cursor)
    }

    /// Resolve and invoke a tool. `ok` is false when no tool matched or
    /// its arguments failed to convert.
    pub fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, serde_json::Value>,
    ) -> (Vec<ToolResultContent>, bool) {
        for set in &self.tool_sets {
            if let Some(outcome) = set.call(self.id, name, arguments) {
                return outcome;
            }
        }
        tracing::warn!("{name} not found for {arguments:?}");
        (Vec::new(), false)
    }

    // ========================================================================
    // Roots, subscriptions, logging
    // ========================================================================

    /// One page of the roots the client reported
    pub fn roots(&self, cursor: Option<&str>) -> (Vec<Root>, Option<Cursor>) {
        paginate(&self.roots, cursor)
    }

    /// Replace the recorded roots
    pub fn set_roots(&mut self, roots: Vec<Root>) {
        self.roots = roots;
    }

    /// Add a URI to the subscription set
    pub fn subscribe(&mut self, uri: &str) {
        self.subscriptions.insert(uri.to_string());
    }

    /// Remove a URI from the subscription set
    pub fn unsubscribe(&mut self, uri: &str) {
        self.subscriptions.remove(uri);
    }

    /// Whether updates for a URI are being watched
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions.contains(uri)
    }

    /// The minimum severity the client asked for, if any
    pub fn logging_level(&self) -> Option<LoggingLevel> {
        self.logging_level
    }

    /// Record the requested minimum severity
    pub fn set_logging_level(&mut self, level: LoggingLevel) {
        self.logging_level = Some(level);
    }

    /// Whether a message at `level` passes the session's filter.
    ///
    /// Before logging/setLevel arrives, nothing is delivered.
    pub fn should_log(&self, level: LoggingLevel) -> bool {
        match self.logging_level {
            Some(minimum) => level >= minimum,
            None => false,
        }
    }
}

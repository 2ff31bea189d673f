// ! MCP method name constants

// Core protocol methods
pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "notifications/initialized";
pub const PING: &str = "ping";

// Resource-related methods
pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";

// Prompt-related methods
pub const PROMPTS_LIST: &str = "prompts/list";
pub const PROMPTS_GET: &str = "prompts/get";
pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";

// Tool-related methods
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

// Logging methods
pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
pub const LOGGING_MESSAGE: &str = "notifications/message";

// Completion methods
pub const COMPLETION_COMPLETE: &str = "completion/complete";

// Sampling methods
pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";

// Root-related methods
pub const ROOTS_LIST: &str = "roots/list";
pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";

// Progress and cancellation
pub const PROGRESS: &str = "notifications/progress";
pub const CANCELLED: &str = "notifications/cancelled";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_methods_prefix() {
        let notification_methods = [
            INITIALIZED,
            RESOURCES_UPDATED,
            RESOURCES_LIST_CHANGED,
            PROMPTS_LIST_CHANGED,
            TOOLS_LIST_CHANGED,
            ROOTS_LIST_CHANGED,
            LOGGING_MESSAGE,
            PROGRESS,
            CANCELLED,
        ];
        for method in notification_methods {
            assert!(
                method.starts_with("notifications/"),
                "notification method without prefix: {method}"
            );
        }
    }

    #[test]
    fn test_request_methods_no_notification_prefix() {
        let request_methods = [
            INITIALIZE,
            PING,
            RESOURCES_LIST,
            RESOURCES_READ,
            RESOURCES_TEMPLATES_LIST,
            RESOURCES_SUBSCRIBE,
            RESOURCES_UNSUBSCRIBE,
            PROMPTS_LIST,
            PROMPTS_GET,
            TOOLS_LIST,
            TOOLS_CALL,
            LOGGING_SET_LEVEL,
            COMPLETION_COMPLETE,
            SAMPLING_CREATE_MESSAGE,
            ROOTS_LIST,
        ];
        for method in request_methods {
            assert!(
                !method.starts_with("notifications/"),
                "request method with notification prefix: {method}"
            );
        }
    }

    #[test]
    fn test_method_constants_unique() {
        let methods = [
            INITIALIZE,
            INITIALIZED,
            PING,
            RESOURCES_LIST,
            RESOURCES_READ,
            RESOURCES_TEMPLATES_LIST,
            RESOURCES_SUBSCRIBE,
            RESOURCES_UNSUBSCRIBE,
            RESOURCES_UPDATED,
            RESOURCES_LIST_CHANGED,
            PROMPTS_LIST,
            PROMPTS_GET,
            PROMPTS_LIST_CHANGED,
            TOOLS_LIST,
            TOOLS_CALL,
            TOOLS_LIST_CHANGED,
            LOGGING_SET_LEVEL,
            LOGGING_MESSAGE,
            COMPLETION_COMPLETE,
            SAMPLING_CREATE_MESSAGE,
            ROOTS_LIST,
            ROOTS_LIST_CHANGED,
            PROGRESS,
            CANCELLED,
        ];
        let mut seen = std::collections::HashSet::new();
        for method in methods {
            assert!(seen.insert(method), "duplicate method constant: {method}");
        }
    }
}

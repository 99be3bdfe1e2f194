use thiserror::Error;

/// Errors produced by the automation engine and its page backends
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Browser process could not be started
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Could not attach to a running browser
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// A script evaluated in the page threw or returned nothing
    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Failed to parse DOM: {0}")]
    DomParseFailed(String),

    /// The element is not (or no longer) attached to the page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Key/value backend failure while reading or writing checkpoints
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required (non-optional) target was not found and no `onMissing` route exists
    #[error("State '{state}' could not resolve its target element")]
    ResolutionMissing { state: String },

    /// A transition (or the current state itself) names a state that is not defined
    #[error("Invalid transition from '{}' to undefined state '{to}'", .from.as_deref().unwrap_or("<start>"))]
    InvalidTransition { from: Option<String>, to: String },

    /// A graph references a predicate that was never registered
    #[error("Unknown capability '{name}'")]
    UnknownCapability { name: String },

    #[error("State machine is already running")]
    AlreadyRunning,
}

impl AutomationError {
    /// Whether this error is one of the engine's fatal halt conditions
    pub fn is_fatal_halt(&self) -> bool {
        matches!(
            self,
            Self::ResolutionMissing { .. } | Self::InvalidTransition { .. } | Self::UnknownCapability { .. }
        )
    }
}

/// Result type alias for automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = AutomationError::InvalidTransition {
            from: Some("collect".to_string()),
            to: "nowhere".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid transition from 'collect' to undefined state 'nowhere'");

        let err = AutomationError::InvalidTransition { from: None, to: "start".to_string() };
        assert!(err.to_string().contains("<start>"));
    }

    #[test]
    fn test_fatal_halt_classification() {
        assert!(AutomationError::ResolutionMissing { state: "a".into() }.is_fatal_halt());
        assert!(AutomationError::UnknownCapability { name: "p".into() }.is_fatal_halt());
        assert!(!AutomationError::Storage("disk full".into()).is_fatal_halt());
        assert!(!AutomationError::AlreadyRunning.is_fatal_halt());
    }
}

//! Error handling for map service publication
//!
//! Step failures inside a workflow are recorded as text in the result.
//! The types here cover the other channel: unexpected collaborator failures
//! that abort a single invocation, plus configuration problems.

use thiserror::Error;

/// Main error type for publication workflow operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The document manager failed unexpectedly during publish
    #[error("Error in PublicationWorkflow.publish: {message} Stack trace: {trace}")]
    PublishAborted { message: String, trace: String },

    /// The document manager failed unexpectedly during unpublish
    #[error("Error in PublicationWorkflow.unpublish: {message} Stack trace: {trace}")]
    UnpublishAborted { message: String, trace: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkflowError {
    /// Wrap a collaborator failure raised while publishing
    pub fn publish_aborted(error: &anyhow::Error) -> Self {
        Self::PublishAborted {
            message: error.to_string(),
            trace: render_trace(error),
        }
    }

    /// Wrap a collaborator failure raised while unpublishing
    pub fn unpublish_aborted(error: &anyhow::Error) -> Self {
        Self::UnpublishAborted {
            message: error.to_string(),
            trace: render_trace(error),
        }
    }

    /// Check if retrying the same invocation could succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConfigError(_))
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::PublishAborted { .. } => vec![
                "Check that the template path points to a readable .mxd file",
                "Check that the output directory exists and is writable",
                "See the document manager log for details",
            ],
            Self::UnpublishAborted { .. } => vec![
                "Check that the service exists on the GIS server",
                "See the document manager log for details",
            ],
            Self::ConfigError(_) => vec![
                "Check .mapservice-publish.yaml for syntax errors",
                "Run `mapservice-publisher check` to validate the request",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::PublishAborted { .. } => "PUBLISH_ABORTED",
            Self::UnpublishAborted { .. } => "UNPUBLISH_ABORTED",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

/// Flatten an error chain into a single line: outermost cause first.
fn render_trace(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(" <- ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_publish_aborted_display() {
        let error = WorkflowError::publish_aborted(&anyhow::anyhow!("template unreadable"));

        let display = error.to_string();
        assert!(display.starts_with("Error in PublicationWorkflow.publish: template unreadable"));
        assert!(display.contains("Stack trace: template unreadable"));
        assert_eq!(error.code(), "PUBLISH_ABORTED");
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_trace_includes_cause_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("permission denied"));
        let error = inner.context("output directory unwritable").unwrap_err();

        let wrapped = WorkflowError::unpublish_aborted(&error);
        match &wrapped {
            WorkflowError::UnpublishAborted { message, trace } => {
                assert_eq!(message, "output directory unwritable");
                assert_eq!(trace, "output directory unwritable <- permission denied");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(wrapped.to_string().starts_with("Error in PublicationWorkflow.unpublish:"));
    }

    #[test]
    fn test_config_error() {
        let error = WorkflowError::ConfigError("HOME not set".to_string());

        assert!(!error.is_recoverable());
        assert_eq!(error.code(), "CONFIG_ERROR");
        assert!(error.suggested_actions().len() >= 2);
    }
}

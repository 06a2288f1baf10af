//! Configuration structures and types for mapservice-publisher
//!
//! This module provides type-safe configuration management with serde support.

use crate::core::traits::CapacitySettings;
use serde::{Deserialize, Serialize};

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Target GIS server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Datastore the working document is rebound to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore: Option<DatastoreConfig>,

    /// Instance pool and timeouts for the legacy publish protocol
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacitySettings>,

    /// Workflow policies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowConfig>,

    /// External helper script used by the script document manager
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper: Option<HelperConfig>,

    /// Security settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// GIS server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerConfig {
    /// Server endpoint (environment variable expansion supported)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Directory working documents are written to
    #[serde(skip_serializing_if = "Option::is_none", rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

/// Datastore settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DatastoreConfig {
    /// Connection descriptor (file geodatabase path or enterprise connection)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    /// Dataset identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    /// Versioned enterprise store (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<bool>,
}

/// Workflow policy settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkflowConfig {
    /// What to do when document creation fails (default: continue)
    #[serde(skip_serializing_if = "Option::is_none", rename = "onCreateFailure")]
    pub on_create_failure: Option<CreateFailurePolicy>,

    /// Trailing separator handling on unpublish (default: legacy)
    #[serde(skip_serializing_if = "Option::is_none", rename = "unpublishTrim")]
    pub unpublish_trim: Option<UnpublishTrim>,

    /// Enable the connection-file publish protocol (default: on 64-bit targets)
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "connectionFilePublishing"
    )]
    pub connection_file_publishing: Option<bool>,
}

/// Policy applied when the create-document step fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreateFailurePolicy {
    /// Record the failure and still publish against the computed path
    #[default]
    Continue,
    /// Record the failure and skip the publish step
    Abort,
}

/// Trailing separator handling for the unpublish response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnpublishTrim {
    /// Terminate each fragment with a comma, then drop exactly one trailing character
    #[default]
    Legacy,
    /// Join fragments with commas; never trims content
    Separator,
}

/// Helper script settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HelperConfig {
    /// Interpreter used to run helper and publishing scripts (default: "python")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    /// Helper script handling create/publish/unpublish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Per-command timeout in seconds (default: none)
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,

    /// Interpreters the command executor may launch
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedInterpreters")]
    pub allowed_interpreters: Option<Vec<String>>,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Environment variable expansion settings
    #[serde(skip_serializing_if = "Option::is_none", rename = "envVarExpansion")]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedPrefixes")]
    pub allowed_prefixes: Option<Vec<String>>,

    /// Forbidden patterns (regex) for environment variable names
    #[serde(skip_serializing_if = "Option::is_none", rename = "forbiddenPatterns")]
    pub forbidden_patterns: Option<Vec<String>>,
}

/// Policies resolved from configuration for one workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub on_create_failure: CreateFailurePolicy,
    pub unpublish_trim: UnpublishTrim,
    pub connection_file_publishing: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            on_create_failure: CreateFailurePolicy::Continue,
            unpublish_trim: UnpublishTrim::Legacy,
            connection_file_publishing: cfg!(target_pointer_width = "64"),
        }
    }
}

/// Default configuration values
impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            server: None,
            datastore: None,
            capacity: Some(CapacitySettings::default()),
            workflow: None,
            helper: None,
            security: Some(SecurityConfig::default()),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            env_var_expansion: Some(EnvVarExpansionConfig {
                enabled: Some(true),
                allowed_prefixes: None,
                forbidden_patterns: None,
            }),
        }
    }
}

impl PublisherConfig {
    /// Resolve workflow policies, falling back to defaults
    pub fn workflow_options(&self) -> WorkflowOptions {
        let defaults = WorkflowOptions::default();
        let Some(workflow) = &self.workflow else {
            return defaults;
        };

        WorkflowOptions {
            on_create_failure: workflow
                .on_create_failure
                .unwrap_or(defaults.on_create_failure),
            unpublish_trim: workflow.unpublish_trim.unwrap_or(defaults.unpublish_trim),
            connection_file_publishing: workflow
                .connection_file_publishing
                .unwrap_or(defaults.connection_file_publishing),
        }
    }

    /// Capacity settings for the legacy protocol
    pub fn capacity_settings(&self) -> CapacitySettings {
        self.capacity.unwrap_or_default()
    }
}

//! Core traits and types for map service publication
//!
//! This module defines the document manager seam, the per-invocation request
//! model and the structured results the workflow produces.

use crate::core::sanitizer::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker identifying a file geodatabase in a connection descriptor
pub const FILE_GEODATABASE_MARKER: &str = ".gdb";

/// Map document template extension
pub const TEMPLATE_EXTENSION: &str = ".mxd";

// ============================================================================
// Request
// ============================================================================

/// Immutable configuration for one publish or unpublish invocation
///
/// The raw service name is sanitized on the way in; only the sanitized form
/// is ever handed to the document manager, including for deserialized requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPublicationRequest")]
pub struct PublicationRequest {
    template_path: String,
    server: String,
    service_name: String,
    output_directory: String,
    connection: String,
    dataset: String,
    enterprise: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_id: Option<String>,
}

impl PublicationRequest {
    /// Create a request for `template_path` on `server`
    ///
    /// # Examples
    ///
    /// ```
    /// use mapservice_publisher::core::PublicationRequest;
    ///
    /// let request = PublicationRequest::new(r"C:\maps\roads.mxd", "http://gis:6080")
    ///     .with_service_name("Road Network, 2024");
    /// assert_eq!(request.service_name(), "Road_Network_2024");
    /// ```
    pub fn new(template_path: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            template_path: template_path.into(),
            server: server.into(),
            service_name: String::new(),
            output_directory: String::new(),
            connection: String::new(),
            dataset: String::new(),
            enterprise: false,
            service_id: None,
        }
    }

    pub fn with_service_name(mut self, raw_name: &str) -> Self {
        self.service_name = sanitize(raw_name);
        self
    }

    pub fn with_output_directory(mut self, output_directory: impl Into<String>) -> Self {
        self.output_directory = output_directory.into();
        self
    }

    /// Bind the request to a datastore
    ///
    /// `enterprise` marks a versioned (SDE) store; a connection containing
    /// `.gdb` is treated as a file geodatabase on unpublish.
    pub fn with_datastore(
        mut self,
        connection: impl Into<String>,
        dataset: impl Into<String>,
        enterprise: bool,
    ) -> Self {
        self.connection = connection.into();
        self.dataset = dataset.into();
        self.enterprise = enterprise;
        self
    }

    /// Name the service to remove on unpublish
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn template_path(&self) -> &str {
        &self.template_path
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Sanitized service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn output_directory(&self) -> &str {
        &self.output_directory
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn is_enterprise(&self) -> bool {
        self.enterprise
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    /// True when the connection points at a file geodatabase
    pub fn targets_file_geodatabase(&self) -> bool {
        self.connection.contains(FILE_GEODATABASE_MARKER)
    }
}

/// Wire form of [`PublicationRequest`] before the service name is sanitized
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPublicationRequest {
    template_path: String,
    server: String,
    service_name: String,
    output_directory: String,
    connection: String,
    dataset: String,
    enterprise: bool,
    service_id: Option<String>,
}

impl From<RawPublicationRequest> for PublicationRequest {
    fn from(raw: RawPublicationRequest) -> Self {
        let request = Self::new(raw.template_path, raw.server)
            .with_service_name(&raw.service_name)
            .with_output_directory(raw.output_directory)
            .with_datastore(raw.connection, raw.dataset, raw.enterprise);

        match raw.service_id {
            Some(service_id) => request.with_service_id(service_id),
            None => request,
        }
    }
}

// ============================================================================
// Publish parameters
// ============================================================================

/// Instance pool and timeout values forwarded to the GIS server
///
/// Timeouts are in seconds and advisory: they are passed through, never
/// enforced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapacitySettings {
    pub min_instances: u32,
    pub max_instances: u32,
    pub wait_timeout: u32,
    pub usage_timeout: u32,
    pub idle_timeout: u32,
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            min_instances: 0,
            max_instances: 2,
            wait_timeout: 60,
            usage_timeout: 60,
            idle_timeout: 60,
        }
    }
}

impl CapacitySettings {
    /// All values zero; used by the connection-file protocol
    pub fn zeroed() -> Self {
        Self {
            min_instances: 0,
            max_instances: 0,
            wait_timeout: 0,
            usage_timeout: 0,
            idle_timeout: 0,
        }
    }
}

/// Publish protocol, derived from the parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishProtocol {
    /// Direct parameterized publish (v1)
    Legacy,
    /// Connection file plus publishing script (v2)
    ConnectionFile,
}

/// Arguments of a single publish call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishParameters {
    pub capacity: CapacitySettings,
    #[serde(default)]
    pub connection_file: String,
    #[serde(default)]
    pub script_file: String,
}

impl PublishParameters {
    /// Legacy protocol with the given capacity settings
    pub fn legacy(capacity: CapacitySettings) -> Self {
        Self {
            capacity,
            connection_file: String::new(),
            script_file: String::new(),
        }
    }

    /// Connection-file protocol; capacity values are meaningless there and zeroed
    pub fn connection_file(
        connection_file: impl Into<String>,
        script_file: impl Into<String>,
    ) -> Self {
        Self {
            capacity: CapacitySettings::zeroed(),
            connection_file: connection_file.into(),
            script_file: script_file.into(),
        }
    }

    /// A non-empty connection file selects the connection-file protocol
    pub fn protocol(&self) -> PublishProtocol {
        if self.connection_file.is_empty() {
            PublishProtocol::Legacy
        } else {
            PublishProtocol::ConnectionFile
        }
    }
}

// ============================================================================
// Workflow results
// ============================================================================

/// Steps a workflow invocation can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
    Validate,
    Initialize,
    CreateDocument,
    Publish,
    Unpublish,
    DeleteStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Outcome of one step; `message` is the text folded into the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: WorkflowStep,
    pub status: StepStatus,
    pub message: String,
}

impl StepOutcome {
    pub fn succeeded(step: WorkflowStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Succeeded,
            message: message.into(),
        }
    }

    pub fn failed(step: WorkflowStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            message: message.into(),
        }
    }

    pub fn skipped(step: WorkflowStep) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            message: String::new(),
        }
    }
}

/// Ordered step outcomes of one publish invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<PublishProtocol>,
    pub steps: Vec<StepOutcome>,
    pub duration_ms: i64,
}

impl WorkflowResult {
    pub fn push(&mut self, outcome: StepOutcome) {
        self.steps.push(outcome);
    }

    /// True if any recorded step failed
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn outcome(&self, step: WorkflowStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Comma-joined response text with trailing commas removed
    pub fn render(&self) -> String {
        let joined = self
            .steps
            .iter()
            .filter(|s| !s.message.is_empty())
            .map(|s| s.message.as_str())
            .collect::<Vec<_>>()
            .join(",");

        joined.trim_end_matches(',').to_string()
    }
}

/// Result of an unpublish invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishOutcome {
    pub service_name: String,
    pub removed: bool,
    pub requires_cleanup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_result: Option<String>,
    pub text: String,
}

// ============================================================================
// Validation
// ============================================================================

/// Validation error with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Validation warning with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Result of request validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

// ============================================================================
// Document manager
// ============================================================================

/// Arguments for materializing a working document from a template
#[derive(Debug, Clone, Copy)]
pub struct CreateDocumentArgs<'a> {
    pub template_path: &'a str,
    pub output_directory: &'a str,
    pub server: &'a str,
    pub working_path: &'a Path,
    pub connection: &'a str,
    pub dataset: &'a str,
    pub enterprise: bool,
}

/// Arguments for the legacy (v1) publish call
#[derive(Debug, Clone, Copy)]
pub struct LegacyPublishArgs<'a> {
    pub name: &'a str,
    pub server: &'a str,
    pub working_path: &'a Path,
    pub enterprise: bool,
    pub capacity: CapacitySettings,
}

/// Arguments for the connection-file (v2) publish call
#[derive(Debug, Clone, Copy)]
pub struct ConnectionFilePublishArgs<'a> {
    pub name: &'a str,
    pub server: &'a str,
    pub working_path: &'a Path,
    pub output_directory: &'a str,
    pub connection_file: &'a str,
    pub script_file: &'a str,
}

/// Arguments for removing a published service
#[derive(Debug, Clone, Copy)]
pub struct UnpublishArgs<'a> {
    pub name: &'a str,
    pub server: &'a str,
    pub output_directory: &'a str,
    pub dataset: &'a str,
    pub connection: &'a str,
}

/// Collaborator that manipulates map documents and talks to the GIS server
///
/// Boolean results report step success; string results carry a URL, an error
/// text or a log reference and are folded into the workflow response as-is.
/// `Err` is reserved for unexpected failures and aborts the invocation.
#[async_trait]
pub trait DocumentManager: Send + Sync {
    /// Manager name used in logs
    fn name(&self) -> &str;

    /// Prepare the manager for `template_path` (empty for unpublish)
    async fn initialize(&mut self, template_path: &str) -> anyhow::Result<bool>;

    fn is_initialized(&self) -> bool;

    async fn create_document(&self, args: &CreateDocumentArgs<'_>) -> anyhow::Result<bool>;

    async fn publish_v1(&self, args: &LegacyPublishArgs<'_>) -> anyhow::Result<String>;

    async fn publish_v2(&self, args: &ConnectionFilePublishArgs<'_>) -> anyhow::Result<String>;

    async fn unpublish(&self, args: &UnpublishArgs<'_>) -> anyhow::Result<bool>;

    /// Remove physical storage behind `connection`; empty means nothing to report
    async fn delete_storage(&self, connection: &str) -> anyhow::Result<String>;

    /// Release held resources; called once when the invocation ends
    fn release(&mut self) {}
}

/// Produces a fresh document manager per invocation
pub trait DocumentManagerFactory: Send + Sync {
    fn create(&self) -> Box<dyn DocumentManager>;
}

impl<F> DocumentManagerFactory for F
where
    F: Fn() -> Box<dyn DocumentManager> + Send + Sync,
{
    fn create(&self) -> Box<dyn DocumentManager> {
        self()
    }
}

/// Working document path for a service/template pair
pub fn working_document_path(
    output_directory: &str,
    service_name: &str,
    template_base_name: &str,
) -> PathBuf {
    Path::new(output_directory).join(format!("{}_{}.mxd", service_name, template_base_name))
}

/// Template file name up to its first `.mxd`
///
/// Only the last path component is inspected; `/` and `\` both separate
/// components. Returns `None` when the file name has no `.mxd`.
pub fn template_base_name(template_path: &str) -> Option<&str> {
    let file_name = template_path
        .rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or(template_path);

    file_name
        .find(TEMPLATE_EXTENSION)
        .map(|end| &file_name[..end])
}

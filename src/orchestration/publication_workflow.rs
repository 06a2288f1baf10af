//! Publication workflow: publish and unpublish a map service
//!
//! One workflow instance wraps one [`PublicationRequest`]. Every call acquires
//! a fresh document manager from the factory, runs its steps strictly in
//! order and releases the manager when the call ends.
//!
//! Step failures reported by the manager (a `false` result or an error text)
//! are folded into the returned text. An `Err` from the manager aborts the
//! call and surfaces as [`WorkflowError`].

use crate::core::config::{CreateFailurePolicy, UnpublishTrim, WorkflowOptions};
use crate::core::error::WorkflowError;
use crate::core::state_machine::{WorkflowStage, WorkflowStateMachine};
use crate::core::traits::{
    CapacitySettings, ConnectionFilePublishArgs, CreateDocumentArgs, DocumentManager,
    DocumentManagerFactory, LegacyPublishArgs, PublicationRequest, PublishParameters,
    PublishProtocol, StepOutcome, TEMPLATE_EXTENSION, UnpublishArgs, UnpublishOutcome,
    WorkflowResult, WorkflowStep, template_base_name, working_document_path,
};
use anyhow::anyhow;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const NO_TEMPLATE_MESSAGE: &str = "Error: No MXD passed.";
pub const NO_SERVER_MESSAGE: &str = "Error: No server passed.";
pub const CONNECTION_FILE_DISABLED_MESSAGE: &str =
    "Error: connection-file publishing is not enabled for this configuration.";

/// Scoped document manager; released when dropped
struct ManagerSession {
    manager: Box<dyn DocumentManager>,
}

impl ManagerSession {
    fn acquire<F: DocumentManagerFactory>(factory: &F) -> Self {
        let manager = factory.create();
        debug!(manager = manager.name(), "document manager acquired");
        Self { manager }
    }
}

impl Drop for ManagerSession {
    fn drop(&mut self) {
        self.manager.release();
        debug!(manager = self.manager.name(), "document manager released");
    }
}

/// Publish/unpublish workflow for a single request
pub struct PublicationWorkflow<F: DocumentManagerFactory> {
    request: PublicationRequest,
    factory: F,
    options: WorkflowOptions,
}

impl<F: DocumentManagerFactory> PublicationWorkflow<F> {
    pub fn new(request: PublicationRequest, factory: F) -> Self {
        Self {
            request,
            factory,
            options: WorkflowOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn request(&self) -> &PublicationRequest {
        &self.request
    }

    pub fn options(&self) -> WorkflowOptions {
        self.options
    }

    /// Publish with the default capacity settings (legacy protocol)
    pub async fn publish(&self) -> Result<String, WorkflowError> {
        self.publish_with_defaults(CapacitySettings::default()).await
    }

    /// Publish with configured capacity settings (legacy protocol)
    pub async fn publish_with_defaults(
        &self,
        capacity: CapacitySettings,
    ) -> Result<String, WorkflowError> {
        self.publish_with(PublishParameters::legacy(capacity)).await
    }

    /// Publish through a server connection file and publishing script
    pub async fn publish_with_connection_file(
        &self,
        connection_file: &str,
        script_file: &str,
    ) -> Result<String, WorkflowError> {
        self.publish_with(PublishParameters::connection_file(
            connection_file,
            script_file,
        ))
        .await
    }

    /// Publish and render the response text
    pub async fn publish_with(&self, params: PublishParameters) -> Result<String, WorkflowError> {
        Ok(self.run_publish(params).await?.render())
    }

    /// Publish and return every recorded step
    pub async fn run_publish(
        &self,
        params: PublishParameters,
    ) -> Result<WorkflowResult, WorkflowError> {
        let invocation = Uuid::new_v4();
        info!(%invocation, template = %self.request.template_path(), "publish started");

        let mut machine = WorkflowStateMachine::new();

        match self.execute_publish(&params, &mut machine).await {
            Ok(mut result) => {
                machine.transition(WorkflowStage::Completed, None);
                result.duration_ms = machine.elapsed_ms();
                info!(
                    %invocation,
                    failed = result.has_failures(),
                    stages = machine.transitions().len(),
                    duration_ms = result.duration_ms,
                    "publish finished"
                );
                Ok(result)
            }
            Err(error) => {
                machine.transition(WorkflowStage::Failed, Some(error.to_string().as_str()));
                tracing::error!(
                    %invocation,
                    error = %error,
                    stage = ?machine.stage(),
                    history = %machine.history(),
                    "publish aborted"
                );
                Err(WorkflowError::publish_aborted(&error))
            }
        }
    }

    async fn execute_publish(
        &self,
        params: &PublishParameters,
        machine: &mut WorkflowStateMachine,
    ) -> anyhow::Result<WorkflowResult> {
        let protocol = params.protocol();
        let mut result = WorkflowResult {
            protocol: Some(protocol),
            ..Default::default()
        };

        if let Some(message) = self.missing_input_message() {
            result.push(StepOutcome::failed(WorkflowStep::Validate, message));
            return Ok(result);
        }

        machine.transition(WorkflowStage::Preparing, None);
        let template_path = normalize_template_path(self.request.template_path());

        let mut session = ManagerSession::acquire(&self.factory);
        session.manager.initialize(&template_path).await?;
        if !session.manager.is_initialized() {
            warn!(manager = session.manager.name(), "document manager failed to initialize");
            result.push(StepOutcome::failed(WorkflowStep::Initialize, ""));
            return Ok(result);
        }
        result.push(StepOutcome::succeeded(WorkflowStep::Initialize, ""));

        let service_name = self.request.service_name();
        let output_directory = self.request.output_directory();
        let server = self.request.server();
        let base_name = template_base_name(&template_path).ok_or_else(|| {
            anyhow!(
                "template '{}' has no {} extension",
                template_path,
                TEMPLATE_EXTENSION
            )
        })?;
        let working_path = working_document_path(output_directory, service_name, base_name);
        let publish_name = format!("{}_{}", service_name, base_name);

        machine.transition(
            WorkflowStage::CreatingDocument,
            Some(working_path.display().to_string().as_str()),
        );
        let created = session
            .manager
            .create_document(&CreateDocumentArgs {
                template_path: &template_path,
                output_directory,
                server,
                working_path: &working_path,
                connection: self.request.connection(),
                dataset: self.request.dataset(),
                enterprise: self.request.is_enterprise(),
            })
            .await?;

        if created {
            result.push(StepOutcome::succeeded(WorkflowStep::CreateDocument, ""));
        } else {
            warn!(template = %template_path, "working document was not created");
            result.push(StepOutcome::failed(
                WorkflowStep::CreateDocument,
                format!(
                    "DocumentManager.create_document failed for {}. Please see logfile for details.",
                    template_path
                ),
            ));

            if self.options.on_create_failure == CreateFailurePolicy::Abort {
                result.push(StepOutcome::skipped(WorkflowStep::Publish));
                return Ok(result);
            }
        }

        machine.transition(WorkflowStage::Publishing, Some(publish_name.as_str()));
        let published = match protocol {
            PublishProtocol::Legacy => {
                session
                    .manager
                    .publish_v1(&LegacyPublishArgs {
                        name: &publish_name,
                        server,
                        working_path: &working_path,
                        enterprise: self.request.is_enterprise(),
                        capacity: params.capacity,
                    })
                    .await?
            }
            PublishProtocol::ConnectionFile if !self.options.connection_file_publishing => {
                warn!("connection-file publishing requested but disabled");
                CONNECTION_FILE_DISABLED_MESSAGE.to_string()
            }
            PublishProtocol::ConnectionFile => {
                session
                    .manager
                    .publish_v2(&ConnectionFilePublishArgs {
                        name: &publish_name,
                        server,
                        working_path: &working_path,
                        output_directory,
                        connection_file: &params.connection_file,
                        script_file: &params.script_file,
                    })
                    .await?
            }
        };

        result.push(publish_outcome(published));
        Ok(result)
    }

    /// Remove the service and return the response text
    pub async fn unpublish(&self) -> Result<String, WorkflowError> {
        Ok(self.run_unpublish().await?.text)
    }

    /// Remove the service, cleaning up a file geodatabase on success
    pub async fn run_unpublish(&self) -> Result<UnpublishOutcome, WorkflowError> {
        let invocation = Uuid::new_v4();
        info!(%invocation, template = %self.request.template_path(), "unpublish started");

        let mut machine = WorkflowStateMachine::new();

        match self.execute_unpublish(&mut machine).await {
            Ok(outcome) => {
                machine.transition(WorkflowStage::Completed, None);
                info!(
                    %invocation,
                    service = %outcome.service_name,
                    removed = outcome.removed,
                    stages = machine.transitions().len(),
                    duration_ms = machine.elapsed_ms(),
                    "unpublish finished"
                );
                Ok(outcome)
            }
            Err(error) => {
                machine.transition(WorkflowStage::Failed, Some(error.to_string().as_str()));
                tracing::error!(
                    %invocation,
                    error = %error,
                    stage = ?machine.stage(),
                    history = %machine.history(),
                    "unpublish aborted"
                );
                Err(WorkflowError::unpublish_aborted(&error))
            }
        }
    }

    async fn execute_unpublish(
        &self,
        machine: &mut WorkflowStateMachine,
    ) -> anyhow::Result<UnpublishOutcome> {
        if let Some(message) = self.missing_unpublish_input_message() {
            return Ok(UnpublishOutcome {
                service_name: String::new(),
                removed: false,
                requires_cleanup: false,
                cleanup_result: None,
                text: message.to_string(),
            });
        }

        machine.transition(WorkflowStage::Preparing, None);
        let mut session = ManagerSession::acquire(&self.factory);
        if !session.manager.initialize("").await? {
            debug!(manager = session.manager.name(), "manager reported not initialized");
        }

        let service_name = match self.request.service_id() {
            Some(id) => id.to_string(),
            None => {
                warn!(
                    template = %self.request.template_path(),
                    "no service id given, using the template path as service name"
                );
                self.request.template_path().to_string()
            }
        };

        machine.transition(WorkflowStage::Unpublishing, Some(service_name.as_str()));
        let removed = session
            .manager
            .unpublish(&UnpublishArgs {
                name: &service_name,
                server: self.request.server(),
                output_directory: self.request.output_directory(),
                dataset: self.request.dataset(),
                connection: self.request.connection(),
            })
            .await?;

        let fragment = if removed {
            format!("Removal of {} was successful.", service_name)
        } else {
            warn!(service = %service_name, "service removal failed");
            format!(
                "Error: DocumentManager.unpublish failed for {}. Please see logfile for details.",
                service_name
            )
        };
        let mut text = render_fragments(&[fragment], self.options.unpublish_trim);

        let requires_cleanup = removed && self.request.targets_file_geodatabase();
        let mut cleanup_result = None;
        if requires_cleanup {
            machine.transition(WorkflowStage::CleaningUp, Some(self.request.connection()));
            let cleanup = session
                .manager
                .delete_storage(self.request.connection())
                .await?;
            if !cleanup.is_empty() {
                text.push(',');
                text.push_str(&cleanup);
            }
            cleanup_result = Some(cleanup);
        }

        Ok(UnpublishOutcome {
            service_name,
            removed,
            requires_cleanup,
            cleanup_result,
            text,
        })
    }

    fn missing_input_message(&self) -> Option<&'static str> {
        if self.request.template_path().is_empty() {
            Some(NO_TEMPLATE_MESSAGE)
        } else if self.request.server().is_empty() {
            Some(NO_SERVER_MESSAGE)
        } else {
            None
        }
    }

    /// An explicit service id stands in for the template on unpublish
    fn missing_unpublish_input_message(&self) -> Option<&'static str> {
        match self.request.service_id() {
            Some(id) if !id.is_empty() => self
                .request
                .server()
                .is_empty()
                .then_some(NO_SERVER_MESSAGE),
            _ => self.missing_input_message(),
        }
    }
}

fn publish_outcome(text: String) -> StepOutcome {
    if text.starts_with("Error") {
        StepOutcome::failed(WorkflowStep::Publish, text)
    } else {
        StepOutcome::succeeded(WorkflowStep::Publish, text)
    }
}

fn render_fragments(fragments: &[String], trim: UnpublishTrim) -> String {
    match trim {
        UnpublishTrim::Legacy => {
            let mut text: String = fragments.iter().map(|f| format!("{},", f)).collect();
            text.pop();
            text
        }
        UnpublishTrim::Separator => fragments.join(","),
    }
}

/// Collapse a doubled separator after a drive letter (`C:\\maps` to `C:\maps`)
fn normalize_template_path(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 4
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes[2] == b'\\'
        && bytes[3] == b'\\'
    {
        format!("{}{}", &path[..3], &path[4..])
    } else {
        path.to_string()
    }
}

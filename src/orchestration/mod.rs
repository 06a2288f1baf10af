//! Orchestration layer for map service publication
//!
//! Drives a document manager through the publish and unpublish workflows.

pub mod publication_workflow;

pub use publication_workflow::{
    CONNECTION_FILE_DISABLED_MESSAGE, NO_SERVER_MESSAGE, NO_TEMPLATE_MESSAGE, PublicationWorkflow,
};

//! Map service publication
//!
//! Turns a map document template into a published GIS map service and
//! removes it again. The [`orchestration::PublicationWorkflow`] drives a
//! [`DocumentManager`](crate::core::DocumentManager) through the individual steps; concrete managers
//! live in [`managers`].

pub mod core;
pub mod managers;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use crate::core::*;
pub use managers::{ScriptDocumentManager, ScriptManagerFactory};
pub use orchestration::PublicationWorkflow;
pub use security::{CommandError, Credentials, SafeCommandExecutor};
pub use validation::RequestValidator;

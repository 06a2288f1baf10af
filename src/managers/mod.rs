//! Concrete document managers

pub mod script_manager;

pub use script_manager::{ScriptDocumentManager, ScriptManagerFactory};

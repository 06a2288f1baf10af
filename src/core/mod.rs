pub mod config;
pub mod config_loader;
pub mod error;
pub mod sanitizer;
pub mod state_machine;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use error::*;
pub use sanitizer::sanitize;
pub use state_machine::*;
pub use traits::*;

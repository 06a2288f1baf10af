pub mod command_executor;
pub mod credential_editor;
pub mod credentials;

pub use command_executor::{CommandError, SafeCommandExecutor};
pub use credential_editor::{BasicAuthValue, CredentialEditor, EditorState, HostEditor};
pub use credentials::Credentials;

//! Host-driven credential editor
//!
//! A host editor owns a basic-auth property and drives this component through
//! `initialize` / `refresh` / `uninitialize`. Edits to the username or
//! password are re-encoded and pushed back to the host, which is then
//! notified that the element changed.
//!
//! # Example
//!
//! ```
//! use mapservice_publisher::security::credential_editor::{
//!     BasicAuthValue, CredentialEditor, EditorState, HostEditor,
//! };
//! use std::collections::HashMap;
//!
//! #[derive(Default)]
//! struct Host {
//!     values: HashMap<String, BasicAuthValue>,
//! }
//!
//! impl HostEditor for Host {
//!     fn is_enabled(&self, _property: &str) -> bool { true }
//!     fn get_value(&self, property: &str) -> Option<BasicAuthValue> {
//!         self.values.get(property).cloned()
//!     }
//!     fn set_value(&mut self, property: &str, value: BasicAuthValue) {
//!         self.values.insert(property.to_string(), value);
//!     }
//!     fn on_element_changed(&mut self) {}
//! }
//!
//! let mut editor = CredentialEditor::new();
//! editor.initialize(Host::default(), "authentication", "");
//! editor.set_username("osm");
//! assert_eq!(editor.state(), EditorState::Active);
//! ```

use crate::security::credentials::{self, Credentials};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Stored form of a basic-auth property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthValue {
    pub encoded: String,
}

impl BasicAuthValue {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            encoded: credentials.encode(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        credentials::decode(&self.encoded)
    }
}

/// Contract the host editor exposes to the credential editor
pub trait HostEditor {
    fn is_enabled(&self, property: &str) -> bool;

    fn get_value(&self, property: &str) -> Option<BasicAuthValue>;

    fn set_value(&mut self, property: &str, value: BasicAuthValue);

    fn on_element_changed(&mut self);
}

/// Editor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    Uninitialized,
    Active,
    /// The host reported the property disabled; edits are ignored
    Inert,
}

struct Session<H> {
    host: H,
    property: String,
    dependencies: String,
}

/// Credential editor bound to at most one host session at a time
pub struct CredentialEditor<H: HostEditor> {
    session: Option<Session<H>>,
    state: EditorState,
    visible: bool,
    username: String,
    password: SecretString,
}

impl<H: HostEditor> Default for CredentialEditor<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostEditor> CredentialEditor<H> {
    pub fn new() -> Self {
        Self {
            session: None,
            state: EditorState::Uninitialized,
            visible: false,
            username: String::new(),
            password: SecretString::from(""),
        }
    }

    /// Begin an editing session and refresh from the host immediately
    pub fn initialize(&mut self, host: H, property: &str, dependencies: &str) {
        self.session = Some(Session {
            host,
            property: property.to_string(),
            dependencies: dependencies.to_string(),
        });
        self.state = EditorState::Active;

        self.refresh();

        self.visible = true;
        tracing::debug!(
            property = ?self.property(),
            dependencies = ?self.dependencies(),
            "credential editor initialized"
        );
    }

    /// Pull the current value from the host
    pub fn refresh(&mut self) {
        let Some(session) = &self.session else {
            return;
        };

        if !session.host.is_enabled(&session.property) {
            self.state = EditorState::Inert;
            return;
        }
        self.state = EditorState::Active;

        let Some(value) = session.host.get_value(&session.property) else {
            return;
        };

        let decoded = value.credentials();
        self.username = decoded.username;
        self.password = decoded.password;
    }

    /// End the session, clearing all state and handing back the host
    pub fn uninitialize(&mut self) -> Option<H> {
        self.state = EditorState::Uninitialized;
        self.visible = false;
        self.username.clear();
        self.password = SecretString::from("");

        self.session.take().map(|session| session.host)
    }

    /// Username field edited
    pub fn set_username(&mut self, username: &str) {
        if self.state != EditorState::Active {
            return;
        }
        self.username = username.to_string();
        self.apply_changes();
    }

    /// Password field edited
    pub fn set_password(&mut self, password: &str) {
        if self.state != EditorState::Active {
            return;
        }
        self.password = SecretString::from(password);
        self.apply_changes();
    }

    fn apply_changes(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };

        let value = BasicAuthValue::from_credentials(&Credentials::new(
            self.username.as_str(),
            self.password.expose_secret(),
        ));
        session.host.set_value(&session.property, value);
        session.host.on_element_changed();

        tracing::debug!(
            property = %session.property,
            password = %credentials::mask_secret(self.password.expose_secret()),
            "credential value pushed to host"
        );
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn property(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.property.as_str())
    }

    pub fn dependencies(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.dependencies.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingHost {
        enabled: bool,
        values: HashMap<String, BasicAuthValue>,
        change_notifications: usize,
    }

    impl RecordingHost {
        fn enabled_with(property: &str, encoded: &str) -> Self {
            let mut values = HashMap::new();
            values.insert(
                property.to_string(),
                BasicAuthValue {
                    encoded: encoded.to_string(),
                },
            );
            Self {
                enabled: true,
                values,
                change_notifications: 0,
            }
        }
    }

    impl HostEditor for RecordingHost {
        fn is_enabled(&self, _property: &str) -> bool {
            self.enabled
        }

        fn get_value(&self, property: &str) -> Option<BasicAuthValue> {
            self.values.get(property).cloned()
        }

        fn set_value(&mut self, property: &str, value: BasicAuthValue) {
            self.values.insert(property.to_string(), value);
        }

        fn on_element_changed(&mut self) {
            self.change_notifications += 1;
        }
    }

    #[test]
    fn test_new_editor_is_uninitialized() {
        let editor: CredentialEditor<RecordingHost> = CredentialEditor::new();
        assert_eq!(editor.state(), EditorState::Uninitialized);
        assert!(!editor.is_visible());
        assert!(editor.property().is_none());
    }

    #[test]
    fn test_initialize_decodes_stored_value() {
        let host = RecordingHost::enabled_with("auth", &credentials::encode("osm", "secret"));
        let mut editor = CredentialEditor::new();

        editor.initialize(host, "auth", "in_url");

        assert_eq!(editor.state(), EditorState::Active);
        assert!(editor.is_visible());
        assert_eq!(editor.username(), "osm");
        assert_eq!(editor.password().expose_secret(), "secret");
        assert_eq!(editor.dependencies(), Some("in_url"));
    }

    #[test]
    fn test_initialize_with_malformed_value_yields_empty_fields() {
        let host = RecordingHost::enabled_with("auth", "***garbage***");
        let mut editor = CredentialEditor::new();

        editor.initialize(host, "auth", "");

        assert_eq!(editor.state(), EditorState::Active);
        assert_eq!(editor.username(), "");
        assert_eq!(editor.password().expose_secret(), "");
    }

    #[test]
    fn test_disabled_property_makes_editor_inert() {
        let host = RecordingHost {
            enabled: false,
            ..Default::default()
        };
        let mut editor = CredentialEditor::new();

        editor.initialize(host, "auth", "");
        editor.set_username("ignored");

        assert_eq!(editor.state(), EditorState::Inert);
        assert_eq!(editor.username(), "");
        let host = editor.uninitialize().unwrap();
        assert_eq!(host.change_notifications, 0);
        assert!(host.values.is_empty());
    }

    #[test]
    fn test_edits_are_pushed_to_host() {
        let host = RecordingHost {
            enabled: true,
            ..Default::default()
        };
        let mut editor = CredentialEditor::new();
        editor.initialize(host, "auth", "");

        editor.set_username("admin");
        editor.set_password("p@ss:word");

        let host = editor.uninitialize().unwrap();
        assert_eq!(host.change_notifications, 2);
        let stored = host.values.get("auth").unwrap().credentials();
        assert_eq!(stored, Credentials::new("admin", "p@ss:word"));
    }

    #[test]
    fn test_refresh_picks_up_host_changes() {
        let host = RecordingHost::enabled_with("auth", &credentials::encode("a", "b"));
        let mut editor = CredentialEditor::new();
        editor.initialize(host, "auth", "");

        if let Some(session) = &mut editor.session {
            session.host.set_value(
                "auth",
                BasicAuthValue {
                    encoded: credentials::encode("c", "d"),
                },
            );
        }
        editor.refresh();

        assert_eq!(editor.username(), "c");
        assert_eq!(editor.password().expose_secret(), "d");
    }

    #[test]
    fn test_password_is_redacted_in_debug_output() {
        let host = RecordingHost::enabled_with("auth", &credentials::encode("osm", "hunter2-secret"));
        let mut editor = CredentialEditor::new();
        editor.initialize(host, "auth", "");

        let debug = format!("{:?}", editor.password());

        assert!(!debug.contains("hunter2-secret"));
        assert_eq!(editor.password().expose_secret(), "hunter2-secret");
    }

    #[test]
    fn test_uninitialize_clears_state() {
        let host = RecordingHost::enabled_with("auth", &credentials::encode("osm", "secret"));
        let mut editor = CredentialEditor::new();
        editor.initialize(host, "auth", "");

        assert!(editor.uninitialize().is_some());

        assert_eq!(editor.state(), EditorState::Uninitialized);
        assert!(!editor.is_visible());
        assert_eq!(editor.username(), "");
        assert_eq!(editor.password().expose_secret(), "");
        assert!(editor.property().is_none());
        assert!(editor.uninitialize().is_none());
    }

    #[test]
    fn test_refresh_without_session_is_noop() {
        let mut editor: CredentialEditor<RecordingHost> = CredentialEditor::new();
        editor.refresh();
        assert_eq!(editor.state(), EditorState::Uninitialized);
    }
}

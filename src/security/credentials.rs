//! Basic-auth credential encoding
//!
//! Services published against secured datastores carry credentials as a
//! base64 `username:password` blob. Passwords are held in a `SecretString`
//! so they never show up in `Debug` output or logs.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Username/password pair
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password: String = password.into();
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Empty username and password
    pub fn empty() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.expose_secret().is_empty()
    }

    /// Base64 of `username:password`
    pub fn encode(&self) -> String {
        encode(&self.username, self.password.expose_secret())
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &mask_secret(self.password.expose_secret()))
            .finish()
    }
}

/// Encode credentials as base64 `username:password`
///
/// # Examples
///
/// ```
/// use mapservice_publisher::security::credentials::encode;
///
/// assert_eq!(encode("osm", "secret"), "b3NtOnNlY3JldA==");
/// ```
pub fn encode(username: &str, password: &str) -> String {
    BASE64.encode(format!("{}:{}", username, password))
}

/// Decode a base64 `username:password` blob
///
/// Never fails: anything that is not valid base64, not UTF-8 or has no
/// colon decodes to empty credentials. The blob is split at the first colon,
/// so passwords may contain colons.
///
/// # Examples
///
/// ```
/// use mapservice_publisher::security::credentials::decode;
///
/// let credentials = decode("b3NtOnNlY3JldA==");
/// assert_eq!(credentials.username, "osm");
///
/// assert!(decode("not base64!").is_empty());
/// ```
pub fn decode(encoded: &str) -> Credentials {
    let Ok(bytes) = BASE64.decode(encoded.trim()) else {
        return Credentials::empty();
    };

    let Ok(auth_info) = String::from_utf8(bytes) else {
        return Credentials::empty();
    };

    match auth_info.split_once(':') {
        Some((username, password)) => Credentials::new(username, password),
        None => Credentials::empty(),
    }
}

/// Mask a secret for safe logging
///
/// Shows only the first and last 3 characters; anything shorter than 10
/// characters is fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_known_value() {
        assert_eq!(encode("user", "pass"), "dXNlcjpwYXNz");
        assert_eq!(encode("", ""), "Og==");
    }

    #[test]
    fn test_decode_known_value() {
        let credentials = decode("dXNlcjpwYXNz");
        assert_eq!(credentials, Credentials::new("user", "pass"));
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert_eq!(decode("%%%not-base64%%%"), Credentials::empty());
    }

    #[test]
    fn test_decode_without_colon() {
        // "userpass"
        assert_eq!(decode("dXNlcnBhc3M="), Credentials::empty());
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let encoded = BASE64.encode([0xff, 0xfe, b':', 0xfd]);
        assert_eq!(decode(&encoded), Credentials::empty());
    }

    #[test]
    fn test_decode_password_with_colon() {
        let credentials = decode(&encode("admin", "a:b:c"));
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password.expose_secret(), "a:b:c");
    }

    #[test]
    fn test_debug_masks_password() {
        let credentials = Credentials::new("admin", "correct-horse-battery");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("admin"));
        assert!(debug.contains("cor...ery"));
        assert!(!debug.contains("correct-horse-battery"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("abcdef123456"), "abc...456");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(username in "[ -9;-~]*", password in "[ -9;-~]*") {
            let decoded = decode(&encode(&username, &password));
            prop_assert_eq!(decoded.username, username);
            prop_assert_eq!(decoded.password.expose_secret(), password.as_str());
        }
    }
}

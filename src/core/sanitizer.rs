//! Service name sanitization
//!
//! Map service names end up in file names and server URLs, so a fixed set of
//! punctuation is removed. Spaces become underscores; every other denied
//! character is deleted outright.

use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;

/// Characters stripped from service names, paired with their replacement
const DENYLIST: &[(&str, &str)] = &[
    (" ", "_"),
    (".", ""),
    (",", ""),
    ("&", ""),
    ("'", ""),
    ("\\", ""),
    (";", ""),
    (":", ""),
    ("\"", ""),
    ("|", ""),
    ("=", ""),
    (">", ""),
    ("<", ""),
    ("?", ""),
    ("!", ""),
    ("@", ""),
    ("#", ""),
    ("$", ""),
    ("%", ""),
    ("^", ""),
    ("*", ""),
    ("(", ""),
    (")", ""),
];

lazy_static! {
    static ref DENYLIST_MATCHER: AhoCorasick =
        AhoCorasick::new(DENYLIST.iter().map(|(pattern, _)| *pattern))
            .expect("denylist patterns are valid literals");
    static ref REPLACEMENTS: Vec<&'static str> =
        DENYLIST.iter().map(|(_, replacement)| *replacement).collect();
}

/// Normalize a human-supplied service name
///
/// # Examples
///
/// ```
/// use mapservice_publisher::core::sanitizer::sanitize;
///
/// assert_eq!(sanitize("My Service, Inc."), "My_Service_Inc");
/// assert_eq!(sanitize("roads (2024)"), "roads_2024");
/// ```
pub fn sanitize(name: &str) -> String {
    DENYLIST_MATCHER.replace_all(name, REPLACEMENTS.as_slice())
}

/// Returns true if `name` contains no denylisted character
pub fn is_sanitized(name: &str) -> bool {
    !DENYLIST_MATCHER.is_match(name)
}

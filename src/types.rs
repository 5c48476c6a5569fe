//! Basic type definitions for the chat service
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based unique connection identifier
//! - `DisplayName`: validated, registry-unique user name

use std::borrow::Borrow;

use uuid::Uuid;

use crate::error::NameError;
use crate::protocol::{DIRECTED_DELIMITER, SERVER_SENDER};

/// Maximum display name length in characters
pub const MAX_NAME_LENGTH: usize = 32;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4 so log lines and sinks can be traced back
/// to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name claimed by a session during negotiation
///
/// Always trimmed and non-empty. Names may not contain `:` (it separates
/// the sender from the body on the wire) or the directed delimiter, and
/// may not impersonate the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate a raw candidate line and turn it into a name
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let name = raw.trim();

        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if name.contains(':') {
            return Err(NameError::ForbiddenCharacter(":"));
        }
        if name.contains(DIRECTED_DELIMITER) {
            return Err(NameError::ForbiddenCharacter(DIRECTED_DELIMITER));
        }
        if name.eq_ignore_ascii_case(SERVER_SENDER) {
            return Err(NameError::Reserved(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DisplayName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_name_is_trimmed() {
        let name = DisplayName::parse("  alice \r").unwrap();
        assert_eq!(name.as_str(), "alice");
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_name_empty() {
        assert_eq!(DisplayName::parse(""), Err(NameError::Empty));
        assert_eq!(DisplayName::parse("   "), Err(NameError::Empty));
    }

    #[test]
    fn test_name_too_long() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert_eq!(
            DisplayName::parse(&long),
            Err(NameError::TooLong {
                max: MAX_NAME_LENGTH
            })
        );
        assert!(DisplayName::parse(&"x".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_name_forbidden_sequences() {
        assert_eq!(
            DisplayName::parse("al:ice"),
            Err(NameError::ForbiddenCharacter(":"))
        );
        assert_eq!(
            DisplayName::parse("bob <- x"),
            Err(NameError::ForbiddenCharacter("<-"))
        );
    }

    #[test]
    fn test_name_reserved() {
        assert!(matches!(
            DisplayName::parse("server"),
            Err(NameError::Reserved(_))
        ));
        assert!(matches!(
            DisplayName::parse("Server"),
            Err(NameError::Reserved(_))
        ));
    }

    #[test]
    fn test_name_unicode_length_counts_chars() {
        let name = "é".repeat(MAX_NAME_LENGTH);
        assert!(DisplayName::parse(&name).is_ok());
    }
}

//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in weaver follow the pattern: `prefix_ulid`
//! For example: `trn_01hqxyz...` for conversation turns.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    /// One streamed generation episode.
    Turn,
    /// A sandbox file watcher.
    Watcher,
    /// A sandbox connection.
    Session,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Turn => "trn",
            IdPrefix::Watcher => "wch",
            IdPrefix::Session => "ses",
        }
    }

    /// Parse a prefix from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trn" => Some(IdPrefix::Turn),
            "wch" => Some(IdPrefix::Watcher),
            "ses" => Some(IdPrefix::Session),
            _ => None,
        }
    }
}

/// Identifier generation and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::with_ulid(prefix, Ulid::new())
    }

    /// Generate an identifier with a specific ULID (for testing or imports).
    pub fn with_ulid(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Parse an identifier into its prefix and ULID parts.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let (prefix, ulid) = id.split_once('_')?;
        let prefix = IdPrefix::parse(prefix)?;
        let ulid = Ulid::from_string(ulid).ok()?;
        Some((prefix, ulid))
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.starts_with(prefix.as_str()) && id.chars().nth(prefix.as_str().len()) == Some('_')
    }

    /// Generate a turn ID.
    pub fn turn() -> String {
        Self::ascending(IdPrefix::Turn)
    }

    /// Generate a watcher ID.
    pub fn watcher() -> String {
        Self::ascending(IdPrefix::Watcher)
    }

    /// Generate a session ID.
    pub fn session() -> String {
        Self::ascending(IdPrefix::Session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_id() {
        let id = Identifier::ascending(IdPrefix::Turn);
        assert!(id.starts_with("trn_"));
        assert_eq!(id.len(), 30); // "trn_" (4) + ULID (26)
    }

    #[test]
    fn test_ascending_order() {
        let id1 = Identifier::turn();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = Identifier::turn();
        assert!(id1 < id2, "Ascending IDs should increase over time");
    }

    #[test]
    fn test_parse_id() {
        let id = Identifier::watcher();
        let (prefix, _ulid) = Identifier::parse(&id).unwrap();
        assert_eq!(prefix, IdPrefix::Watcher);
    }

    #[test]
    fn test_has_prefix() {
        let id = Identifier::session();
        assert!(Identifier::has_prefix(&id, IdPrefix::Session));
        assert!(!Identifier::has_prefix(&id, IdPrefix::Turn));
        assert!(!Identifier::has_prefix("ses123", IdPrefix::Session));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Identifier::parse("nounderscore").is_none());
        assert!(Identifier::parse("xyz_01HQXYZ").is_none());
        assert!(Identifier::parse("trn_notaulid").is_none());
    }

    #[test]
    fn test_with_ulid_round_trip() {
        let ulid = Ulid::new();
        let id = Identifier::with_ulid(IdPrefix::Turn, ulid);
        let (_, parsed) = Identifier::parse(&id).unwrap();
        assert_eq!(parsed, ulid);
    }
}

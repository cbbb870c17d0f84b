//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based identifier of one registration
//! - `Handle`: validated, unique display name of a connected user

use std::borrow::Borrow;

use uuid::Uuid;

use crate::error::HandleError;

/// Reserved sender name for server-originated messages
pub const SYSTEM: &str = "system";

/// Reserved recipient name for broadcasts
pub const ALL: &str = "all";

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. A handle can be reused after its session leaves, so the
/// registry pairs every entry with the `SessionId` that created it.
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

/// A registrable user handle
///
/// Non-empty and never one of the reserved names `system` / `all`.
/// Comparison is exact and case-sensitive; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(String);

impl Handle {
    /// Validate a candidate handle
    pub fn parse(name: impl Into<String>) -> Result<Self, HandleError> {
        let name = name.into();
        if name.is_empty() {
            return Err(HandleError::Empty);
        }
        if name == SYSTEM || name == ALL {
            return Err(HandleError::Reserved(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Handle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

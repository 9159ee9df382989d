/// Session identity for one workflow attempt
///
/// A session id is minted once per attempt and then reused for every save,
/// resume link and log line belonging to that attempt.

use serde::{Deserialize, Serialize};
use std::{fmt, sync::OnceLock};
use uuid::Uuid;

/// Opaque, stable identifier of a workflow attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random id (UUID v4, backed by the OS CSPRNG)
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lazily minted session id, idempotent for the lifetime of the attempt
///
/// If the route context already carries an id (resume links), that id is used
/// as-is; otherwise the first `ensure()` mints one and every later call returns it.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    id: OnceLock<SessionId>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the identity from an id extracted from a URL or route parameter
    ///
    /// Blank ids are ignored, so a malformed link still yields a minted id.
    pub fn from_route(existing: Option<&str>) -> Self {
        let identity = Self::new();
        if let Some(id) = existing.map(str::trim).filter(|id| !id.is_empty()) {
            let _ = identity.id.set(SessionId::from(id));
        }
        identity
    }

    pub fn ensure(&self) -> SessionId {
        self.id.get_or_init(SessionId::mint).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent_within_an_attempt() {
        let identity = SessionIdentity::new();
        let first = identity.ensure();
        assert_eq!(first, identity.ensure());
        assert!(!first.as_str().is_empty());
    }

    #[test]
    fn separate_attempts_get_distinct_ids() {
        assert_ne!(SessionIdentity::new().ensure(), SessionIdentity::new().ensure());
    }

    #[test]
    fn route_id_is_reused_verbatim() {
        let identity = SessionIdentity::from_route(Some("draft-42"));
        assert_eq!(identity.ensure().as_str(), "draft-42");
        assert_eq!(identity.ensure().as_str(), "draft-42");
    }

    #[test]
    fn blank_route_id_falls_back_to_minting() {
        let identity = SessionIdentity::from_route(Some("   "));
        let id = identity.ensure();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }
}

use anyhow::Result;
use async_trait::async_trait;

/// Fixed keys under which the session's three scalar values live in any
/// key-value backed store.
pub const SESSION_KEY_USERNAME: &str = "username";
pub const SESSION_KEY_PASSWORD: &str = "password";
pub const SESSION_KEY_VERIFIED: &str = "is_verified";

/// The persisted identity surviving restarts: normalized username, password,
/// verification flag. Written only on successful verification, cleared only
/// by an explicit reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub username: String,
    pub password: String,
    pub verified: bool,
}

/// Durable client-side record of the last verified identity.
///
/// The credential gate receives this as an injected dependency so tests can
/// substitute an in-memory implementation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredSession>>;
    async fn save(&self, session: &StoredSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

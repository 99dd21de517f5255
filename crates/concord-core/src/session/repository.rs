//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use anyhow::Result;
use async_trait::async_trait;

use super::model::Session;

/// An abstract repository for managing session persistence.
///
/// This trait defines the contract for persisting and retrieving sessions,
/// decoupling the protocol core from the specific storage mechanism (TOML
/// files, database, remote API).
///
/// Saves are whole-session and must be atomic with respect to concurrent
/// loads for the same id; the orchestrator additionally serializes all
/// mutations of one session behind a per-session lock.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Finds the session owning a participant join token.
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Saves a session to storage, replacing any previous record.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Lists all stored sessions.
    async fn list_all(&self) -> Result<Vec<Session>>;
}

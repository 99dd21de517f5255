//! TOML-based SessionRepository implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use concord_core::session::{Session, SessionRepository};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A repository implementation for storing session data in TOML files.
///
/// Stores sessions as individual TOML files in a sessions directory. A save
/// writes the serialized session to a temporary sibling file and renames it
/// over the target, so a concurrent load never observes a half-written
/// session.
pub struct TomlSessionRepository {
    base_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a new `TomlSessionRepository` with the specified base directory.
    ///
    /// The directory structure will be created if it doesn't exist:
    /// ```text
    /// base_dir/
    /// └── sessions/
    ///     ├── session-id-1.toml
    ///     └── session-id-2.toml
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        let sessions_dir = base_dir.join("sessions");
        fs::create_dir_all(&sessions_dir)
            .await
            .context("Failed to create sessions directory")?;

        Ok(Self { base_dir })
    }

    /// Creates a `TomlSessionRepository` instance at the default location
    /// (`~/.concord`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or if
    /// the directory structure cannot be created.
    pub async fn default_location() -> Result<Self> {
        let base_dir = crate::paths::ConcordPaths::data_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get data directory: {}", e))?;
        Self::new(base_dir).await
    }

    /// Returns the file path for a given session ID.
    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.toml", session_id))
    }

    async fn load_session_from_path(&self, path: &Path) -> Result<Session> {
        let toml_content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read session file: {:?}", path))?;

        toml::from_str(&toml_content)
            .context(format!("Failed to parse session file: {:?}", path))
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let file_path = self.session_file_path(session_id);

        if !fs::try_exists(&file_path).await? {
            return Ok(None);
        }

        match self.load_session_from_path(&file_path).await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                if let Some(io_error) = e.downcast_ref::<std::io::Error>() {
                    if io_error.kind() == std::io::ErrorKind::NotFound {
                        return Ok(None);
                    }
                }
                Err(e)
            }
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
        let sessions = self.list_all().await?;
        Ok(sessions
            .into_iter()
            .find(|s| s.participant_by_token(token).is_some()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let file_path = self.session_file_path(&session.id);

        let toml_content = toml::to_string_pretty(session)
            .context("Failed to serialize session data to TOML")?;

        // Write-then-rename keeps concurrent loads from seeing partial data.
        let tmp_path = file_path.with_extension("toml.tmp");
        fs::write(&tmp_path, toml_content)
            .await
            .context(format!("Failed to write session file: {:?}", tmp_path))?;
        fs::rename(&tmp_path, &file_path)
            .await
            .context(format!("Failed to finalize session file: {:?}", file_path))?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut sessions = Vec::new();

        let mut entries = fs::read_dir(&sessions_dir)
            .await
            .context("Failed to read sessions directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match self.load_session_from_path(&path).await {
                    Ok(session) => sessions.push(session),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable session file {:?}: {}", path, e);
                    }
                }
            }
        }

        // Sort by updated_at descending (most recent first)
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::session::{
        Language, Party, Session, SessionConfig, StatementAnswers, VisibilityMode, Workflow,
    };
    use tempfile::TempDir;

    fn create_test_session(title: &str) -> Session {
        let mut session = Session::create(SessionConfig {
            visibility: VisibilityMode::Blind,
            workflow: Workflow::Advanced,
            language: Language::En,
            title: Some(title.to_string()),
            initial_description: Some("a disagreement about a shared fence".to_string()),
        });
        session.initial_statement = Some(StatementAnswers {
            what_happened: "the fence was moved".to_string(),
            what_led_to_it: "a survey disagreement".to_string(),
            how_it_made_them_feel: "ignored".to_string(),
            desired_outcome: "move it back".to_string(),
        });
        session
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).await.unwrap();

        let session = create_test_session("fence");
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id(&session.id).await.unwrap();

        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_find_by_token_resolves_either_participant() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).await.unwrap();

        let session = create_test_session("tokens");
        repository.save(&session).await.unwrap();

        for party in [Party::P1, Party::P2] {
            let token = session.participant(party).token.clone();
            let found = repository.find_by_token(&token).await.unwrap();
            assert_eq!(found.map(|s| s.id), Some(session.id.clone()));
        }

        assert!(repository.find_by_token("no-such-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).await.unwrap();

        repository.save(&create_test_session("one")).await.unwrap();
        repository.save(&create_test_session("two")).await.unwrap();
        repository.save(&create_test_session("three")).await.unwrap();

        let sessions = repository.list_all().await.unwrap();
        assert_eq!(sessions.len(), 3);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).await.unwrap();

        let mut session = create_test_session("overwrite");
        repository.save(&session).await.unwrap();

        session.context_p1 = Some("additional context".to_string());
        session.touch();
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.context_p1.as_deref(), Some("additional context"));
        assert_eq!(repository.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).await.unwrap();

        let result = repository.find_by_id("nonexistent-session").await.unwrap();
        assert!(result.is_none());
    }
}

//! Directory-backed AttachmentRepository implementation.
//!
//! Each attachment is stored as a metadata TOML file plus the raw bytes,
//! both under a per-session directory:
//!
//! ```text
//! base_dir/attachments/<session-id>/
//! ├── <attachment-id>.toml     # Metadata
//! └── <attachment-id>.bin      # Raw bytes (original extension preserved)
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use concord_core::attachment::{Attachment, AttachmentContent, AttachmentRepository, FileKind};
use concord_core::generation::ImageContent;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-system attachment registry.
pub struct DirAttachmentRepository {
    base_dir: PathBuf,
}

impl DirAttachmentRepository {
    /// Creates a new registry rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachments directory cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("attachments"))
            .await
            .context("Failed to create attachments directory")?;
        Ok(Self { base_dir })
    }

    /// Creates a registry at the default location (`~/.concord`).
    pub async fn default_location() -> Result<Self> {
        let base_dir = crate::paths::ConcordPaths::data_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get data directory: {}", e))?;
        Self::new(base_dir).await
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join("attachments").join(session_id)
    }

    fn metadata_path(&self, session_id: &str, attachment_id: &str) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{}.toml", attachment_id))
    }

    fn bytes_path(&self, attachment: &Attachment) -> PathBuf {
        self.session_dir(&attachment.session_id)
            .join(&attachment.file_name)
    }

    /// Media type for image payloads, guessed from the original file name
    /// when the upload did not declare one.
    fn image_media_type(attachment: &Attachment) -> String {
        if !attachment.media_type.is_empty()
            && attachment.media_type != "application/octet-stream"
        {
            return attachment.media_type.clone();
        }
        mime_guess::from_path(&attachment.original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

#[async_trait]
impl AttachmentRepository for DirAttachmentRepository {
    async fn store(&self, attachment: &Attachment, bytes: &[u8]) -> Result<()> {
        let dir = self.session_dir(&attachment.session_id);
        fs::create_dir_all(&dir)
            .await
            .context("Failed to create session attachment directory")?;

        fs::write(self.bytes_path(attachment), bytes)
            .await
            .context("Failed to write attachment bytes")?;

        let metadata = toml::to_string_pretty(attachment)
            .context("Failed to serialize attachment metadata")?;
        fs::write(
            self.metadata_path(&attachment.session_id, &attachment.id),
            metadata,
        )
        .await
        .context("Failed to write attachment metadata")?;

        Ok(())
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Attachment>> {
        let dir = self.session_dir(session_id);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut attachments = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .context("Failed to read session attachment directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }
            let content = fs::read_to_string(&path)
                .await
                .context(format!("Failed to read attachment metadata: {:?}", path))?;
            match toml::from_str::<Attachment>(&content) {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => {
                    tracing::warn!("Skipping unreadable attachment metadata {:?}: {}", path, e);
                }
            }
        }

        attachments.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(attachments)
    }

    async fn find_by_id(
        &self,
        session_id: &str,
        attachment_id: &str,
    ) -> Result<Option<Attachment>> {
        let path = self.metadata_path(session_id, attachment_id);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .context("Failed to read attachment metadata")?;
        let attachment =
            toml::from_str(&content).context("Failed to parse attachment metadata")?;
        Ok(Some(attachment))
    }

    async fn load_content(&self, attachment: &Attachment) -> Result<Option<AttachmentContent>> {
        if !attachment.kind.is_readable() {
            return Ok(None);
        }

        let path = self.bytes_path(attachment);
        if !fs::try_exists(&path).await? {
            tracing::warn!("Attachment bytes missing: {:?}", path);
            return Ok(None);
        }

        match attachment.kind {
            FileKind::Text | FileKind::Csv => {
                let body = fs::read_to_string(&path)
                    .await
                    .context("Failed to read attachment text")?;
                Ok(Some(AttachmentContent::Text {
                    name: attachment.original_name.clone(),
                    party: attachment.party,
                    kind: attachment.kind,
                    body,
                }))
            }
            FileKind::Image => {
                let bytes = fs::read(&path)
                    .await
                    .context("Failed to read attachment bytes")?;
                Ok(Some(AttachmentContent::Image(ImageContent {
                    name: attachment.original_name.clone(),
                    party: attachment.party,
                    media_type: Self::image_media_type(attachment),
                    data: BASE64_STANDARD.encode(bytes),
                })))
            }
            FileKind::Pdf | FileKind::Document => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str, attachment_id: &str) -> Result<()> {
        let Some(attachment) = self.find_by_id(session_id, attachment_id).await? else {
            return Ok(());
        };

        let bytes_path = self.bytes_path(&attachment);
        if fs::try_exists(&bytes_path).await? {
            fs::remove_file(&bytes_path)
                .await
                .context("Failed to delete attachment bytes")?;
        }
        fs::remove_file(self.metadata_path(session_id, attachment_id))
            .await
            .context("Failed to delete attachment metadata")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::attachment::AttachmentStage;
    use concord_core::session::Party;
    use tempfile::TempDir;

    fn attachment(id: &str, kind: FileKind, media_type: &str, uploaded_at: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            session_id: "session-1".to_string(),
            party: Party::P1,
            stage: AttachmentStage::InitialStatement,
            file_name: format!("{}.bin", id),
            original_name: format!("{}.png", id),
            kind,
            media_type: media_type.to_string(),
            size: 3,
            uploaded_at: uploaded_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_list_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let repository = DirAttachmentRepository::new(temp_dir.path()).await.unwrap();

        let a = attachment("a", FileKind::Text, "text/plain", "2024-01-01T00:00:02Z");
        let b = attachment("b", FileKind::Text, "text/plain", "2024-01-01T00:00:01Z");
        repository.store(&a, b"aaa").await.unwrap();
        repository.store(&b, b"bbb").await.unwrap();

        // Ordered by upload time, not insertion order.
        let listed = repository.list("session-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "b");
        assert_eq!(listed[1].id, "a");

        repository.delete("session-1", "a").await.unwrap();
        let listed = repository.list("session-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(repository.find_by_id("session-1", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_text_content_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let repository = DirAttachmentRepository::new(temp_dir.path()).await.unwrap();

        let a = attachment("notes", FileKind::Text, "text/plain", "2024-01-01T00:00:00Z");
        repository.store(&a, b"the fence is on lot 12").await.unwrap();

        let content = repository.load_content(&a).await.unwrap().unwrap();
        match content {
            AttachmentContent::Text { body, .. } => {
                assert_eq!(body, "the fence is on lot 12");
            }
            AttachmentContent::Image(_) => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn test_image_content_is_base64_with_media_type() {
        let temp_dir = TempDir::new().unwrap();
        let repository = DirAttachmentRepository::new(temp_dir.path()).await.unwrap();

        let a = attachment("photo", FileKind::Image, "image/png", "2024-01-01T00:00:00Z");
        repository.store(&a, &[1u8, 2, 3]).await.unwrap();

        let content = repository.load_content(&a).await.unwrap().unwrap();
        match content {
            AttachmentContent::Image(image) => {
                assert_eq!(image.media_type, "image/png");
                assert_eq!(image.data, BASE64_STANDARD.encode([1u8, 2, 3]));
            }
            AttachmentContent::Text { .. } => panic!("expected image content"),
        }
    }

    #[tokio::test]
    async fn test_media_type_guessed_from_name_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let repository = DirAttachmentRepository::new(temp_dir.path()).await.unwrap();

        let a = attachment("photo", FileKind::Image, "", "2024-01-01T00:00:00Z");
        repository.store(&a, &[1u8]).await.unwrap();

        let content = repository.load_content(&a).await.unwrap().unwrap();
        match content {
            AttachmentContent::Image(image) => assert_eq!(image.media_type, "image/png"),
            AttachmentContent::Text { .. } => panic!("expected image content"),
        }
    }

    #[tokio::test]
    async fn test_unreadable_kinds_yield_no_content() {
        let temp_dir = TempDir::new().unwrap();
        let repository = DirAttachmentRepository::new(temp_dir.path()).await.unwrap();

        let a = attachment("contract", FileKind::Pdf, "application/pdf", "2024-01-01T00:00:00Z");
        repository.store(&a, b"%PDF-1.4").await.unwrap();

        assert!(repository.load_content(&a).await.unwrap().is_none());
    }
}

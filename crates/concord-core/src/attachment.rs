//! Evidence attachments: metadata model and registry contract.
//!
//! Attachments are immutable once stored and explicitly deletable. Byte
//! storage lives behind the `AttachmentRepository` trait; the protocol core
//! only consumes ordered metadata plus loaded content for generation calls.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generation::ImageContent;
use crate::session::{Party, SessionStatus};

/// The narrative stage an attachment is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStage {
    InitialStatement,
    Response,
    ContextP1,
    ContextP2,
}

impl AttachmentStage {
    /// The status during which this stage's submission (and its uploads)
    /// happens. Uploads arriving after the session has moved on are refused.
    pub fn submission_status(&self) -> SessionStatus {
        match self {
            AttachmentStage::InitialStatement => SessionStatus::WaitingP2Join,
            AttachmentStage::Response => SessionStatus::P2Answering,
            AttachmentStage::ContextP1 => SessionStatus::WaitingP1Context,
            AttachmentStage::ContextP2 => SessionStatus::WaitingP2Context,
        }
    }
}

/// Coarse file category derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Text,
    Csv,
    Pdf,
    Document,
}

impl FileKind {
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.starts_with("image/") {
            FileKind::Image
        } else if media_type == "text/plain" {
            FileKind::Text
        } else if media_type == "text/csv" {
            FileKind::Csv
        } else if media_type == "application/pdf" {
            FileKind::Pdf
        } else {
            FileKind::Document
        }
    }

    /// Content the generation calls can consume directly.
    pub fn is_readable(&self) -> bool {
        matches!(self, FileKind::Text | FileKind::Csv | FileKind::Image)
    }
}

/// Metadata of one stored piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub session_id: String,
    pub party: Party,
    pub stage: AttachmentStage,
    /// Name under which the bytes are stored.
    pub file_name: String,
    /// Name the participant uploaded the file as.
    pub original_name: String,
    pub kind: FileKind,
    pub media_type: String,
    pub size: u64,
    pub uploaded_at: String,
}

/// Loaded attachment content, ready for inclusion in a generation call.
///
/// Text documents are carried as plain text; images as base64 with a media
/// type, passed through to vision-capable engines unmodified.
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    Text {
        name: String,
        party: Party,
        kind: FileKind,
        body: String,
    },
    Image(ImageContent),
}

/// Registry of attachment metadata and bytes, keyed by session.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Stores metadata and bytes for a new attachment.
    async fn store(&self, attachment: &Attachment, bytes: &[u8]) -> Result<()>;

    /// Lists a session's attachments ordered by upload time.
    async fn list(&self, session_id: &str) -> Result<Vec<Attachment>>;

    /// Finds one attachment by id.
    async fn find_by_id(&self, session_id: &str, attachment_id: &str)
        -> Result<Option<Attachment>>;

    /// Loads an attachment as generation-ready content. Returns `None` for
    /// kinds the generation calls cannot consume (pdf, generic documents).
    async fn load_content(&self, attachment: &Attachment) -> Result<Option<AttachmentContent>>;

    /// Deletes metadata and bytes.
    async fn delete(&self, session_id: &str, attachment_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_from_media_type() {
        assert_eq!(FileKind::from_media_type("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_media_type("image/jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_media_type("text/plain"), FileKind::Text);
        assert_eq!(FileKind::from_media_type("text/csv"), FileKind::Csv);
        assert_eq!(FileKind::from_media_type("application/pdf"), FileKind::Pdf);
        assert_eq!(
            FileKind::from_media_type("application/msword"),
            FileKind::Document
        );
    }

    #[test]
    fn stages_map_to_their_submission_status() {
        assert_eq!(
            AttachmentStage::InitialStatement.submission_status(),
            SessionStatus::WaitingP2Join
        );
        assert_eq!(
            AttachmentStage::ContextP2.submission_status(),
            SessionStatus::WaitingP2Context
        );
    }
}

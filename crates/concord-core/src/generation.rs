//! Text generation client contract.
//!
//! The protocol core treats the generation engine as a stateless
//! request/response collaborator: role-tagged messages in, opaque text out.
//! Concrete HTTP backends live in `concord-interaction`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Party;

/// Role of a single message in a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// An image passed to a vision-capable engine as base64 data plus media type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub name: String,
    pub party: Party,
    pub media_type: String,
    pub data: String,
}

/// A complete generation request.
///
/// Temperature and token budget carry the defaults used by ordinary
/// derivations; the judgment pipeline overrides both.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub images: Vec<ImageContent>,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            images: Vec::new(),
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_images(mut self, images: Vec<ImageContent>) -> Self {
        self.images = images;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Errors raised by a generation backend.
///
/// Unparseable output is treated identically to a failed call: every call
/// site that expects JSON maps a parse miss to `Unparseable` and applies the
/// same fallback policy.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never produced a response (connect/timeout/transport).
    #[error("generation request failed: {0}")]
    Transport(String),

    /// The backend answered with an error status.
    #[error("generation backend error ({status_code:?}): {message}")]
    Backend {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The backend answered but carried no usable text.
    #[error("generation returned no usable text")]
    EmptyResponse,

    /// The returned text did not match the documented JSON shape.
    #[error("generation output could not be parsed: {0}")]
    Unparseable(String),
}

/// Stateless facade over a text generation engine.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

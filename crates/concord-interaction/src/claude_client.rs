//! ClaudeClient - Direct REST API implementation for Claude.
//!
//! This client calls the Claude REST API directly. Configuration comes from
//! environment variables (ANTHROPIC_API_KEY, CLAUDE_MODEL_NAME).

use async_trait::async_trait;
use concord_core::generation::{
    ChatRole, GenerationClient, GenerationError, GenerationRequest, ImageContent,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

use crate::http::{backend_error, parse_retry_after, transport_error};

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generation client that talks to the Claude HTTP API.
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    /// Creates a new client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Model name defaults to `claude-sonnet-4-20250514` if not specified.
    pub fn try_from_env() -> Result<Self, GenerationError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            GenerationError::Transport(
                "ANTHROPIC_API_KEY not found in environment variables".into(),
            )
        })?;

        let model = env::var("CLAUDE_MODEL_NAME").unwrap_or_else(|_| DEFAULT_CLAUDE_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_body(&self, request: &GenerationRequest) -> CreateMessageRequest {
        // Claude carries the system prompt separately from the turn list.
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages: Vec<Message> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| Message {
                role: match m.role {
                    ChatRole::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: vec![ContentBlock::Text {
                    text: m.content.clone(),
                }],
            })
            .collect();

        // Images ride on the last user turn.
        if !request.images.is_empty() {
            if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == "user") {
                for image in &request.images {
                    last_user.content.push(image_block(image));
                }
            }
        }

        CreateMessageRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: if system.is_empty() {
                None
            } else {
                Some(system)
            },
        }
    }

    async fn send_request(&self, body: &CreateMessageRequest) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(BASE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Claude error body".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body_text);
            return Err(backend_error(status, message, retry_after));
        }

        let parsed: CreateMessageResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Unparseable(format!("Claude response: {err}")))?;

        parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlockResponse::Text { text } => Some(text),
            })
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[async_trait]
impl GenerationClient for ClaudeClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(&request);
        self.send_request(&body).await
    }
}

fn image_block(image: &ImageContent) -> ContentBlock {
    ContentBlock::Image {
        source: ImageSource {
            r#type: "base64".to_string(),
            media_type: image.media_type.clone(),
            data: image.data.clone(),
        },
    }
}

#[derive(Serialize)]
struct CreateMessageRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize)]
struct ImageSource {
    r#type: String,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlockResponse>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockResponse {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::generation::ChatMessage;
    use concord_core::session::Party;

    #[test]
    fn system_messages_are_lifted_out_of_the_turn_list() {
        let client = ClaudeClient::new("key", "model");
        let request = GenerationRequest::new(vec![
            ChatMessage::system("be neutral"),
            ChatMessage::user("summarize this"),
        ]);

        let body = client.build_body(&request);
        assert_eq!(body.system.as_deref(), Some("be neutral"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
    }

    #[test]
    fn images_attach_to_the_last_user_turn() {
        let client = ClaudeClient::new("key", "model");
        let request = GenerationRequest::new(vec![ChatMessage::user("look at this")])
            .with_images(vec![ImageContent {
                name: "receipt.png".to_string(),
                party: Party::P2,
                media_type: "image/png".to_string(),
                data: "aGk=".to_string(),
            }]);

        let body = client.build_body(&request);
        assert_eq!(body.messages[0].content.len(), 2);
    }
}

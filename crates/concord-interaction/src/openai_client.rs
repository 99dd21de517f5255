//! OpenAiClient - OpenAI-compatible chat completions client.
//!
//! Covers the OpenAI API itself and any compatible server (LM Studio and
//! similar local gateways) via a base URL override.

use async_trait::async_trait;
use concord_core::generation::{
    ChatRole, GenerationClient, GenerationError, GenerationRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;

use crate::http::{backend_error, parse_retry_after, transport_error};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Generation client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Loads configuration from environment variables
    /// (OPENAI_API_KEY, OPENAI_MODEL_NAME).
    pub fn try_from_env() -> Result<Self, GenerationError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            GenerationError::Transport("OPENAI_API_KEY not found in environment variables".into())
        })?;
        let model = env::var("OPENAI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Points the client at a local OpenAI-compatible server. Such servers
    /// usually ignore the API key.
    pub fn local_server(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("not-needed", model).with_base_url(base_url)
    }

    /// Overrides the base URL after construction.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_messages(&self, request: &GenerationRequest) -> Vec<serde_json::Value> {
        let mut last_user = None;
        for (i, m) in request.messages.iter().enumerate() {
            if m.role == ChatRole::User {
                last_user = Some(i);
            }
        }

        request
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let role = match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                // Vision payloads turn the last user message into a content
                // array of text plus data-URL image parts.
                if Some(i) == last_user && !request.images.is_empty() {
                    let mut content = vec![json!({"type": "text", "text": m.content})];
                    for image in &request.images {
                        content.push(json!({
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:{};base64,{}", image.media_type, image.data),
                                "detail": "auto"
                            }
                        }));
                    }
                    json!({"role": role, "content": content})
                } else {
                    json!({"role": role, "content": m.content})
                }
            })
            .collect()
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: self.build_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body_text);
            return Err(backend_error(status, message, retry_after));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Unparseable(format!("chat completion: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
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
    use concord_core::generation::{ChatMessage, ImageContent};
    use concord_core::session::Party;

    #[test]
    fn images_become_data_url_parts_on_the_last_user_message() {
        let client = OpenAiClient::local_server("http://localhost:1234/v1", "local");
        let request = GenerationRequest::new(vec![
            ChatMessage::system("be neutral"),
            ChatMessage::user("what does the receipt say"),
        ])
        .with_images(vec![ImageContent {
            name: "receipt.png".to_string(),
            party: Party::P1,
            media_type: "image/png".to_string(),
            data: "aGk=".to_string(),
        }]);

        let messages = client.build_messages(&request);
        assert_eq!(messages[0]["content"], "be neutral");
        let content = messages[1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/png;base64,aGk="
        );
    }
}

//! GeminiClient - Direct REST API implementation for Gemini.

use async_trait::async_trait;
use concord_core::generation::{
    ChatRole, GenerationClient, GenerationError, GenerationRequest,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;

use crate::http::{backend_error, parse_retry_after, transport_error};

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Generation client that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Creates a new client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Loads configuration from environment variables
    /// (GEMINI_API_KEY, GEMINI_MODEL_NAME).
    ///
    /// Model name defaults to `gemini-2.5-flash` if not specified.
    pub fn try_from_env() -> Result<Self, GenerationError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            GenerationError::Transport("GEMINI_API_KEY not found in environment variables".into())
        })?;
        let model = env::var("GEMINI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_contents(&self, request: &GenerationRequest) -> Vec<serde_json::Value> {
        let mut contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = if m.role == ChatRole::Assistant {
                    "model"
                } else {
                    "user"
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        // Gemini has no system role; fold instructions into a leading user turn.
        if let Some(system) = request
            .messages
            .iter()
            .find(|m| m.role == ChatRole::System)
        {
            contents.insert(
                0,
                json!({
                    "role": "user",
                    "parts": [{"text": format!("System instructions: {}", system.content)}]
                }),
            );
        }

        // Images ride on the last user turn.
        if !request.images.is_empty() {
            if let Some(content) = contents
                .iter_mut()
                .rev()
                .find(|c| c["role"] == "user")
            {
                let parts = content["parts"].as_array_mut().expect("parts array");
                for image in &request.images {
                    parts.push(json!({
                        "inline_data": {
                            "mime_type": image.media_type,
                            "data": image.data
                        }
                    }));
                }
            }
        }

        contents
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = json!({
            "contents": self.build_contents(&request),
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens
            }
        });

        let url = format!(
            "{}/{}:generateContent?key={}",
            BASE_URL, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
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
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body_text);
            return Err(backend_error(status, message, retry_after));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Unparseable(format!("Gemini response: {err}")))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
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

    #[test]
    fn system_message_becomes_leading_user_turn() {
        let client = GeminiClient::new("key", "model");
        let request = GenerationRequest::new(vec![
            ChatMessage::system("be neutral"),
            ChatMessage::user("hello"),
        ]);

        let contents = client.build_contents(&request);
        assert_eq!(contents.len(), 2);
        assert_eq!(
            contents[0]["parts"][0]["text"],
            "System instructions: be neutral"
        );
        assert_eq!(contents[1]["parts"][0]["text"], "hello");
    }
}

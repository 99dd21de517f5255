//! Generation layer for Concord.
//!
//! HTTP clients for the supported generation backends, plus the three
//! consumers of generated text: the mediator (derived artifacts), the
//! insight accumulator, and the two-phase judgment pipeline.

pub mod claude_client;
pub mod config;
pub mod gemini_client;
mod http;
pub mod insight_accumulator;
pub mod judgment_pipeline;
pub mod mediator;
pub mod openai_client;
pub mod parse;

pub use claude_client::ClaudeClient;
pub use config::GenerationTuning;
pub use gemini_client::GeminiClient;
pub use insight_accumulator::{InsightAccumulator, StageInput};
pub use judgment_pipeline::JudgmentPipeline;
pub use mediator::{AttachmentBundle, Mediator};
pub use openai_client::OpenAiClient;

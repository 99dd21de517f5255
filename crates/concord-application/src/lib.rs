//! Application layer for Concord.
//!
//! This crate provides the session orchestrator that coordinates the domain,
//! persistence and generation layers to drive the negotiation protocol.

pub mod orchestrator;


pub use orchestrator::{JoinInfo, SessionOrchestrator};

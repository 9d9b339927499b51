// Screening pipeline: prompt templating, completion parsing, per-candidate session
// state machine and its HTTP surface.
// All generation calls go through llm_client; nothing here talks to Gemini directly.

pub mod contract;
pub mod documents;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod questions;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod template;

//! LLM plumbing — the Gemini client, response schemas, and prompts.

mod gemini;
pub mod prompts;
pub mod schemas;

pub use gemini::{GeminiClient, GeminiConfig};

pub mod budget;
pub mod gemini;
pub mod history;

use async_trait::async_trait;

use crate::errors::AppError;

pub use budget::{select_budget, TokenBudget};
pub use gemini::GeminiModelClient;
pub use history::build_history;

pub const TEMPERATURE: f64 = 0.7;
pub const TOP_P: f64 = 0.95;
pub const TOP_K: u32 = 64;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. \
    Keep the length of each answer proportional to the request: reply to simple \
    questions and small talk in a few sentences, and give long, structured answers \
    only when the user asks for an explanation, a detailed breakdown or a \
    step-by-step walkthrough.";

/// Who spoke a history turn, in the generation service's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything the generation service needs for one reply.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub history: &'a [Turn],
    pub message: &'a str,
    pub budget: TokenBudget,
    pub system_instruction: &'a str,
}

/// Boundary to the hosted generation service.
///
/// Failures come back as [`AppError::Upstream`], [`AppError::ModelTimeout`]
/// or [`AppError::Configuration`]; callers treat them all as "no reply".
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Checked before any conversation is touched.
    fn ensure_configured(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, AppError>;
}

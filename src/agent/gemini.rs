use std::time::Duration;

use async_trait::async_trait;
use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use serde_json::json;
use tracing::{debug, error};

use super::{GenerationRequest, ModelClient, Speaker, Turn, TEMPERATURE, TOP_K, TOP_P};
use crate::errors::AppError;

/// Builds the rig [`RigMessage`] history list from history turns.
fn to_rig_history(history: &[Turn]) -> Vec<RigMessage> {
    history
        .iter()
        .map(|turn| match turn.speaker {
            Speaker::User => RigMessage::user(&turn.text),
            Speaker::Model => RigMessage::assistant(&turn.text),
        })
        .collect()
}

/// [`ModelClient`] backed by the rig Gemini provider.
///
/// The client is only built when an API key is configured; without one every
/// generation attempt fails with [`AppError::Configuration`].
#[derive(Clone)]
pub struct GeminiModelClient {
    client: Option<gemini::Client>,
    timeout: Duration,
}

impl GeminiModelClient {
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self, AppError> {
        let client = api_key
            .map(|key| {
                gemini::Client::builder()
                    .api_key(key)
                    .build()
                    .map_err(|e| AppError::Configuration {
                        message: format!("failed to build Gemini client: {e}"),
                    })
            })
            .transpose()?;
        Ok(Self { client, timeout })
    }

    fn client(&self) -> Result<&gemini::Client, AppError> {
        self.client.as_ref().ok_or_else(|| AppError::Configuration {
            message: "API key not found".to_string(),
        })
    }
}

#[async_trait]
impl ModelClient for GeminiModelClient {
    fn ensure_configured(&self) -> Result<(), AppError> {
        self.client().map(|_| ())
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, AppError> {
        let agent = self
            .client()?
            .agent(request.model)
            .preamble(request.system_instruction)
            .temperature(TEMPERATURE)
            .max_tokens(request.budget.max_tokens())
            .additional_params(json!({
                "generationConfig": { "topP": TOP_P, "topK": TOP_K }
            }))
            .build();

        debug!(
            model = request.model,
            turns = request.history.len(),
            max_tokens = request.budget.max_tokens(),
            "requesting completion"
        );

        let reply = tokio::time::timeout(
            self.timeout,
            agent.chat(request.message, to_rig_history(request.history)),
        )
        .await
        .map_err(|_| AppError::ModelTimeout { seconds: self.timeout.as_secs() })?;

        reply.map_err(|e| {
            error!("Gemini generation failed: {e}");
            AppError::Upstream { message: e.to_string() }
        })
    }
}

//! GenAI-backed judgment client.
//!
//! Uses the `genai` crate for a unified interface across providers (Ollama,
//! OpenAI, Anthropic, Gemini, Grok, Groq). Provider credentials and custom
//! endpoints come from the usual environment variables (`OLLAMA_HOST`,
//! `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, ...).

use crate::client::JudgmentClient;
use crate::prompt::build_judgment_prompt;
use crate::response::parse_judgment_response;
use crate::types::JudgmentRequest;
use async_trait::async_trait;
use freightguard_core::{Judgment, JudgmentError};
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use genai::Client;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TEMPERATURE: f64 = 0.3;

pub struct GenAIJudgmentClient {
    client: Client,
    /// Full model identifier (e.g. "ollama:qwen2.5:7b").
    model: String,
    provider: AdapterKind,
    timeout: Duration,
    temperature: f64,
}

impl GenAIJudgmentClient {
    pub fn new(provider: AdapterKind, model: String) -> Self {
        Self::with_config(provider, model, None, None)
    }

    pub fn with_config(
        provider: AdapterKind,
        model: String,
        timeout: Option<Duration>,
        temperature: Option<f64>,
    ) -> Self {
        let full_model = format!("{}:{}", provider_prefix(provider), model);

        debug!(
            "Creating GenAI judgment client: provider={:?}, model={}",
            provider, model
        );

        Self {
            client: Client::default(),
            model: full_model,
            provider,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    /// Sends a prompt and returns the raw text response. The call is bounded
    /// by the configured timeout so a stalled provider cannot hang the run.
    async fn generate(&self, prompt: String) -> Result<String, JudgmentError> {
        let chat_req = ChatRequest::new(vec![ChatMessage::user(prompt.clone())]);
        let options = ChatOptions::default().with_temperature(self.temperature);

        debug!(
            "Sending judgment request to {:?}: prompt_length={}",
            self.provider,
            prompt.len()
        );

        let start = std::time::Instant::now();

        let exec = self.client.exec_chat(&self.model, chat_req, Some(&options));
        let response = tokio::time::timeout(self.timeout, exec)
            .await
            .map_err(|_| {
                error!(
                    "{:?} judgment request timed out after {:?}",
                    self.provider, self.timeout
                );
                JudgmentError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| {
                error!("{:?} API error: {}", self.provider, e);
                JudgmentError::Api {
                    message: format!("{:?} request failed: {}", self.provider, e),
                    status_code: None,
                }
            })?;

        info!(
            "{:?} judgment completed in {:.2}s",
            self.provider,
            start.elapsed().as_secs_f64()
        );

        let content = response
            .first_text()
            .ok_or_else(|| JudgmentError::InvalidResponse {
                message: "No text content in response".to_string(),
                raw_response: None,
            })?
            .to_string();

        debug!("Judgment response length: {} characters", content.len());

        Ok(content)
    }
}

#[async_trait]
impl JudgmentClient for GenAIJudgmentClient {
    async fn assess(&self, request: &JudgmentRequest) -> Result<Judgment, JudgmentError> {
        info!(
            "Requesting contextual judgment for invoice {} ({} anomalies)",
            request.invoice.id,
            request.anomalies.len()
        );

        let prompt = build_judgment_prompt(request);
        let response_text = self.generate(prompt).await?;

        let judgment = parse_judgment_response(&response_text).map_err(|e| {
            error!("Failed to parse judgment response: {}", e);
            JudgmentError::Parse {
                message: e.to_string(),
                context: response_text.chars().take(200).collect(),
            }
        })?;

        info!(
            "Judgment for {}: confidence {:.2}, fair cost {:.2}, {} justified / {} suspicious",
            request.invoice.id,
            judgment.confidence,
            judgment.estimated_fair_cost,
            judgment.justified_anomalies.len(),
            judgment.suspicious_anomalies.len()
        );

        Ok(judgment)
    }

    fn name(&self) -> &str {
        "genai"
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

fn provider_prefix(provider: AdapterKind) -> &'static str {
    match provider {
        AdapterKind::Ollama => "ollama",
        AdapterKind::OpenAI => "openai",
        AdapterKind::Anthropic => "claude",
        AdapterKind::Gemini => "gemini",
        AdapterKind::Xai => "grok",
        AdapterKind::Groq => "groq",
        _ => "ollama",
    }
}

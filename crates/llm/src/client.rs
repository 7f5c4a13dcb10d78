use crate::types::JudgmentRequest;
use async_trait::async_trait;
use freightguard_core::{Judgment, JudgmentError};

/// The external judgment capability: given invoice facts, anomalies and a
/// historical summary, return a structured assessment.
///
/// Implementations are LLM-backed, deterministic stubs for testing, or
/// fallback-only. The pipeline injects one of these; guardrail and decision
/// logic never depend on which.
#[async_trait]
pub trait JudgmentClient: Send + Sync {
    /// Produce a qualitative judgment for the request, or fail.
    ///
    /// Callers treat any error as a signal to fall back to the deterministic
    /// judgment; no retry semantics are assumed.
    async fn assess(&self, request: &JudgmentRequest) -> Result<Judgment, JudgmentError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Optional model identifier for logging.
    fn model_info(&self) -> Option<String> {
        None
    }
}

/// A client that always fails, forcing the deterministic fallback path.
/// Useful when no LLM backend is reachable or wanted.
pub struct OfflineJudgmentClient;

#[async_trait]
impl JudgmentClient for OfflineJudgmentClient {
    async fn assess(&self, _request: &JudgmentRequest) -> Result<Judgment, JudgmentError> {
        Err(JudgmentError::Configuration {
            message: "offline mode: no judgment backend configured".to_string(),
        })
    }

    fn name(&self) -> &str {
        "offline"
    }
}

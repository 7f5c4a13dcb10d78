use super::context::RunState;
use super::orchestrator::AuditPipeline;
use anyhow::Result;
use freightguard_core::config::AuditPolicy;
use freightguard_core::{AuditDecision, HistoricalRecord, Invoice};
use freightguard_llm::JudgmentClient;
use std::sync::Arc;

/// Entry point for auditing invoices. Every `audit` call allocates its own
/// `RunState`; concurrent invocations share nothing mutable.
pub struct AuditService {
    pipeline: AuditPipeline,
    client: Arc<dyn JudgmentClient>,
    policy: Arc<AuditPolicy>,
}

impl AuditService {
    pub fn new(client: Arc<dyn JudgmentClient>) -> Self {
        Self::with_policy(client, AuditPolicy::default())
    }

    pub fn with_policy(client: Arc<dyn JudgmentClient>, policy: AuditPolicy) -> Self {
        Self {
            pipeline: AuditPipeline::new(client.clone()),
            client,
            policy: Arc::new(policy),
        }
    }

    /// Audits one invoice against the expected cost and historical records.
    ///
    /// Only fatal input errors (malformed invoice, zero divisors or
    /// baselines) surface as `Err`; judgment failures degrade to the
    /// deterministic fallback inside the pipeline.
    pub async fn audit(
        &self,
        invoice: Invoice,
        historical: Vec<HistoricalRecord>,
        expected_cost: f64,
    ) -> Result<AuditDecision> {
        let mut state = RunState::new(invoice, historical, expected_cost, self.policy.clone());
        self.pipeline.execute(&mut state).await?;
        state.into_decision()
    }

    pub fn backend_name(&self) -> &str {
        self.client.name()
    }

    pub fn backend_model_info(&self) -> Option<String> {
        self.client.model_info()
    }
}

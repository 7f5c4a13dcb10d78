use super::context::RunState;
use super::stage_trait::PipelineStage;
use super::stages::decide::DecideStage;
use super::stages::detect::DetectStage;
use super::stages::guardrail::GuardrailStage;
use super::stages::judgment::JudgmentStage;
use super::stages::route::{route, Route};
use super::stages::validate::ValidateStage;
use anyhow::{Context, Result};
use freightguard_llm::JudgmentClient;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runs the audit stages in sequence with the one conditional branch:
/// validate -> detect -> route -> [judge -> guardrail] -> decide.
pub struct AuditPipeline {
    client: Arc<dyn JudgmentClient>,
}

impl AuditPipeline {
    pub fn new(client: Arc<dyn JudgmentClient>) -> Self {
        Self { client }
    }

    pub async fn execute(&self, state: &mut RunState) -> Result<()> {
        let start = Instant::now();
        info!(invoice = %state.invoice.id, "starting audit pipeline");

        self.run_stage(&ValidateStage, state).await?;
        self.run_stage(&DetectStage, state).await?;

        match route(state) {
            Route::Recommend => {
                info!(invoice = %state.invoice.id, "short-circuit: recommend branch");
            }
            Route::Analyze => {
                let judgment_stage = JudgmentStage::new(self.client.clone());
                self.run_stage(&judgment_stage, state).await?;
                self.run_stage(&GuardrailStage, state).await?;
            }
        }

        self.run_stage(&DecideStage, state).await?;

        info!(
            invoice = %state.invoice.id,
            anomalies = state.anomalies.len(),
            status = %state.status.expect("decide stage sets a status"),
            total_time_ms = start.elapsed().as_millis(),
            "audit pipeline complete"
        );

        Ok(())
    }

    async fn run_stage(&self, stage: &dyn PipelineStage, state: &mut RunState) -> Result<()> {
        let stage_name = stage.name();
        let stage_start = Instant::now();

        stage
            .execute(state)
            .await
            .with_context(|| format!("Stage {} failed", stage_name))?;

        info!(
            stage = %stage_name,
            duration_ms = stage_start.elapsed().as_millis(),
            "stage complete"
        );

        Ok(())
    }
}

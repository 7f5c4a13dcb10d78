use super::context::RunState;
use anyhow::Result;
use async_trait::async_trait;

/// One stage of the audit pipeline. Stages run strictly in sequence; each
/// reads only fields populated by its predecessors and mutates the single
/// per-run `RunState`.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, state: &mut RunState) -> Result<()>;
}

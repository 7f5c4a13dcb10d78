pub mod context;
pub mod orchestrator;
pub mod service;
pub mod stage_trait;
pub mod stages;

pub use context::RunState;
pub use orchestrator::AuditPipeline;
pub use service::AuditService;
pub use stage_trait::PipelineStage;

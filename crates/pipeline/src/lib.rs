pub mod pipeline;

pub use pipeline::context::RunState;
pub use pipeline::orchestrator::AuditPipeline;
pub use pipeline::service::AuditService;
pub use pipeline::stages::route::Route;

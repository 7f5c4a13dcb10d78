pub mod config;
pub mod error;
pub mod model;
pub mod output;

pub use config::{AuditPolicy, ConfigError, FreightguardConfig};
pub use error::{AuditError, JudgmentError};
pub use model::{
    AnomalyKind, AnomalyRecord, HistoricalRecord, Invoice, Judgment, ServiceClass, Severity,
};
pub use output::schema::{AuditDecision, DecisionStatus};

use crate::model::{AnomalyKind, AnomalyRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    RequiresReview,
    Rejected,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Approved => write!(f, "approved"),
            DecisionStatus::RequiresReview => write!(f, "requires_review"),
            DecisionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Final output of an audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditDecision {
    pub invoice_id: String,
    pub status: DecisionStatus,
    pub reasoning: String,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
    pub estimated_fair_cost: f64,
    pub anomalies: Vec<AnomalyRecord>,
    pub context_factors: Vec<String>,
    pub justified_anomaly_types: Vec<AnomalyKind>,
    pub suspicious_anomaly_types: Vec<AnomalyKind>,
}

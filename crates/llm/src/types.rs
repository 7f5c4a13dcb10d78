use freightguard_core::{AnomalyRecord, HistoricalRecord, Invoice};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condensed view of the historical baseline handed to the judgment
/// capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoricalSummary {
    /// No historical records were supplied for this run.
    None,
    Summary { count: usize, mean_amount: f64 },
}

impl HistoricalSummary {
    pub fn from_records(records: &[HistoricalRecord]) -> Self {
        if records.is_empty() {
            return HistoricalSummary::None;
        }
        let mean = records.iter().map(|r| r.amount).sum::<f64>() / records.len() as f64;
        HistoricalSummary::Summary {
            count: records.len(),
            mean_amount: mean,
        }
    }
}

impl fmt::Display for HistoricalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoricalSummary::None => write!(f, "no historical data available"),
            HistoricalSummary::Summary { count, mean_amount } => {
                write!(f, "{} past invoices, mean amount {:.2}", count, mean_amount)
            }
        }
    }
}

/// Everything the judgment capability is allowed to see for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentRequest {
    pub invoice: Invoice,
    pub expected_cost: f64,
    pub variance_pct: f64,
    pub history: HistoricalSummary,
    /// Up to a handful of raw historical records for context.
    pub samples: Vec<HistoricalRecord>,
    pub anomalies: Vec<AnomalyRecord>,
}

//! Conditional routing after detection.
//!
//! A run with zero anomalies must never reach the external judgment step and
//! must always resolve to approval-class confidence. Short-circuiting is both
//! an optimization (no external call) and a correctness rule.

use crate::pipeline::context::RunState;
use freightguard_core::Judgment;
use tracing::info;

pub const NO_ANOMALY_RATIONALE: &str =
    "No anomalies were detected: invoice amount is consistent with the expected \
     cost and historical context.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Anomalies present; continue to qualitative analysis.
    Analyze,
    /// No anomalies; skip straight to the decision with a synthetic judgment.
    Recommend,
}

/// Decides the branch. On the `Recommend` branch the synthetic judgment is
/// installed here so downstream stages see the same shape either way.
pub fn route(state: &mut RunState) -> Route {
    if !state.anomalies.is_empty() {
        return Route::Analyze;
    }

    info!(
        invoice = %state.invoice.id,
        "no anomalies detected, skipping qualitative analysis"
    );

    state.judgment = Some(Judgment {
        contextual_factors: vec![
            "All rule and statistical checks passed within thresholds".to_string(),
        ],
        justified_anomalies: vec![],
        suspicious_anomalies: vec![],
        rationale: NO_ANOMALY_RATIONALE.to_string(),
        estimated_fair_cost: state.expected_cost,
        confidence: state.policy.decision.short_circuit_confidence,
    });

    Route::Recommend
}

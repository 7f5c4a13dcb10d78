use anyhow::{anyhow, Result};
use freightguard_core::config::AuditPolicy;
use freightguard_core::{
    AnomalyRecord, AuditDecision, DecisionStatus, HistoricalRecord, Invoice, Judgment,
};
use std::sync::Arc;

/// The single mutable record threaded through all pipeline stages.
///
/// One `RunState` is allocated per invoice submission and never shared across
/// runs; the detector's hygiene filter remains as a belt-and-braces invariant
/// check, not the isolation mechanism.
#[derive(Clone)]
pub struct RunState {
    pub invoice: Invoice,
    pub historical: Vec<HistoricalRecord>,
    pub expected_cost: f64,
    pub policy: Arc<AuditPolicy>,

    // Populated by detection.
    pub anomalies: Vec<AnomalyRecord>,
    pub variance_pct: Option<f64>,

    // Populated by the router short-circuit, the judgment adapter, or the
    // deterministic fallback; corrected in place by the guardrail.
    pub judgment: Option<Judgment>,

    // Populated by the decision engine.
    pub status: Option<DecisionStatus>,
    pub reasoning: Option<String>,
    pub recommendations: Vec<String>,
    pub final_confidence: Option<f64>,
}

impl RunState {
    pub fn new(
        invoice: Invoice,
        historical: Vec<HistoricalRecord>,
        expected_cost: f64,
        policy: Arc<AuditPolicy>,
    ) -> Self {
        Self {
            invoice,
            historical,
            expected_cost,
            policy,
            anomalies: Vec::new(),
            variance_pct: None,
            judgment: None,
            status: None,
            reasoning: None,
            recommendations: Vec::new(),
            final_confidence: None,
        }
    }

    /// Variance vs the expected cost, available after detection.
    pub fn variance_pct(&self) -> f64 {
        self.variance_pct.unwrap_or(0.0)
    }

    /// Consumes the run and assembles the caller-facing decision. Fails only
    /// if a stage was skipped, which indicates a wiring bug.
    pub fn into_decision(self) -> Result<AuditDecision> {
        let status = self
            .status
            .ok_or_else(|| anyhow!("pipeline finished without a status"))?;
        let confidence = self
            .final_confidence
            .ok_or_else(|| anyhow!("pipeline finished without a confidence score"))?;
        let judgment = self
            .judgment
            .ok_or_else(|| anyhow!("pipeline finished without a judgment"))?;

        Ok(AuditDecision {
            invoice_id: self.invoice.id,
            status,
            reasoning: self.reasoning.unwrap_or_else(|| judgment.rationale.clone()),
            recommendations: self.recommendations,
            confidence_score: confidence,
            estimated_fair_cost: judgment.estimated_fair_cost,
            anomalies: self.anomalies,
            context_factors: judgment.contextual_factors,
            justified_anomaly_types: judgment.justified_anomalies,
            suspicious_anomaly_types: judgment.suspicious_anomalies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn invoice() -> Invoice {
        Invoice {
            id: "INV-1".to_string(),
            amount: 100.0,
            distance_km: 10.0,
            weight_kg: 10.0,
            service: freightguard_core::ServiceClass::Standard,
            shipment_date: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn incomplete_run_cannot_become_a_decision() {
        let state = RunState::new(invoice(), vec![], 100.0, Arc::new(AuditPolicy::default()));
        assert!(state.into_decision().is_err());
    }

    #[test]
    fn completed_run_assembles_decision() {
        let mut state = RunState::new(invoice(), vec![], 100.0, Arc::new(AuditPolicy::default()));
        state.judgment = Some(Judgment {
            contextual_factors: vec!["routine shipment".to_string()],
            justified_anomalies: vec![],
            suspicious_anomalies: vec![],
            rationale: "no deviation from expected cost".to_string(),
            estimated_fair_cost: 100.0,
            confidence: 0.95,
        });
        state.status = Some(DecisionStatus::Approved);
        state.final_confidence = Some(0.95);
        state.recommendations = vec!["Approve for payment".to_string()];

        let decision = state.into_decision().unwrap();
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.estimated_fair_cost, 100.0);
        assert_eq!(decision.context_factors, vec!["routine shipment"]);
    }
}

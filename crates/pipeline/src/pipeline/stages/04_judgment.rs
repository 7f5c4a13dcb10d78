//! Contextual judgment adapter.
//!
//! Formats the case for the external judgment capability and invokes it. Any
//! failure of the capability is recovered locally with a deterministic
//! fallback derived purely from variance magnitude and service type; a
//! judgment failure is never a run failure.

use crate::pipeline::context::RunState;
use crate::pipeline::stage_trait::PipelineStage;
use anyhow::Result;
use async_trait::async_trait;
use freightguard_core::config::FallbackPolicy;
use freightguard_core::{AnomalyKind, AnomalyRecord, Judgment, ServiceClass};
use freightguard_llm::{HistoricalSummary, JudgmentClient, JudgmentRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct JudgmentStage {
    client: Arc<dyn JudgmentClient>,
}

impl JudgmentStage {
    pub fn new(client: Arc<dyn JudgmentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PipelineStage for JudgmentStage {
    fn name(&self) -> &'static str {
        "JudgmentStage"
    }

    async fn execute(&self, state: &mut RunState) -> Result<()> {
        let samples: Vec<_> = state
            .historical
            .iter()
            .take(state.policy.detection.max_history_samples)
            .cloned()
            .collect();

        let request = JudgmentRequest {
            invoice: state.invoice.clone(),
            expected_cost: state.expected_cost,
            variance_pct: state.variance_pct(),
            history: HistoricalSummary::from_records(&state.historical),
            samples,
            anomalies: state.anomalies.clone(),
        };

        debug!(
            invoice = %state.invoice.id,
            backend = self.client.name(),
            "requesting contextual judgment"
        );

        let judgment = match self.client.assess(&request).await {
            Ok(judgment) => judgment,
            Err(e) => {
                warn!(
                    invoice = %state.invoice.id,
                    error = %e,
                    "judgment capability failed, using deterministic fallback"
                );
                fallback_judgment(
                    state.variance_pct(),
                    state.invoice.service,
                    &state.anomalies,
                    state.expected_cost,
                    &state.policy.fallback,
                )
            }
        };

        info!(
            invoice = %state.invoice.id,
            confidence = judgment.confidence,
            "judgment obtained"
        );

        state.judgment = Some(judgment);
        Ok(())
    }
}

/// Deterministic judgment synthesized without any external input. Confidence
/// is bucketed on variance magnitude, with a carve-out for express service
/// where a large premium is routine. All current anomaly kinds are treated as
/// suspicious since nothing vouches for them.
pub fn fallback_judgment(
    variance_pct: f64,
    service: ServiceClass,
    anomalies: &[AnomalyRecord],
    expected_cost: f64,
    policy: &FallbackPolicy,
) -> Judgment {
    let magnitude = variance_pct.abs();

    let (confidence, bucket) = if magnitude < policy.small_variance_pct {
        (
            policy.small_variance_confidence,
            format!("variance under {:.0}%", policy.small_variance_pct),
        )
    } else if service == ServiceClass::Express && magnitude < policy.express_variance_pct {
        (
            policy.express_confidence,
            format!(
                "express service with variance under {:.0}%",
                policy.express_variance_pct
            ),
        )
    } else if magnitude < policy.moderate_variance_pct {
        (
            policy.moderate_confidence,
            format!("variance under {:.0}%", policy.moderate_variance_pct),
        )
    } else if magnitude < policy.large_variance_pct {
        (
            policy.large_confidence,
            format!("variance under {:.0}%", policy.large_variance_pct),
        )
    } else {
        (
            policy.extreme_confidence,
            format!("extreme variance of {:.0}% or more", policy.large_variance_pct),
        )
    };

    let mut suspicious: Vec<AnomalyKind> = Vec::new();
    for anomaly in anomalies {
        if !suspicious.contains(&anomaly.kind) {
            suspicious.push(anomaly.kind);
        }
    }

    Judgment {
        contextual_factors: vec![format!(
            "Fallback assessment: {} service, cost variance {:.1}%",
            service, variance_pct
        )],
        justified_anomalies: vec![],
        suspicious_anomalies: suspicious,
        rationale: format!(
            "External judgment was unavailable; applied the deterministic fallback \
             bucket ({}) with confidence {:.2}.",
            bucket, confidence
        ),
        estimated_fair_cost: expected_cost,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightguard_core::Severity;

    fn policy() -> FallbackPolicy {
        FallbackPolicy::default()
    }

    #[test]
    fn fallback_buckets_by_variance_magnitude() {
        let p = policy();
        let cases = [
            (3.0, ServiceClass::Standard, 0.85),
            (-4.9, ServiceClass::Standard, 0.85),
            (45.0, ServiceClass::Express, 0.65),
            (20.0, ServiceClass::Standard, 0.55),
            (75.0, ServiceClass::Standard, 0.35),
            (-150.0, ServiceClass::Standard, 0.15),
            (150.0, ServiceClass::Express, 0.15),
        ];
        for (variance, service, expected) in cases {
            let judgment = fallback_judgment(variance, service, &[], 100.0, &p);
            assert_eq!(
                judgment.confidence, expected,
                "variance {} service {:?}",
                variance, service
            );
        }
    }

    #[test]
    fn fallback_marks_all_anomalies_suspicious() {
        let anomalies = vec![
            AnomalyRecord::rule(AnomalyKind::HighCostPerKm, Severity::Medium, "a"),
            AnomalyRecord::rule(AnomalyKind::HighCostPerKg, Severity::Medium, "b"),
            AnomalyRecord::comparison(
                AnomalyKind::PriceDeviation,
                Severity::High,
                "c",
                100.0,
                250.0,
                150.0,
            ),
        ];
        let judgment = fallback_judgment(150.0, ServiceClass::Standard, &anomalies, 100.0, &policy());

        assert!(judgment.justified_anomalies.is_empty());
        assert_eq!(
            judgment.suspicious_anomalies,
            vec![
                AnomalyKind::HighCostPerKm,
                AnomalyKind::HighCostPerKg,
                AnomalyKind::PriceDeviation,
            ]
        );
        assert_eq!(judgment.estimated_fair_cost, 100.0);
        assert!(judgment.rationale.contains("fallback"));
    }

    #[test]
    fn fallback_names_the_triggering_bucket() {
        let judgment = fallback_judgment(2.0, ServiceClass::Standard, &[], 100.0, &policy());
        assert!(judgment.rationale.contains("variance under 5%"));

        let judgment = fallback_judgment(500.0, ServiceClass::Standard, &[], 100.0, &policy());
        assert!(judgment.rationale.contains("extreme variance"));
    }
}

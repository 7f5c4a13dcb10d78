//! Decision engine: maps final confidence into a status and assembles the
//! recommendation list.

use crate::pipeline::context::RunState;
use crate::pipeline::stage_trait::PipelineStage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use freightguard_core::config::DecisionPolicy;
use freightguard_core::{AnomalyRecord, DecisionStatus, Judgment, ServiceClass, Severity};
use tracing::{debug, warn};

pub struct DecideStage;

#[async_trait]
impl PipelineStage for DecideStage {
    fn name(&self) -> &'static str {
        "DecideStage"
    }

    async fn execute(&self, state: &mut RunState) -> Result<()> {
        let policy = state.policy.decision.clone();
        let judgment = state
            .judgment
            .as_ref()
            .ok_or_else(|| anyhow!("decision requires a judgment from an earlier stage"))?
            .clone();

        let mut confidence = judgment.confidence;
        let mut status = map_confidence(confidence, &policy);
        let mut reasoning = judgment.rationale.clone();

        // Zero anomalies with a collapsed confidence means an upstream wiring
        // gap, not a genuine low-confidence judgment.
        if state.anomalies.is_empty() && confidence == 0.0 {
            warn!(
                invoice = %state.invoice.id,
                "zero anomalies with zero confidence, forcing approval"
            );
            status = DecisionStatus::Approved;
            confidence = policy.short_circuit_confidence;
            reasoning = format!(
                "{} Confidence was corrected upward: no anomalies were detected.",
                reasoning
            );
        }

        // Never reject on low confidence alone when the numbers look fine.
        if status == DecisionStatus::Rejected {
            let fair = judgment.estimated_fair_cost;
            if fair > 0.0 {
                let delta_pct = (state.invoice.amount - fair).abs() / fair * 100.0;
                if delta_pct < policy.small_delta_pct {
                    warn!(
                        invoice = %state.invoice.id,
                        delta_pct,
                        "rejection overridden: amount within {:.0}% of the judged fair cost",
                        policy.small_delta_pct
                    );
                    status = DecisionStatus::Approved;
                    confidence = policy.small_delta_override_confidence;
                    reasoning = format!(
                        "{} Rejection was overridden: the billed amount is within {:.1}% \
                         of the judged fair cost.",
                        reasoning, delta_pct
                    );
                }
            }
        }

        state.recommendations = build_recommendations(
            status,
            &judgment,
            &state.invoice.id,
            state.invoice.amount,
            state.invoice.service,
            &state.anomalies,
            &policy,
        );
        state.status = Some(status);
        state.final_confidence = Some(confidence);
        state.reasoning = Some(reasoning);

        debug!(
            invoice = %state.invoice.id,
            status = %status,
            confidence,
            recommendations = state.recommendations.len(),
            "decision complete"
        );

        Ok(())
    }
}

/// Exhaustive, non-overlapping confidence bands.
pub fn map_confidence(confidence: f64, policy: &DecisionPolicy) -> DecisionStatus {
    if confidence >= policy.approve_confidence {
        DecisionStatus::Approved
    } else if confidence >= policy.review_confidence {
        DecisionStatus::RequiresReview
    } else {
        DecisionStatus::Rejected
    }
}

fn build_recommendations(
    status: DecisionStatus,
    judgment: &Judgment,
    invoice_id: &str,
    actual: f64,
    service: ServiceClass,
    anomalies: &[AnomalyRecord],
    policy: &DecisionPolicy,
) -> Vec<String> {
    let fair = judgment.estimated_fair_cost;

    match status {
        DecisionStatus::Approved => {
            vec!["Approve invoice for payment; costs are consistent with expectations.".to_string()]
        }
        DecisionStatus::Rejected => vec![
            format!(
                "Reject invoice {}: confidence in its legitimacy is too low.",
                invoice_id
            ),
            "Escalate to procurement for carrier follow-up before any payment.".to_string(),
        ],
        DecisionStatus::RequiresReview => {
            let justified = !judgment.justified_anomalies.is_empty();
            let suspicious = !judgment.suspicious_anomalies.is_empty();

            if justified && !suspicious {
                review_all_justified(actual, fair, service, policy)
            } else if justified && suspicious {
                review_mixed(judgment, actual, fair, service, anomalies, policy)
            } else {
                review_unestablished(actual, fair, anomalies, policy)
            }
        }
    }
}

/// Every flagged anomaly was judged justified by context.
fn review_all_justified(
    actual: f64,
    fair: f64,
    service: ServiceClass,
    policy: &DecisionPolicy,
) -> Vec<String> {
    let mut recs = vec![
        "Flagged anomalies appear justified by context; confirm and approve.".to_string(),
    ];
    if service == ServiceClass::Express {
        recs.push(format!(
            "Express service typically carries a {:.0}-{:.0}% premium over standard freight.",
            policy.express_premium_low_pct, policy.express_premium_high_pct
        ));
    }
    if fair > 0.0 && actual > fair * policy.savings_request_factor {
        recs.push(format!(
            "Request a cost reduction toward the estimated fair cost of {:.2}.",
            fair
        ));
    }
    recs
}

/// Some anomalies justified, some suspicious: acknowledge the justified part,
/// quantify the rest.
fn review_mixed(
    judgment: &Judgment,
    actual: f64,
    fair: f64,
    service: ServiceClass,
    anomalies: &[AnomalyRecord],
    policy: &DecisionPolicy,
) -> Vec<String> {
    let mut recs = Vec::new();

    for factor in &judgment.contextual_factors {
        let lower = factor.to_lowercase();
        if lower.contains("express") {
            recs.push("Acknowledge the express service premium as a justified cost component.".to_string());
        } else if lower.contains("season") {
            recs.push("Acknowledge seasonal demand as a justified cost component.".to_string());
        } else if lower.contains("fuel") {
            recs.push("Acknowledge fuel surcharges as a justified cost component.".to_string());
        }
    }

    let justified_cost = if service == ServiceClass::Express {
        fair * policy.express_justified_factor
    } else {
        fair
    };
    let excess = actual - justified_cost;
    if excess > 0.0 {
        recs.push(format!(
            "Approximately {:.2} above the estimated justified cost of {:.2} is \
             potentially unjustified; ask the carrier to account for it.",
            excess, justified_cost
        ));
    }

    recs.push("Request an itemized cost breakdown from the carrier.".to_string());
    recs.extend(severity_flags(anomalies));
    recs.push(
        "Approve the justified portion of the invoice and clarify the rest before payment."
            .to_string(),
    );
    recs
}

/// Judgment established neither a justified nor a suspicious partition.
fn review_unestablished(
    actual: f64,
    fair: f64,
    anomalies: &[AnomalyRecord],
    policy: &DecisionPolicy,
) -> Vec<String> {
    let mut recs = Vec::new();
    if fair > 0.0 && actual > fair * policy.breakdown_request_factor {
        recs.push("Request an itemized cost breakdown from the carrier.".to_string());
    }
    recs.extend(severity_flags(anomalies));
    recs.push("Obtain quotes from 2 alternative carriers for comparison.".to_string());
    recs
}

fn severity_flags(anomalies: &[AnomalyRecord]) -> Vec<String> {
    anomalies
        .iter()
        .filter(|a| a.severity >= Severity::High)
        .map(|a| {
            format!(
                "{} severity anomaly ({}): {}",
                a.severity, a.kind, a.description
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightguard_core::AnomalyKind;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::default()
    }

    fn judgment(confidence: f64) -> Judgment {
        Judgment {
            contextual_factors: vec![],
            justified_anomalies: vec![],
            suspicious_anomalies: vec![],
            rationale: "rationale long enough to keep as-is".to_string(),
            estimated_fair_cost: 100.0,
            confidence,
        }
    }

    #[test]
    fn thresholds_are_exact() {
        let p = policy();
        assert_eq!(map_confidence(0.85, &p), DecisionStatus::Approved);
        assert_eq!(map_confidence(0.8499999, &p), DecisionStatus::RequiresReview);
        assert_eq!(map_confidence(0.40, &p), DecisionStatus::RequiresReview);
        assert_eq!(map_confidence(0.3999999, &p), DecisionStatus::Rejected);
        assert_eq!(map_confidence(1.0, &p), DecisionStatus::Approved);
        assert_eq!(map_confidence(0.0, &p), DecisionStatus::Rejected);
    }

    #[test]
    fn approved_yields_single_affirmation() {
        let recs = build_recommendations(
            DecisionStatus::Approved,
            &judgment(0.9),
            "INV-1",
            100.0,
            ServiceClass::Standard,
            &[],
            &policy(),
        );
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("Approve"));
    }

    #[test]
    fn rejected_escalates_to_procurement() {
        let recs = build_recommendations(
            DecisionStatus::Rejected,
            &judgment(0.1),
            "INV-1",
            100.0,
            ServiceClass::Standard,
            &[],
            &policy(),
        );
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("Reject invoice INV-1"));
        assert!(recs[1].contains("procurement"));
    }

    #[test]
    fn all_justified_express_notes_premium_band_and_savings() {
        let mut j = judgment(0.6);
        j.justified_anomalies = vec![AnomalyKind::PriceDeviation];
        // actual 130 > fair 100 * 1.20
        let recs = build_recommendations(
            DecisionStatus::RequiresReview,
            &j,
            "INV-1",
            130.0,
            ServiceClass::Express,
            &[],
            &policy(),
        );
        assert!(recs.iter().any(|r| r.contains("30-70% premium")));
        assert!(recs.iter().any(|r| r.contains("cost reduction")));
    }

    #[test]
    fn all_justified_skips_savings_below_trigger() {
        let mut j = judgment(0.6);
        j.justified_anomalies = vec![AnomalyKind::PriceDeviation];
        // 115 < 100 * 1.20
        let recs = build_recommendations(
            DecisionStatus::RequiresReview,
            &j,
            "INV-1",
            115.0,
            ServiceClass::Standard,
            &[],
            &policy(),
        );
        assert!(!recs.iter().any(|r| r.contains("cost reduction")));
    }

    #[test]
    fn mixed_review_quantifies_unjustified_excess() {
        let mut j = judgment(0.5);
        j.justified_anomalies = vec![AnomalyKind::ExpressHeavyShipment];
        j.suspicious_anomalies = vec![AnomalyKind::PriceDeviation];
        j.contextual_factors = vec![
            "express service premium".to_string(),
            "winter season demand".to_string(),
        ];
        let anomalies = vec![AnomalyRecord::comparison(
            AnomalyKind::PriceDeviation,
            Severity::High,
            "way above expected",
            100.0,
            250.0,
            150.0,
        )];
        // express: justified cost = 100 * 1.40 = 140; excess = 250 - 140 = 110
        let recs = build_recommendations(
            DecisionStatus::RequiresReview,
            &j,
            "INV-1",
            250.0,
            ServiceClass::Express,
            &anomalies,
            &policy(),
        );
        assert!(recs.iter().any(|r| r.contains("express service premium")));
        assert!(recs.iter().any(|r| r.contains("seasonal demand")));
        assert!(recs.iter().any(|r| r.contains("110.00")));
        assert!(recs.iter().any(|r| r.contains("itemized")));
        assert!(recs.iter().any(|r| r.contains("high severity anomaly")));
        assert!(recs.last().unwrap().contains("Approve the justified portion"));
    }

    #[test]
    fn unestablished_review_requests_quotes() {
        let anomalies = vec![AnomalyRecord::rule(
            AnomalyKind::HighCostPerKm,
            Severity::Medium,
            "rate high",
        )];
        // 115 > 100 * 1.10 -> breakdown requested
        let recs = build_recommendations(
            DecisionStatus::RequiresReview,
            &judgment(0.5),
            "INV-1",
            115.0,
            ServiceClass::Standard,
            &anomalies,
            &policy(),
        );
        assert!(recs.iter().any(|r| r.contains("itemized")));
        assert!(recs.last().unwrap().contains("2 alternative carriers"));
    }
}

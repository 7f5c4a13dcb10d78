//! Confidence guardrail.
//!
//! The external judgment is untrusted: it may state a rejection-class
//! conclusion while reporting a high confidence, or report a confidence that
//! is unreasonable for the variance magnitude. This stage applies ordered,
//! idempotent correction rules to the judgment's confidence: safety clamps
//! first, in listed order, then mutually exclusive leniency nudges. Every
//! fired rule is a warning-class observability event.

use crate::pipeline::context::RunState;
use crate::pipeline::stage_trait::PipelineStage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use freightguard_core::config::GuardrailPolicy;
use freightguard_core::{Judgment, ServiceClass};
use tracing::{debug, warn};

pub struct GuardrailStage;

#[async_trait]
impl PipelineStage for GuardrailStage {
    fn name(&self) -> &'static str {
        "GuardrailStage"
    }

    async fn execute(&self, state: &mut RunState) -> Result<()> {
        let variance_pct = state.variance_pct();
        let service = state.invoice.service;
        let policy = state.policy.guardrail.clone();
        let rejection_phrases = state.policy.rejection_phrases();

        let judgment = state
            .judgment
            .as_mut()
            .ok_or_else(|| anyhow!("guardrail requires a judgment from an earlier stage"))?;

        let before = judgment.confidence;
        let mut fired = apply_safety_clamps(judgment, variance_pct, &policy, rejection_phrases);
        fired.extend(apply_leniency_nudge(judgment, variance_pct, service, &policy));

        for rule in &fired {
            warn!(
                invoice = %state.invoice.id,
                rule,
                confidence_before = before,
                confidence_after = judgment.confidence,
                "guardrail corrected judgment confidence"
            );
        }

        synthesize_rationale(judgment, variance_pct, &policy);
        synthesize_context_factors(judgment, variance_pct, service);

        debug!(
            invoice = %state.invoice.id,
            rules_fired = fired.len(),
            confidence = judgment.confidence,
            "guardrail complete"
        );

        Ok(())
    }
}

fn contains_rejection_phrase(rationale: &str, phrases: &[&'static str]) -> Option<&'static str> {
    let lower = rationale.to_lowercase();
    phrases.iter().find(|p| lower.contains(*p)).copied()
}

/// Safety clamps, applied in listed order. Each is independent; a later
/// clamp may override an earlier one.
pub fn apply_safety_clamps(
    judgment: &mut Judgment,
    variance_pct: f64,
    policy: &GuardrailPolicy,
    rejection_phrases: &[&'static str],
) -> Vec<&'static str> {
    let mut fired = Vec::new();

    // Rule 1: rationale states a rejection-class conclusion but confidence
    // says otherwise.
    if contains_rejection_phrase(&judgment.rationale, rejection_phrases).is_some()
        && judgment.confidence > policy.clamp_trigger_confidence
    {
        judgment.confidence = policy.contradiction_clamp;
        fired.push("rationale_contradiction");
    }

    // Rule 2: every flagged anomaly is suspicious, none justified.
    if !judgment.suspicious_anomalies.is_empty()
        && judgment.justified_anomalies.is_empty()
        && judgment.confidence > policy.clamp_trigger_confidence
    {
        judgment.confidence = judgment.confidence.min(policy.all_suspicious_clamp);
        fired.push("all_suspicious");
    }

    // Rule 3: confidence is impossible at extreme variance.
    if variance_pct.abs() > policy.extreme_variance_pct
        && judgment.confidence > policy.clamp_trigger_confidence
    {
        judgment.confidence = policy.extreme_variance_clamp;
        fired.push("extreme_variance");
    }

    fired
}

/// Leniency nudges, mutually exclusive, evaluated after the clamps.
pub fn apply_leniency_nudge(
    judgment: &mut Judgment,
    variance_pct: f64,
    service: ServiceClass,
    policy: &GuardrailPolicy,
) -> Vec<&'static str> {
    let magnitude = variance_pct.abs();
    let confidence = judgment.confidence;

    if magnitude < policy.negligible_variance_pct
        && confidence < policy.negligible_trigger_confidence
    {
        judgment.confidence = policy.negligible_variance_raise;
        return vec!["negligible_variance_raise"];
    }
    if magnitude < policy.small_variance_pct && confidence < policy.small_trigger_confidence {
        judgment.confidence = policy.small_variance_raise;
        return vec!["small_variance_raise"];
    }
    if service == ServiceClass::Express
        && magnitude < policy.express_variance_pct
        && confidence < policy.express_trigger_confidence
    {
        judgment.confidence = policy.express_raise;
        return vec!["express_raise"];
    }
    if (policy.review_band_low_pct..=policy.review_band_high_pct).contains(&magnitude)
        && confidence < policy.clamp_trigger_confidence
    {
        judgment.confidence = policy.review_band_raise;
        return vec!["review_band_raise"];
    }
    if magnitude > policy.extreme_variance_pct && confidence < policy.extreme_variance_clamp {
        judgment.confidence = judgment.confidence.min(policy.extreme_variance_clamp);
        return vec!["extreme_variance_floor"];
    }

    vec![]
}

/// A trivial or missing rationale is replaced with one derived from the
/// variance and the justified split, so the decision output always explains
/// itself.
fn synthesize_rationale(judgment: &mut Judgment, variance_pct: f64, policy: &GuardrailPolicy) {
    if judgment.rationale.trim().len() >= policy.min_rationale_len {
        return;
    }
    let justification = if judgment.justified_anomalies.is_empty() {
        "no anomaly was judged justified"
    } else {
        "some anomalies were judged justified by context"
    };
    judgment.rationale = format!(
        "Cost variance of {:.1}% against the expected cost; {}.",
        variance_pct, justification
    );
}

fn synthesize_context_factors(judgment: &mut Judgment, variance_pct: f64, service: ServiceClass) {
    if !judgment.contextual_factors.is_empty() {
        return;
    }
    judgment.contextual_factors = vec![format!(
        "{} service with a cost variance of {:.1}%",
        service, variance_pct
    )];
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightguard_core::config::REJECTION_PHRASES;
    use freightguard_core::AnomalyKind;

    fn judgment(confidence: f64, rationale: &str) -> Judgment {
        Judgment {
            contextual_factors: vec!["some factor".to_string()],
            justified_anomalies: vec![AnomalyKind::PriceDeviation],
            suspicious_anomalies: vec![],
            rationale: rationale.to_string(),
            estimated_fair_cost: 100.0,
            confidence,
        }
    }

    fn policy() -> GuardrailPolicy {
        GuardrailPolicy::default()
    }

    const NEUTRAL: &str = "The premium is consistent with market conditions on this route.";

    #[test]
    fn rule_1_clamps_contradictory_high_confidence() {
        let mut j = judgment(0.99, "This premium is clearly unjustified for the route.");
        let fired = apply_safety_clamps(&mut j, 20.0, &policy(), REJECTION_PHRASES);
        assert_eq!(fired, vec!["rationale_contradiction"]);
        assert_eq!(j.confidence, 0.25);
    }

    #[test]
    fn rule_1_matches_case_insensitively() {
        let mut j = judgment(0.80, "This Looks Like FRAUD to me, without question.");
        apply_safety_clamps(&mut j, 20.0, &policy(), REJECTION_PHRASES);
        assert_eq!(j.confidence, 0.25);
    }

    #[test]
    fn rule_1_leaves_low_confidence_alone() {
        let mut j = judgment(0.10, "This amount likely reflects a billing error somewhere.");
        let fired = apply_safety_clamps(&mut j, 20.0, &policy(), REJECTION_PHRASES);
        assert!(fired.is_empty());
        assert_eq!(j.confidence, 0.10);
    }

    #[test]
    fn rule_2_clamps_all_suspicious_judgments() {
        let mut j = judgment(0.75, NEUTRAL);
        j.justified_anomalies.clear();
        j.suspicious_anomalies = vec![AnomalyKind::PriceDeviation, AnomalyKind::HighCostPerKm];
        let fired = apply_safety_clamps(&mut j, 20.0, &policy(), REJECTION_PHRASES);
        assert_eq!(fired, vec!["all_suspicious"]);
        assert_eq!(j.confidence, 0.30);
    }

    #[test]
    fn rule_2_is_a_min_not_an_assignment() {
        // Already below the clamp value after rule 1; rule 2 must not raise it.
        let mut j = judgment(0.99, "This warrants rejection given the pricing history.");
        j.justified_anomalies.clear();
        j.suspicious_anomalies = vec![AnomalyKind::PriceDeviation];
        apply_safety_clamps(&mut j, 20.0, &policy(), REJECTION_PHRASES);
        assert_eq!(j.confidence, 0.25);
    }

    #[test]
    fn rule_3_dominates_extreme_variance() {
        let mut j = judgment(0.90, NEUTRAL);
        let fired = apply_safety_clamps(&mut j, 150.0, &policy(), REJECTION_PHRASES);
        assert_eq!(fired, vec!["extreme_variance"]);
        assert_eq!(j.confidence, 0.20);
    }

    #[test]
    fn clamps_are_idempotent() {
        let mut j = judgment(0.95, "Unjustified premium, should be rejected.");
        apply_safety_clamps(&mut j, 150.0, &policy(), REJECTION_PHRASES);
        let once = j.confidence;
        apply_safety_clamps(&mut j, 150.0, &policy(), REJECTION_PHRASES);
        assert_eq!(j.confidence, once);
    }

    #[test]
    fn nudge_raises_negligible_variance() {
        let mut j = judgment(0.50, NEUTRAL);
        let fired = apply_leniency_nudge(&mut j, 0.5, ServiceClass::Standard, &policy());
        assert_eq!(fired, vec!["negligible_variance_raise"]);
        assert_eq!(j.confidence, 0.90);
    }

    #[test]
    fn nudge_raises_small_variance() {
        let mut j = judgment(0.55, NEUTRAL);
        apply_leniency_nudge(&mut j, 3.0, ServiceClass::Standard, &policy());
        assert_eq!(j.confidence, 0.75);
    }

    #[test]
    fn nudge_raises_express_within_premium_band() {
        let mut j = judgment(0.35, NEUTRAL);
        apply_leniency_nudge(&mut j, 45.0, ServiceClass::Express, &policy());
        assert_eq!(j.confidence, 0.60);

        // Standard service gets no express nudge.
        let mut j = judgment(0.35, NEUTRAL);
        let fired = apply_leniency_nudge(&mut j, 45.0, ServiceClass::Standard, &policy());
        assert!(fired.is_empty());
        assert_eq!(j.confidence, 0.35);
    }

    #[test]
    fn nudge_raises_review_band() {
        let mut j = judgment(0.20, NEUTRAL);
        apply_leniency_nudge(&mut j, 22.0, ServiceClass::Standard, &policy());
        assert_eq!(j.confidence, 0.45);
    }

    #[test]
    fn nudges_are_mutually_exclusive() {
        // variance 3.0 satisfies both the small-variance and (hypothetically)
        // later conditions; only the first matching nudge fires.
        let mut j = judgment(0.30, NEUTRAL);
        let fired = apply_leniency_nudge(&mut j, 3.0, ServiceClass::Express, &policy());
        assert_eq!(fired, vec!["small_variance_raise"]);
        assert_eq!(j.confidence, 0.75);
    }

    #[test]
    fn extreme_variance_floor_never_raises() {
        let mut j = judgment(0.05, NEUTRAL);
        apply_leniency_nudge(&mut j, 150.0, ServiceClass::Standard, &policy());
        assert_eq!(j.confidence, 0.05);
    }

    #[test]
    fn short_rationale_is_replaced() {
        let mut j = judgment(0.5, "ok");
        synthesize_rationale(&mut j, 42.0, &policy());
        assert!(j.rationale.contains("42.0%"));
        assert!(j.rationale.contains("justified"));
    }

    #[test]
    fn adequate_rationale_is_kept() {
        let mut j = judgment(0.5, NEUTRAL);
        synthesize_rationale(&mut j, 42.0, &policy());
        assert_eq!(j.rationale, NEUTRAL);
    }

    #[test]
    fn empty_context_factors_are_synthesized() {
        let mut j = judgment(0.5, NEUTRAL);
        j.contextual_factors.clear();
        synthesize_context_factors(&mut j, 42.0, ServiceClass::Express);
        assert_eq!(j.contextual_factors.len(), 1);
        assert!(j.contextual_factors[0].contains("express"));
    }
}

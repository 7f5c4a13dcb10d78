//! Statistical detection: invoice amount vs expected cost and historical mean.

use crate::pipeline::context::RunState;
use crate::pipeline::stage_trait::PipelineStage;
use anyhow::Result;
use async_trait::async_trait;
use freightguard_core::{AnomalyKind, AnomalyRecord, AuditError, Severity};
use tracing::{debug, warn};

pub struct DetectStage;

#[async_trait]
impl PipelineStage for DetectStage {
    fn name(&self) -> &'static str {
        "DetectStage"
    }

    async fn execute(&self, state: &mut RunState) -> Result<()> {
        let detection = state.policy.detection.clone();
        let invoice_id = state.invoice.id.clone();
        let actual = state.invoice.amount;

        // Hygiene filter: rule anomalies pass unconditionally; comparison
        // anomalies must be tied to the invoice currently being processed.
        // Anything else leaked in from another run and is discarded.
        let before = state.anomalies.len();
        state
            .anomalies
            .retain(|anomaly| !anomaly.is_comparison() || anomaly.actual == Some(actual));
        let dropped = before - state.anomalies.len();
        if dropped > 0 {
            warn!(
                invoice = %invoice_id,
                dropped,
                "discarded comparison anomalies from a different run"
            );
        }

        if state.expected_cost == 0.0 {
            return Err(AuditError::ZeroBaseline {
                baseline: "expected cost",
                invoice_id,
            }
            .into());
        }

        // Price deviation is always evaluated before the historical check.
        let variance_pct = (actual - state.expected_cost) / state.expected_cost * 100.0;
        state.variance_pct = Some(variance_pct);

        if variance_pct.abs() > detection.price_deviation_pct {
            let severity = if variance_pct.abs() > detection.price_deviation_high_pct {
                Severity::High
            } else {
                Severity::Medium
            };
            state.anomalies.push(AnomalyRecord::comparison(
                AnomalyKind::PriceDeviation,
                severity,
                format!(
                    "Amount {:.2} deviates {:.1}% from expected cost {:.2}",
                    actual, variance_pct, state.expected_cost
                ),
                state.expected_cost,
                actual,
                variance_pct,
            ));
        }

        if !state.historical.is_empty() {
            let avg = state.historical.iter().map(|r| r.amount).sum::<f64>()
                / state.historical.len() as f64;
            if avg == 0.0 {
                return Err(AuditError::ZeroBaseline {
                    baseline: "historical average",
                    invoice_id,
                }
                .into());
            }

            let avg_variance_pct = (actual - avg) / avg * 100.0;
            if avg_variance_pct.abs() > detection.historical_outlier_pct {
                state.anomalies.push(AnomalyRecord::comparison(
                    AnomalyKind::HistoricalOutlier,
                    Severity::Medium,
                    format!(
                        "Amount {:.2} deviates {:.1}% from the historical mean {:.2} ({} records)",
                        actual,
                        avg_variance_pct,
                        avg,
                        state.historical.len()
                    ),
                    avg,
                    actual,
                    avg_variance_pct,
                ));
            }
        }

        debug!(
            invoice = %invoice_id,
            variance_pct,
            anomalies = state.anomalies.len(),
            "statistical detection complete"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightguard_core::config::AuditPolicy;
    use freightguard_core::{HistoricalRecord, Invoice, ServiceClass};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn state(amount: f64, expected: f64, historical: Vec<HistoricalRecord>) -> RunState {
        let invoice = Invoice {
            id: "INV-1".to_string(),
            amount,
            distance_km: 100.0,
            weight_kg: 1000.0,
            service: ServiceClass::Standard,
            shipment_date: None,
            extra: HashMap::new(),
        };
        RunState::new(invoice, historical, expected, Arc::new(AuditPolicy::default()))
    }

    #[tokio::test]
    async fn large_deviation_is_high_severity() {
        // expected 100, actual 250 -> variance 150%
        let mut state = state(250.0, 100.0, vec![]);
        DetectStage.execute(&mut state).await.unwrap();

        assert_eq!(state.variance_pct, Some(150.0));
        assert_eq!(state.anomalies.len(), 1);
        let anomaly = &state.anomalies[0];
        assert_eq!(anomaly.kind, AnomalyKind::PriceDeviation);
        assert_eq!(anomaly.severity, Severity::High);
        assert_eq!(anomaly.expected, Some(100.0));
        assert_eq!(anomaly.actual, Some(250.0));
    }

    #[tokio::test]
    async fn moderate_deviation_is_medium_severity() {
        // variance 20%: above 15, below 25
        let mut state = state(120.0, 100.0, vec![]);
        DetectStage.execute(&mut state).await.unwrap();
        assert_eq!(state.anomalies[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn small_deviation_is_not_flagged() {
        let mut state = state(110.0, 100.0, vec![]);
        DetectStage.execute(&mut state).await.unwrap();
        assert!(state.anomalies.is_empty());
        assert_eq!(state.variance_pct, Some(10.000000000000002));
    }

    #[tokio::test]
    async fn historical_outlier_follows_price_deviation() {
        // expected matches (0% variance) but history mean is 100 vs actual 130.
        let mut state = state(
            130.0,
            130.0,
            vec![HistoricalRecord::new(90.0), HistoricalRecord::new(110.0)],
        );
        DetectStage.execute(&mut state).await.unwrap();

        assert_eq!(state.anomalies.len(), 1);
        assert_eq!(state.anomalies[0].kind, AnomalyKind::HistoricalOutlier);
        assert_eq!(state.anomalies[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn both_checks_emit_in_order() {
        let mut state = state(250.0, 100.0, vec![HistoricalRecord::new(100.0)]);
        DetectStage.execute(&mut state).await.unwrap();

        let kinds: Vec<_> = state.anomalies.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AnomalyKind::PriceDeviation, AnomalyKind::HistoricalOutlier]
        );
    }

    #[tokio::test]
    async fn hygiene_filter_drops_foreign_comparison_anomalies() {
        let mut state = state(100.0, 100.0, vec![]);
        // A rule anomaly survives; a comparison anomaly from another invoice
        // (actual 999) does not; one tied to this invoice does.
        state.anomalies.push(AnomalyRecord::rule(
            AnomalyKind::HighCostPerKm,
            Severity::Medium,
            "rate high",
        ));
        state.anomalies.push(AnomalyRecord::comparison(
            AnomalyKind::PriceDeviation,
            Severity::High,
            "belongs to another run",
            500.0,
            999.0,
            99.8,
        ));
        state.anomalies.push(AnomalyRecord::comparison(
            AnomalyKind::HistoricalOutlier,
            Severity::Medium,
            "belongs to this run",
            80.0,
            100.0,
            25.0,
        ));

        DetectStage.execute(&mut state).await.unwrap();

        let kinds: Vec<_> = state.anomalies.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AnomalyKind::HighCostPerKm, AnomalyKind::HistoricalOutlier]
        );
    }

    #[tokio::test]
    async fn zero_expected_cost_is_fatal() {
        let mut state = state(100.0, 0.0, vec![]);
        let err = DetectStage.execute(&mut state).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::ZeroBaseline { baseline: "expected cost", .. })
        ));
    }

    #[tokio::test]
    async fn zero_historical_mean_is_fatal() {
        let mut state = state(100.0, 100.0, vec![HistoricalRecord::new(0.0)]);
        assert!(DetectStage.execute(&mut state).await.is_err());
    }
}

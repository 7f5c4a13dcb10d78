//! Prompt construction for the contextual judgment request.

use crate::types::{HistoricalSummary, JudgmentRequest};
use std::fmt::Write;

/// Builds the judgment prompt: invoice facts, expected/actual/variance, a
/// sample of historical records, the detected anomalies, and the response
/// contract the model must follow.
pub fn build_judgment_prompt(request: &JudgmentRequest) -> String {
    let invoice = &request.invoice;
    let mut prompt = String::with_capacity(2048);

    writeln!(
        prompt,
        "You are a freight cost analyst. Assess whether the flagged anomalies on \
         this carrier invoice are justified by context or remain suspicious."
    )
    .ok();

    writeln!(prompt, "\n## Invoice").ok();
    writeln!(prompt, "- id: {}", invoice.id).ok();
    writeln!(prompt, "- amount: {:.2}", invoice.amount).ok();
    writeln!(prompt, "- distance_km: {:.1}", invoice.distance_km).ok();
    writeln!(prompt, "- weight_kg: {:.1}", invoice.weight_kg).ok();
    writeln!(prompt, "- service: {}", invoice.service).ok();
    if let Some(date) = invoice.shipment_date {
        writeln!(prompt, "- shipment_date: {}", date).ok();
    }
    for (key, value) in &invoice.extra {
        writeln!(prompt, "- {}: {}", key, value).ok();
    }

    writeln!(prompt, "\n## Cost comparison").ok();
    writeln!(prompt, "- expected_cost: {:.2}", request.expected_cost).ok();
    writeln!(prompt, "- actual_amount: {:.2}", invoice.amount).ok();
    writeln!(prompt, "- variance_pct: {:.1}", request.variance_pct).ok();

    writeln!(prompt, "\n## Historical baseline").ok();
    writeln!(prompt, "- {}", request.history).ok();
    if matches!(request.history, HistoricalSummary::Summary { .. }) {
        for record in &request.samples {
            let date = record
                .shipment_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            writeln!(prompt, "- sample: amount {:.2} ({})", record.amount, date).ok();
        }
    }

    writeln!(prompt, "\n## Detected anomalies").ok();
    for anomaly in &request.anomalies {
        writeln!(
            prompt,
            "- {} [{}]: {}",
            anomaly.kind, anomaly.severity, anomaly.description
        )
        .ok();
    }

    writeln!(
        prompt,
        "\nWeigh the service level, seasonality, fuel and market conditions, and \
         route complexity. Decide which anomaly types are justified by context \
         and which remain suspicious."
    )
    .ok();

    writeln!(
        prompt,
        "\nRespond with a single JSON object and nothing else:\n\
         {{\n\
         \x20 \"contextual_factors\": [\"...\"],\n\
         \x20 \"justified_anomalies\": [\"anomaly_type\", ...],\n\
         \x20 \"suspicious_anomalies\": [\"anomaly_type\", ...],\n\
         \x20 \"rationale\": \"2-3 sentence explanation\",\n\
         \x20 \"estimated_fair_cost\": 0.0,\n\
         \x20 \"confidence\": 0.0\n\
         }}\n\
         Anomaly types must be taken verbatim from the detected anomalies list. \
         Confidence is your belief, between 0.0 and 1.0, that the invoice is \
         legitimate as billed."
    )
    .ok();

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightguard_core::{
        AnomalyKind, AnomalyRecord, HistoricalRecord, Invoice, ServiceClass, Severity,
    };
    use std::collections::HashMap;

    fn request_with_samples(sample_count: usize) -> JudgmentRequest {
        let samples: Vec<HistoricalRecord> =
            (0..sample_count).map(|i| HistoricalRecord::new(100.0 + i as f64)).collect();
        JudgmentRequest {
            invoice: Invoice {
                id: "INV-7".to_string(),
                amount: 250.0,
                distance_km: 100.0,
                weight_kg: 500.0,
                service: ServiceClass::Express,
                shipment_date: None,
                extra: HashMap::new(),
            },
            expected_cost: 100.0,
            variance_pct: 150.0,
            history: HistoricalSummary::from_records(&samples),
            samples,
            anomalies: vec![AnomalyRecord::comparison(
                AnomalyKind::PriceDeviation,
                Severity::High,
                "amount 150.0% above expected cost",
                100.0,
                250.0,
                150.0,
            )],
        }
    }

    #[test]
    fn prompt_contains_invoice_facts_and_variance() {
        let prompt = build_judgment_prompt(&request_with_samples(2));
        assert!(prompt.contains("INV-7"));
        assert!(prompt.contains("250.00"));
        assert!(prompt.contains("variance_pct: 150.0"));
        assert!(prompt.contains("price_deviation"));
        assert!(prompt.contains("seasonality"));
    }

    #[test]
    fn prompt_marks_missing_history() {
        let mut request = request_with_samples(0);
        request.history = HistoricalSummary::None;
        let prompt = build_judgment_prompt(&request);
        assert!(prompt.contains("no historical data available"));
    }

    #[test]
    fn prompt_lists_history_samples() {
        let prompt = build_judgment_prompt(&request_with_samples(3));
        assert_eq!(prompt.matches("- sample:").count(), 3);
    }
}

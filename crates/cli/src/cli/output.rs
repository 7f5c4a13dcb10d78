use anyhow::Result;
use freightguard_core::AuditDecision;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<super::commands::FormatArg> for OutputFormat {
    fn from(value: super::commands::FormatArg) -> Self {
        match value {
            super::commands::FormatArg::Text => OutputFormat::Text,
            super::commands::FormatArg::Json => OutputFormat::Json,
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, decision: &AuditDecision) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(decision)?),
            OutputFormat::Text => Ok(render_text(decision)),
        }
    }
}

fn render_text(decision: &AuditDecision) -> String {
    let mut out = String::new();

    writeln!(out, "Invoice {}", decision.invoice_id).ok();
    writeln!(
        out,
        "Status: {} (confidence {:.2})",
        decision.status, decision.confidence_score
    )
    .ok();
    writeln!(
        out,
        "Estimated fair cost: {:.2}",
        decision.estimated_fair_cost
    )
    .ok();
    writeln!(out, "Reasoning: {}", decision.reasoning).ok();

    if !decision.anomalies.is_empty() {
        writeln!(out, "\nAnomalies:").ok();
        for anomaly in &decision.anomalies {
            writeln!(
                out,
                "  - {} [{}] {}",
                anomaly.kind, anomaly.severity, anomaly.description
            )
            .ok();
        }
    }

    if !decision.context_factors.is_empty() {
        writeln!(out, "\nContext factors:").ok();
        for factor in &decision.context_factors {
            writeln!(out, "  - {}", factor).ok();
        }
    }

    writeln!(out, "\nRecommendations:").ok();
    for rec in &decision.recommendations {
        writeln!(out, "  - {}", rec).ok();
    }

    out
}

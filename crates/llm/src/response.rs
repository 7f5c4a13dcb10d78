//! Parsing and validation of judgment responses.
//!
//! The model's output is untrusted free text; this module extracts the JSON
//! object, parses it into a typed judgment, and rejects structurally invalid
//! responses so the caller can fall back deterministically.

use freightguard_core::{AnomalyKind, Judgment};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Rationales shorter than this are not an explanation.
const MIN_RATIONALE_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid confidence value: {0} (must be between 0.0 and 1.0)")]
    InvalidConfidence(f64),
    #[error("Invalid estimated fair cost: {0} (must be non-negative and finite)")]
    InvalidFairCost(f64),
    #[error("Rationale too short ({0} chars): a non-trivial explanation is required")]
    RationaleTooShort(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawJudgment {
    #[serde(default)]
    contextual_factors: Vec<String>,
    #[serde(default, alias = "justified_anomaly_types")]
    justified_anomalies: Vec<String>,
    #[serde(default, alias = "suspicious_anomaly_types")]
    suspicious_anomalies: Vec<String>,
    #[serde(alias = "overall_assessment")]
    rationale: Option<String>,
    estimated_fair_cost: Option<f64>,
    #[serde(alias = "confidence_in_analysis")]
    confidence: Option<f64>,
}

pub fn parse_judgment_response(response: &str) -> Result<Judgment, ParseError> {
    debug!("Parsing judgment response ({} chars)", response.len());

    let json_str = extract_json_from_response(response)?;

    let raw: RawJudgment = serde_json::from_str(&json_str).map_err(|e| {
        warn!("JSON parse error: {}", e);
        ParseError::InvalidJson(format!(
            "{}: {}",
            e,
            json_str.chars().take(100).collect::<String>()
        ))
    })?;

    let confidence = raw
        .confidence
        .ok_or_else(|| ParseError::MissingField("confidence".to_string()))?;
    if !(0.0..=1.0).contains(&confidence) || !confidence.is_finite() {
        return Err(ParseError::InvalidConfidence(confidence));
    }

    let estimated_fair_cost = raw
        .estimated_fair_cost
        .ok_or_else(|| ParseError::MissingField("estimated_fair_cost".to_string()))?;
    if !estimated_fair_cost.is_finite() || estimated_fair_cost < 0.0 {
        return Err(ParseError::InvalidFairCost(estimated_fair_cost));
    }

    let rationale = raw
        .rationale
        .ok_or_else(|| ParseError::MissingField("rationale".to_string()))?;
    if rationale.trim().len() < MIN_RATIONALE_LEN {
        return Err(ParseError::RationaleTooShort(rationale.trim().len()));
    }

    Ok(Judgment {
        contextual_factors: raw.contextual_factors,
        justified_anomalies: parse_anomaly_kinds(&raw.justified_anomalies),
        suspicious_anomalies: parse_anomaly_kinds(&raw.suspicious_anomalies),
        rationale,
        estimated_fair_cost,
        confidence,
    })
}

/// Unknown anomaly names are dropped with a warning rather than failing the
/// whole response; the model occasionally invents labels.
fn parse_anomaly_kinds(names: &[String]) -> Vec<AnomalyKind> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        match name.parse::<AnomalyKind>() {
            Ok(kind) => {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            Err(()) => warn!("Ignoring unknown anomaly type in judgment: {:?}", name),
        }
    }
    kinds
}

pub fn extract_json_from_response(response: &str) -> Result<String, ParseError> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed.to_string());
    }

    if trimmed.contains("```") {
        return extract_from_markdown_block(trimmed);
    }

    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if start < end {
                return Ok(trimmed[start..=end].to_string());
            }
        }
    }

    Err(ParseError::InvalidJson(
        "No JSON object found in response".to_string(),
    ))
}

fn extract_from_markdown_block(text: &str) -> Result<String, ParseError> {
    let after_open = text
        .split_once("```")
        .map(|(_, rest)| rest)
        .ok_or_else(|| ParseError::InvalidJson("Unterminated code fence".to_string()))?;

    // Skip an optional language tag on the fence line.
    let body = after_open
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or(after_open);

    let inner = body
        .split_once("```")
        .map(|(inner, _)| inner)
        .unwrap_or(body)
        .trim();

    if inner.starts_with('{') && inner.ends_with('}') {
        Ok(inner.to_string())
    } else {
        Err(ParseError::InvalidJson(
            "Code fence does not contain a JSON object".to_string(),
        ))
    }
}

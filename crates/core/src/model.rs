use crate::error::AuditError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Service level a shipment was booked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceClass {
    #[default]
    Standard,
    Express,
    Other,
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceClass::Standard => write!(f, "standard"),
            ServiceClass::Express => write!(f, "express"),
            ServiceClass::Other => write!(f, "other"),
        }
    }
}

/// A carrier invoice under audit. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub amount: f64,
    pub distance_km: f64,
    pub weight_kg: f64,
    #[serde(default)]
    pub service: ServiceClass,
    #[serde(default)]
    pub shipment_date: Option<NaiveDate>,
    /// Open set of descriptive fields (route, carrier, cargo type, ...).
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Invoice {
    /// Checks the numeric invariants: amount, distance and weight must be
    /// finite and non-negative. Violations are fatal input errors, not
    /// anomalies.
    pub fn validate(&self) -> Result<(), AuditError> {
        for (field, value) in [
            ("amount", self.amount),
            ("distance_km", self.distance_km),
            ("weight_kg", self.weight_kg),
        ] {
            if !value.is_finite() {
                return Err(AuditError::NonFiniteField {
                    field,
                    invoice_id: self.id.clone(),
                });
            }
            if value < 0.0 {
                return Err(AuditError::NegativeField {
                    field,
                    value,
                    invoice_id: self.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Cost per kilometre. Zero distance is a fatal input error because the
    /// invoice cannot be rated without it.
    pub fn cost_per_km(&self) -> Result<f64, AuditError> {
        if self.distance_km == 0.0 {
            return Err(AuditError::ZeroDivisor {
                field: "distance_km",
                invoice_id: self.id.clone(),
            });
        }
        Ok(self.amount / self.distance_km)
    }

    /// Cost per kilogram. Zero weight is a fatal input error.
    pub fn cost_per_kg(&self) -> Result<f64, AuditError> {
        if self.weight_kg == 0.0 {
            return Err(AuditError::ZeroDivisor {
                field: "weight_kg",
                invoice_id: self.id.clone(),
            });
        }
        Ok(self.amount / self.weight_kg)
    }
}

/// A past invoice amount used as a comparison baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub amount: f64,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub shipment_date: Option<NaiveDate>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl HistoricalRecord {
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            carrier: None,
            shipment_date: None,
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighCostPerKm,
    HighCostPerKg,
    ExpressHeavyShipment,
    PriceDeviation,
    HistoricalOutlier,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::HighCostPerKm => "high_cost_per_km",
            AnomalyKind::HighCostPerKg => "high_cost_per_kg",
            AnomalyKind::ExpressHeavyShipment => "express_heavy_shipment",
            AnomalyKind::PriceDeviation => "price_deviation",
            AnomalyKind::HistoricalOutlier => "historical_outlier",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnomalyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high_cost_per_km" => Ok(AnomalyKind::HighCostPerKm),
            "high_cost_per_kg" => Ok(AnomalyKind::HighCostPerKg),
            "express_heavy_shipment" => Ok(AnomalyKind::ExpressHeavyShipment),
            "price_deviation" => Ok(AnomalyKind::PriceDeviation),
            "historical_outlier" => Ok(AnomalyKind::HistoricalOutlier),
            _ => Err(()),
        }
    }
}

/// A flagged deviation between invoice cost and expectation.
///
/// Rule anomalies come from threshold checks and carry no `actual` field.
/// Comparison anomalies come from statistical checks, carry
/// expected/actual/variance, and are scoped to exactly one invoice run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance_pct: Option<f64>,
}

impl AnomalyRecord {
    /// A rule anomaly from a deterministic threshold check.
    pub fn rule(kind: AnomalyKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            expected: None,
            actual: None,
            variance_pct: None,
        }
    }

    /// A comparison anomaly from a statistical check, tied to the current
    /// invoice amount.
    pub fn comparison(
        kind: AnomalyKind,
        severity: Severity,
        description: impl Into<String>,
        expected: f64,
        actual: f64,
        variance_pct: f64,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            expected: Some(expected),
            actual: Some(actual),
            variance_pct: Some(variance_pct),
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.actual.is_some()
    }
}

/// Qualitative assessment of a flagged invoice, produced by the external
/// judgment capability, the router short-circuit, or the deterministic
/// fallback. Mutable only by the guardrail stage, and only toward correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub contextual_factors: Vec<String>,
    pub justified_anomalies: Vec<AnomalyKind>,
    pub suspicious_anomalies: Vec<AnomalyKind>,
    pub rationale: String,
    pub estimated_fair_cost: f64,
    pub confidence: f64,
}

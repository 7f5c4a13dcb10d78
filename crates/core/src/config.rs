use genai::adapter::AdapterKind;
use std::env;
use thiserror::Error;

const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEMPERATURE: f64 = 0.3;

// Rule thresholds (heuristic business policy, overridable).
pub const DEFAULT_MAX_COST_PER_KM: f64 = 3.0;
pub const DEFAULT_MAX_COST_PER_KG: f64 = 1.5;
pub const DEFAULT_EXPRESS_HEAVY_WEIGHT_KG: f64 = 2000.0;

// Statistical detection thresholds.
pub const DEFAULT_PRICE_DEVIATION_PCT: f64 = 15.0;
pub const DEFAULT_PRICE_DEVIATION_HIGH_PCT: f64 = 25.0;
pub const DEFAULT_HISTORICAL_OUTLIER_PCT: f64 = 20.0;
pub const DEFAULT_MAX_HISTORY_SAMPLES: usize = 5;

// Decision thresholds.
pub const DEFAULT_APPROVE_CONFIDENCE: f64 = 0.85;
pub const DEFAULT_REVIEW_CONFIDENCE: f64 = 0.40;
pub const DEFAULT_SHORT_CIRCUIT_CONFIDENCE: f64 = 0.95;
pub const DEFAULT_SMALL_DELTA_PCT: f64 = 10.0;

// Express premium assumption: 30-70% over standard freight.
pub const DEFAULT_EXPRESS_PREMIUM_LOW_PCT: f64 = 30.0;
pub const DEFAULT_EXPRESS_PREMIUM_HIGH_PCT: f64 = 70.0;
pub const DEFAULT_EXPRESS_JUSTIFIED_FACTOR: f64 = 1.40;
pub const DEFAULT_SAVINGS_REQUEST_FACTOR: f64 = 1.20;
pub const DEFAULT_BREAKDOWN_REQUEST_FACTOR: f64 = 1.10;

/// Rationale phrases that contradict a high confidence score.
pub const REJECTION_PHRASES: &[&str] = &[
    "unjustified",
    "fraud",
    "billing error",
    "cannot be justified",
    "likely reflects",
    "appears to be",
    "warrants rejection",
    "should be rejected",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Deterministic rule thresholds applied by the rule validator.
#[derive(Debug, Clone)]
pub struct RulePolicy {
    pub max_cost_per_km: f64,
    pub max_cost_per_kg: f64,
    pub express_heavy_weight_kg: f64,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            max_cost_per_km: DEFAULT_MAX_COST_PER_KM,
            max_cost_per_kg: DEFAULT_MAX_COST_PER_KG,
            express_heavy_weight_kg: DEFAULT_EXPRESS_HEAVY_WEIGHT_KG,
        }
    }
}

/// Variance thresholds applied by the statistical detector.
#[derive(Debug, Clone)]
pub struct DetectionPolicy {
    pub price_deviation_pct: f64,
    pub price_deviation_high_pct: f64,
    pub historical_outlier_pct: f64,
    pub max_history_samples: usize,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            price_deviation_pct: DEFAULT_PRICE_DEVIATION_PCT,
            price_deviation_high_pct: DEFAULT_PRICE_DEVIATION_HIGH_PCT,
            historical_outlier_pct: DEFAULT_HISTORICAL_OUTLIER_PCT,
            max_history_samples: DEFAULT_MAX_HISTORY_SAMPLES,
        }
    }
}

/// Confidence buckets for the deterministic fallback judgment, keyed on
/// variance magnitude and service class.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    pub small_variance_pct: f64,
    pub small_variance_confidence: f64,
    pub express_variance_pct: f64,
    pub express_confidence: f64,
    pub moderate_variance_pct: f64,
    pub moderate_confidence: f64,
    pub large_variance_pct: f64,
    pub large_confidence: f64,
    pub extreme_confidence: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            small_variance_pct: 5.0,
            small_variance_confidence: 0.85,
            express_variance_pct: 60.0,
            express_confidence: 0.65,
            moderate_variance_pct: 30.0,
            moderate_confidence: 0.55,
            large_variance_pct: 100.0,
            large_confidence: 0.35,
            extreme_confidence: 0.15,
        }
    }
}

/// Thresholds for the confidence guardrail. Clamp rules fire first, in
/// order; nudge rules are mutually exclusive and fire after the clamps.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    /// Confidence above which a clamp rule may trigger.
    pub clamp_trigger_confidence: f64,
    pub contradiction_clamp: f64,
    pub all_suspicious_clamp: f64,
    pub extreme_variance_pct: f64,
    pub extreme_variance_clamp: f64,
    pub negligible_variance_pct: f64,
    pub negligible_trigger_confidence: f64,
    pub negligible_variance_raise: f64,
    pub small_variance_pct: f64,
    pub small_trigger_confidence: f64,
    pub small_variance_raise: f64,
    pub express_variance_pct: f64,
    pub express_trigger_confidence: f64,
    pub express_raise: f64,
    pub review_band_low_pct: f64,
    pub review_band_high_pct: f64,
    pub review_band_raise: f64,
    /// Rationales shorter than this are considered trivial and replaced.
    pub min_rationale_len: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            clamp_trigger_confidence: 0.40,
            contradiction_clamp: 0.25,
            all_suspicious_clamp: 0.30,
            extreme_variance_pct: 100.0,
            extreme_variance_clamp: 0.20,
            negligible_variance_pct: 1.0,
            negligible_trigger_confidence: 0.85,
            negligible_variance_raise: 0.90,
            small_variance_pct: 5.0,
            small_trigger_confidence: 0.70,
            small_variance_raise: 0.75,
            express_variance_pct: 60.0,
            express_trigger_confidence: 0.50,
            express_raise: 0.60,
            review_band_low_pct: 15.0,
            review_band_high_pct: 30.0,
            review_band_raise: 0.45,
            min_rationale_len: 20,
        }
    }
}

/// Confidence-to-status mapping and recommendation policy.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    pub approve_confidence: f64,
    pub review_confidence: f64,
    pub short_circuit_confidence: f64,
    /// Below this cost delta (vs fair cost) a low-confidence, zero-anomaly
    /// run is never rejected.
    pub small_delta_pct: f64,
    pub small_delta_override_confidence: f64,
    pub express_premium_low_pct: f64,
    pub express_premium_high_pct: f64,
    pub express_justified_factor: f64,
    pub savings_request_factor: f64,
    pub breakdown_request_factor: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            approve_confidence: DEFAULT_APPROVE_CONFIDENCE,
            review_confidence: DEFAULT_REVIEW_CONFIDENCE,
            short_circuit_confidence: DEFAULT_SHORT_CIRCUIT_CONFIDENCE,
            small_delta_pct: DEFAULT_SMALL_DELTA_PCT,
            small_delta_override_confidence: DEFAULT_APPROVE_CONFIDENCE,
            express_premium_low_pct: DEFAULT_EXPRESS_PREMIUM_LOW_PCT,
            express_premium_high_pct: DEFAULT_EXPRESS_PREMIUM_HIGH_PCT,
            express_justified_factor: DEFAULT_EXPRESS_JUSTIFIED_FACTOR,
            savings_request_factor: DEFAULT_SAVINGS_REQUEST_FACTOR,
            breakdown_request_factor: DEFAULT_BREAKDOWN_REQUEST_FACTOR,
        }
    }
}

/// Aggregate of every heuristic threshold the pipeline consults. All values
/// are business policy, not derived from data; they are named here so they
/// can be overridden without touching stage logic.
#[derive(Debug, Clone, Default)]
pub struct AuditPolicy {
    pub rules: RulePolicy,
    pub detection: DetectionPolicy,
    pub fallback: FallbackPolicy,
    pub guardrail: GuardrailPolicy,
    pub decision: DecisionPolicy,
}

impl AuditPolicy {
    /// Rejection-indicating phrases matched case-insensitively against a
    /// judgment rationale.
    pub fn rejection_phrases(&self) -> &'static [&'static str] {
        REJECTION_PHRASES
    }
}

/// Runtime configuration for the audit service: which judgment backend to
/// use and how long to wait for it. Defaults come from `FREIGHTGUARD_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct FreightguardConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub temperature: f64,
    pub log_level: String,
    pub policy: AuditPolicy,
}

impl Default for FreightguardConfig {
    fn default() -> Self {
        let provider = env::var("FREIGHTGUARD_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Ollama);

        let model = env::var("FREIGHTGUARD_MODEL")
            .ok()
            .unwrap_or_else(|| match provider {
                AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
                _ => "default-model".to_string(),
            });

        let request_timeout_secs = env::var("FREIGHTGUARD_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let log_level = env::var("FREIGHTGUARD_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            provider,
            model,
            request_timeout_secs,
            temperature: DEFAULT_TEMPERATURE,
            log_level,
            policy: AuditPolicy::default(),
        }
    }
}

impl FreightguardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model name cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.policy.decision.review_confidence)
            || !(0.0..=1.0).contains(&self.policy.decision.approve_confidence)
            || self.policy.decision.review_confidence >= self.policy.decision.approve_confidence
        {
            return Err(ConfigError::ValidationFailed(
                "decision thresholds must satisfy 0 <= review < approve <= 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    match s.to_lowercase().as_str() {
        "ollama" => Ok(AdapterKind::Ollama),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" => Ok(AdapterKind::Gemini),
        "grok" | "xai" => Ok(AdapterKind::Xai),
        "groq" => Ok(AdapterKind::Groq),
        other => Err(ConfigError::InvalidProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_published_thresholds() {
        let policy = AuditPolicy::default();
        assert_eq!(policy.rules.max_cost_per_km, 3.0);
        assert_eq!(policy.rules.max_cost_per_kg, 1.5);
        assert_eq!(policy.detection.price_deviation_pct, 15.0);
        assert_eq!(policy.guardrail.contradiction_clamp, 0.25);
        assert_eq!(policy.decision.approve_confidence, 0.85);
        assert_eq!(policy.fallback.extreme_confidence, 0.15);
    }

    #[test]
    fn provider_parsing() {
        assert!(matches!(parse_provider("ollama"), Ok(AdapterKind::Ollama)));
        assert!(matches!(
            parse_provider("Claude"),
            Ok(AdapterKind::Anthropic)
        ));
        assert!(parse_provider("not-a-provider").is_err());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = FreightguardConfig {
            policy: AuditPolicy::default(),
            ..FreightguardConfig::default()
        };
        config.policy.decision.review_confidence = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejection_phrases_include_known_patterns() {
        let policy = AuditPolicy::default();
        assert!(policy.rejection_phrases().contains(&"fraud"));
        assert!(policy.rejection_phrases().contains(&"billing error"));
    }
}

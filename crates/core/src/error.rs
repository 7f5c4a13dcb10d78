use thiserror::Error;

/// Fatal input errors. These abort the run immediately and are surfaced to
/// the caller with enough context (field, invoice id) to be actionable.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invoice {invoice_id}: field '{field}' is not a finite number")]
    NonFiniteField {
        field: &'static str,
        invoice_id: String,
    },

    #[error("invoice {invoice_id}: field '{field}' is negative ({value})")]
    NegativeField {
        field: &'static str,
        value: f64,
        invoice_id: String,
    },

    #[error("invoice {invoice_id}: cannot divide by zero '{field}'")]
    ZeroDivisor {
        field: &'static str,
        invoice_id: String,
    },

    #[error("invoice {invoice_id}: {baseline} baseline is zero, variance is undefined")]
    ZeroBaseline {
        baseline: &'static str,
        invoice_id: String,
    },
}

/// Failures of the external judgment capability. These are recovered locally
/// via the deterministic fallback and never surface as run failures.
#[derive(Debug, Error)]
pub enum JudgmentError {
    #[error("judgment API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("judgment request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("invalid judgment response: {message}")]
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    #[error("failed to parse judgment: {message} (context: {context})")]
    Parse { message: String, context: String },

    #[error("judgment configuration error: {message}")]
    Configuration { message: String },

    #[error("judgment error: {message}")]
    Other { message: String },
}

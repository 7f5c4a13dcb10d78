use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "freightguard", version, about = "AI-assisted freight invoice auditor")]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit a single invoice against an expected cost and historical records
    Audit(AuditArgs),
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Path to the invoice JSON file
    #[arg(long)]
    pub invoice: PathBuf,

    /// Path to a JSON array of historical records
    #[arg(long)]
    pub historical: Option<PathBuf>,

    /// Expected cost for this shipment
    #[arg(long)]
    pub expected: f64,

    /// Judgment backend (ollama, openai, claude, gemini, grok, groq)
    #[arg(long)]
    pub backend: Option<String>,

    /// Model name for the judgment backend
    #[arg(long)]
    pub model: Option<String>,

    /// Judgment request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip the LLM entirely and rely on the deterministic fallback
    #[arg(long)]
    pub offline: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Json,
}

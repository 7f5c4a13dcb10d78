use freightguard_cli::cli::commands::{AuditArgs, CliArgs, Commands};
use freightguard_cli::cli::output::{OutputFormat, OutputFormatter};
use freightguard_cli::{NAME, VERSION};
use freightguard_core::config::{parse_provider, FreightguardConfig};
use freightguard_core::{HistoricalRecord, Invoice};
use freightguard_llm::{GenAIJudgmentClient, JudgmentClient, OfflineJudgmentClient};
use freightguard_pipeline::AuditService;

use clap::Parser;
use std::env;
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);

    let exit_code = match &args.command {
        Commands::Audit(audit_args) => handle_audit(audit_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("FREIGHTGUARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let mut filter = EnvFilter::from_default_env();

    if env::var("RUST_LOG").is_err() {
        filter = filter
            .add_directive(format!("freightguard={}", level).parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

async fn handle_audit(args: &AuditArgs) -> i32 {
    let invoice: Invoice = match read_json(&args.invoice) {
        Ok(invoice) => invoice,
        Err(e) => {
            error!("Failed to load invoice from {}: {}", args.invoice.display(), e);
            return 1;
        }
    };

    let historical: Vec<HistoricalRecord> = match &args.historical {
        Some(path) => match read_json(path) {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load historical records from {}: {}", path.display(), e);
                return 1;
            }
        },
        None => Vec::new(),
    };

    let default_config = FreightguardConfig::default();
    let provider = match &args.backend {
        Some(backend) => match parse_provider(backend) {
            Ok(provider) => provider,
            Err(e) => {
                error!("Configuration error: {}", e);
                return 1;
            }
        },
        None => default_config.provider,
    };
    let config = FreightguardConfig {
        provider,
        model: args.model.clone().unwrap_or(default_config.model),
        request_timeout_secs: args.timeout.unwrap_or(default_config.request_timeout_secs),
        ..default_config
    };

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return 1;
    }

    let client: Arc<dyn JudgmentClient> = if args.offline {
        info!("Offline mode: relying on the deterministic fallback judgment");
        Arc::new(OfflineJudgmentClient)
    } else {
        Arc::new(GenAIJudgmentClient::with_config(
            config.provider,
            config.model.clone(),
            Some(Duration::from_secs(config.request_timeout_secs)),
            Some(config.temperature),
        ))
    };

    let service = AuditService::with_policy(client, config.policy.clone());
    info!(
        "Auditing invoice {} with backend {} ({})",
        invoice.id,
        service.backend_name(),
        service
            .backend_model_info()
            .unwrap_or_else(|| "default".to_string())
    );

    let decision = match service.audit(invoice, historical, args.expected).await {
        Ok(decision) => decision,
        Err(e) => {
            error!("Audit failed: {:#}", e);
            return 1;
        }
    };

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    match formatter.format(&decision) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format decision: {}", e);
            1
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> anyhow::Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

//! edgefwd entry point.
//!
//! Reads switch events as JSON lines on stdin and writes action batches as
//! JSON lines on stdout. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use edgefwd::config::DEFAULT_CONFIG_PATH;
use edgefwd::{run_bridge, Controller, EdgefwConfig, JsonLinesSink, SessionContext};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Edge firewall and learning bridge decision engine
#[derive(Parser, Debug)]
#[command(name = "edgefwd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Rule file, overrides [rules] path
    #[arg(short = 'r', long)]
    rules: Option<PathBuf>,

    /// Edge switch id (repeatable), overrides [edge] switches
    #[arg(short = 'e', long = "edge-switch")]
    edge_switches: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Validate configuration and rules, then exit
    #[arg(long)]
    check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(log_level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init(),
    }
}

fn load_config(args: &Args) -> anyhow::Result<EdgefwConfig> {
    let mut config = EdgefwConfig::load_or_default(&args.config)?;
    if let Some(ref rules) = args.rules {
        config.rules.path = rules.clone();
    }
    if !args.edge_switches.is_empty() {
        config.edge.switches = args.edge_switches.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    info!(
        config = %args.config.display(),
        rules = %config.rules.path.display(),
        edge_switches = config.edge.switches.len(),
        flood_mode = ?config.forwarding.flood_mode,
        rule_action = ?config.policy.rule_action,
        port_restriction = ?config.policy.port_restriction,
        "Configuration loaded"
    );

    if args.check {
        let rules = config
            .check_rules()
            .context("rule file failed validation")?;
        info!(rules = rules.len(), "Configuration and rules are valid");
        return Ok(());
    }

    let rules = config
        .load_rules()
        .context("rule load failed and rules.fail_open is false")?;

    let ctx = SessionContext::from_config(&config, rules);
    let sink = Arc::new(JsonLinesSink::new(tokio::io::stdout()));
    let mut controller = Controller::new(ctx, sink, config.runtime.event_queue_depth);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let bridge = run_bridge(BufReader::new(tokio::io::stdin()), &mut controller, cancel).await;
    controller.shutdown().await;
    bridge?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting edgefwd");

    match run(args).await {
        Ok(()) => {
            info!("edgefwd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "edgefwd exiting with error");
            ExitCode::FAILURE
        }
    }
}

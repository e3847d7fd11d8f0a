//! Nala chat bridge binary.

mod channel_plugins;
mod config;
mod context;
mod gateway;
mod prompt;
mod routes;
mod server;
mod status;
mod triggers;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "info,nala=debug,nala_app=debug,nala_channels=debug,nala_llm=debug,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "nala", version, about = "Nala WhatsApp chat bridge")]
struct Cli {
    /// Config file. Default: ~/.nala/config.toml
    #[arg(long, global = true, env = "NALA_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "NALA_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Json
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the bridge server (default).
    Serve,
    /// Validate config and channel credentials.
    Doctor,
    /// Print the server info report for this host.
    Status,
    /// One-shot send to a WhatsApp recipient.
    Send { recipient: String, message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    install_panic_hook();

    let config = cli.config;
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config).await,
        Command::Doctor => server::doctor(config).await,
        Command::Status => server::status(config).await,
        Command::Send { recipient, message } => {
            server::send_one_shot(config, &recipient, &message).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let base = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let fmt_layer = match format {
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    tracing::info!(
        log_format = ?format,
        rust_log = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(
            panic_location = ?panic_info.location(),
            panic_payload = panic_payload(panic_info.payload()),
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

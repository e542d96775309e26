//! Mayl CLI - entrypoint for the email delivery worker
//!
//! The worker runs the dispatch loops, the cleanup loop and the domain
//! verification orchestrator until Ctrl+C or SIGTERM.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::WorkerCommand;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MAYL_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "MAYL_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background delivery and verification loops
    Worker(WorkerCommand),
}

fn log_filter(log_level: &str) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    // RUST_LOG, when set, takes full control
    if std::env::var("RUST_LOG").is_ok() {
        return tracing_subscriber::EnvFilter::try_from_default_env()
            .context("Invalid RUST_LOG environment variable");
    }

    tracing_subscriber::EnvFilter::try_new(format!(
        "mayl={level},\
         mayl_cli={level},\
         mayl_core={level},\
         mayl_database={level},\
         mayl_email={level},\
         mayl_entities={level},\
         mayl_migrations={level},\
         sqlx=warn,\
         sea_orm=warn,\
         sea_orm_migration=warn,\
         h2=warn,\
         hyper=warn,\
         reqwest=warn,\
         rustls=warn,\
         aws_config=warn,\
         aws_smithy_runtime=warn,\
         hickory_proto=warn,\
         hickory_resolver=warn",
        level = log_level
    ))
    .context("Invalid log level")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = log_filter(&cli.log_level)?;

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    match cli.command {
        Commands::Worker(worker_cmd) => worker_cmd.execute(),
    }
}

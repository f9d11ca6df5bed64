// crates/worker/src/main.rs
//! Worker binary: point it at a dispatch server and let it churn.

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskfleet_worker::{WorkerClient, WorkerConfig};

#[derive(Debug, Parser)]
#[command(
    name = "taskfleet-worker",
    about = "Compute client for a taskfleet dispatch server",
    version
)]
struct Cli {
    /// Server host[:port]
    host: String,

    /// Worker name reported to the server (defaults to the machine hostname)
    #[arg(long)]
    name: Option<String>,

    /// Use plain http/ws instead of TLS
    #[arg(long)]
    http: bool,

    /// File recording the installed asset version
    #[arg(long, default_value = "version.txt")]
    version_file: PathBuf,

    /// Directory the asset bundle is extracted into
    #[arg(long, default_value = "task_assets")]
    assets_dir: PathBuf,

    /// Extra KEY=VALUE fields for the identify frame (repeatable)
    #[arg(long = "identify", value_name = "KEY=VALUE")]
    identify: Vec<String>,

    /// Keep existing assets when the server version matches
    #[arg(long)]
    no_update: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskfleet_worker=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let name = match cli.name {
        Some(name) => name,
        None => gethostname::gethostname().to_string_lossy().into_owned(),
    };

    let mut config = WorkerConfig::new(cli.host, name)
        .with_use_http(cli.http)
        .with_version_file(cli.version_file)
        .with_task_assets_dir(cli.assets_dir)
        .with_always_update(!cli.no_update);
    for field in &cli.identify {
        let Some((key, value)) = field.split_once('=') else {
            bail!("--identify takes KEY=VALUE, got {field:?}");
        };
        config = config.with_identify_field(key, Value::String(value.to_string()));
    }

    let client = WorkerClient::new(config);
    tokio::select! {
        _ = client.run() => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;
use common::config::Config;
use common::platform::{get_os_name, get_sessions_path};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "flowmail", version, about = "Flow Mail server", long_about = None)]
struct Args {
    /// Path to a config file (defaults to the platform config dir)
    #[arg(short, long, env = "FLOWMAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Where signed-in sessions are persisted
    #[arg(long, env = "FLOWMAIL_SESSIONS")]
    sessions: Option<PathBuf>,

    /// Keep sessions in memory only
    #[arg(long, action)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors at TRACE
                format!(
                    "{}=debug,api_server=debug,oauth=info,gmail=info,tower_http=debug,axum::rejection=trace",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.in_memory {
        config.session.storage_path = None;
    } else if let Some(path) = args.sessions.or_else(|| config.session.storage_path.clone()) {
        config.session.storage_path = Some(path);
    } else {
        config.session.storage_path = get_sessions_path();
    }

    tracing::info!("Starting Flow Mail on {}", get_os_name());
    let host = config.server.host.clone();
    let port = config.server.port;
    api_server::run_server_blocking(config, &host, port).await
}

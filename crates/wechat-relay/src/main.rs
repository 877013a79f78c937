use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wechat_relay::env::{LayeredEnv, SystemEnv};
use wechat_relay::{RelayConfig, serve, tunnel};

const DEFAULT_CONFIG_FILE: &str = "config.env";

/// WeChat official account relay for a local Ollama model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Env file with KEY=VALUE lines (default: ./config.env if present).
    /// Variables already set in the environment take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// WECHAT_TOKEN (prefer putting it in the config file)
    #[arg(long)]
    wechat_token: Option<String>,

    /// OLLAMA_URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// OLLAMA_MODEL
    #[arg(long)]
    ollama_model: Option<String>,

    /// Bind host, an IP address or a name such as localhost (RELAY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// HTTP port (RELAY_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Tunnel client command to launch, e.g. "./natapp/natapp -authtoken=..." (TUNNEL_COMMAND)
    #[arg(long)]
    tunnel: Option<String>,

    /// Do not launch the tunnel client
    #[arg(long)]
    no_tunnel: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    load_config_file(args.config.as_deref())?;

    let env = LayeredEnv::new(SystemEnv)
        .with("WECHAT_TOKEN", args.wechat_token)
        .with("OLLAMA_URL", args.ollama_url)
        .with("OLLAMA_MODEL", args.ollama_model)
        .with("RELAY_HOST", args.host)
        .with("RELAY_PORT", args.port.map(|p| p.to_string()))
        .with("TUNNEL_COMMAND", args.tunnel)
        .with("TUNNEL_DISABLED", args.no_tunnel.then_some("true"));

    let config = RelayConfig::from_env(&env).context("invalid configuration")?;

    // Held until the server stops; dropping it kills the tunnel.
    let _tunnel = match &config.tunnel {
        Some(t) => Some(
            tunnel::spawn(t).with_context(|| format!("failed to launch tunnel {:?}", t.command))?,
        ),
        None => {
            debug!("No tunnel configured");
            None
        }
    };

    info!("Starting WeChat relay");
    serve(config).await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

fn load_config_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded config file");
        }
        None => match dotenvy::from_path(DEFAULT_CONFIG_FILE) {
            Ok(()) => info!(path = DEFAULT_CONFIG_FILE, "Loaded config file"),
            Err(e) if e.not_found() => {
                debug!(path = DEFAULT_CONFIG_FILE, "No config file, using environment only");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}"));
            }
        },
    }
    Ok(())
}

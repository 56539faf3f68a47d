use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use proxilate::{Proxilate, ProxyConfig};

#[derive(Parser)]
#[command(name = "proxilate")]
#[command(about = "An access-controlled HTTP forward/reverse proxy")]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on [default: 9235]
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Require Basic Auth with this user name
    #[arg(long)]
    username: Option<String>,

    /// Require Basic Auth with this password
    #[arg(long)]
    password: Option<String>,

    /// Refuse to contact this destination host (repeatable)
    #[arg(long = "forbidden-host")]
    forbidden_hosts: Vec<String>,

    /// Forward every request to this origin (reverse-proxy mode)
    #[arg(long)]
    target: Option<Url>,

    /// Abandon destination fetches after this many milliseconds
    #[arg(long)]
    proxy_timeout_ms: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if self.username.is_some() {
            config.username = self.username;
        }
        if self.password.is_some() {
            config.password = self.password;
        }
        config.forbidden_hosts.extend(self.forbidden_hosts);
        if self.target.is_some() {
            config.target = self.target;
        }
        if let Some(millis) = self.proxy_timeout_ms {
            config.proxy_timeout = Some(Duration::from_millis(millis));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_level(true)
        .init();

    let mut config = ProxyConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    let proxy = Proxilate::new(config).context("Invalid configuration")?;
    let port = proxy.config().port;
    proxy
        .start()
        .await
        .with_context(|| format!("Failed to start Proxilate on port: {port}"))?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    proxy.stop().await;

    Ok(())
}

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use deploymentizer_cli::{Deploymentizer, Options};
use deploymentizer_core::TracingNotifier;
use deploymentizer_generate::VarRenderer;
use deploymentizer_provider::{build_provider, ProviderAdapter, ProviderOptions};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "deploymentizer",
    version,
    about = "Renders per-cluster deployment manifests from layered YAML definitions"
)]
struct Cli {
    /// Directory containing base/type/image/cluster definitions
    #[arg(long = "load-path", value_name = "DIR")]
    load_path: PathBuf,

    /// Directory to write generated manifests into
    #[arg(long = "output-path", value_name = "DIR")]
    output_path: PathBuf,

    /// Write rendered files (omit for a dry run)
    #[arg(long = "save", action = ArgAction::SetTrue)]
    save: bool,

    /// Remove existing output before generating
    #[arg(long = "clean", action = ArgAction::SetTrue)]
    clean: bool,

    /// External config provider to use: file | env-api
    #[arg(long = "config-provider", value_name = "ID")]
    config_provider: Option<String>,

    /// Base directory for the file provider
    #[arg(long = "config-path", value_name = "DIR")]
    config_path: Option<PathBuf>,

    /// Base URL of the env-api service
    #[arg(long = "api-url", env = "ENV_API_URL")]
    api_url: Option<String>,

    /// Auth token for the env-api service
    #[arg(long = "api-token", env = "ENV_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// env-api request timeout in seconds
    #[arg(long = "api-timeout", default_value_t = 15)]
    api_timeout: u64,

    /// Re-request env values when the service reports a different branch
    #[arg(long = "alt-branch", action = ArgAction::SetTrue)]
    alt_branch: bool,
}

fn init_tracing() {
    let env = std::env::var("DEPLOYMENTIZER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DEPLOYMENTIZER_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid DEPLOYMENTIZER_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let notifier = Arc::new(TracingNotifier);
    let adapter = match &cli.config_provider {
        Some(id) => {
            info!(provider = %id, "building config provider");
            let provider = build_provider(
                id,
                &ProviderOptions {
                    config_path: cli.config_path.clone(),
                    api_url: cli.api_url.clone(),
                    api_token: cli.api_token.clone(),
                    timeout: Duration::from_secs(cli.api_timeout),
                    alt_branch: cli.alt_branch,
                },
            )?;
            Some(ProviderAdapter::new(provider, notifier.clone()))
        }
        None => None,
    };

    let deploymentizer = Deploymentizer::new(
        Options {
            load_path: cli.load_path,
            output_path: cli.output_path,
            save: cli.save,
            clean: cli.clean,
        },
        adapter,
        Arc::new(VarRenderer::new()),
        notifier,
    );
    deploymentizer.process().await
}

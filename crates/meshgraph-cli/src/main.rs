use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use meshgraph_core::{ExportFormat, IdScheme, Settings};
use meshgraph_discovery::{
    DiscoveryEngine, DiscoveryOptions, PrometheusClient, PrometheusClientConfig, QueryWindow,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod worker;

use worker::PassPlan;

#[derive(Parser, Debug)]
#[command(name = "meshgraph")]
#[command(about = "MeshGraph - service dependency graphs from mesh traffic metrics", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MESHGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Prometheus base URL
    #[arg(short, long, env = "PROMETHEUS_SERVER")]
    server: Option<String>,

    /// Query at now minus this offset (e.g. 5m)
    #[arg(long, env = "MESHGRAPH_OFFSET")]
    offset: Option<String>,

    /// Rate window, and the re-run period with --repeat (e.g. 30s)
    #[arg(short, long, env = "MESHGRAPH_INTERVAL")]
    interval: Option<String>,

    /// Output document (plain, annotated, mesh, cx)
    #[arg(short, long, env = "MESHGRAPH_FORMAT")]
    format: Option<ExportFormat>,

    /// Node ids in exported documents (qualified, sequential)
    #[arg(long, env = "MESHGRAPH_ID_SCHEME")]
    id_scheme: Option<IdScheme>,

    /// Write <signal>.<format>.json files here instead of stdout
    #[arg(short, long, env = "MESHGRAPH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Root traffic signal; repeat for several
    #[arg(long = "signal", env = "MESHGRAPH_SIGNALS", value_delimiter = ',')]
    signals: Vec<String>,

    /// Keep running a pass every interval
    #[arg(long, env = "MESHGRAPH_REPEAT")]
    repeat: bool,
}

impl Cli {
    /// Flags win over file and environment settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(server) = &self.server {
            settings.prometheus.server = server.clone();
        }
        if let Some(offset) = &self.offset {
            settings.discovery.offset = offset.clone();
        }
        if let Some(interval) = &self.interval {
            settings.discovery.interval = interval.clone();
        }
        if let Some(format) = self.format {
            settings.export.format = format;
        }
        if let Some(id_scheme) = self.id_scheme {
            settings.export.id_scheme = id_scheme;
        }
        if let Some(dir) = &self.output_dir {
            settings.export.output_dir = Some(dir.clone());
        }
        if !self.signals.is_empty() {
            settings.discovery.signals = self.signals.clone();
        }
        if self.repeat {
            settings.schedule.repeat = true;
        }
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut settings);
    init_tracing(&settings.logging.level);
    settings.validate().context("invalid configuration")?;

    let client = PrometheusClient::new(PrometheusClientConfig::try_from(&settings.prometheus)?)
        .context("creating Prometheus client")?;
    let engine = Arc::new(DiscoveryEngine::new(
        Arc::new(client),
        DiscoveryOptions::from_settings(&settings)?,
    ));
    let plan = Arc::new(PassPlan::from_settings(&settings)?);

    let interval = settings.discovery.interval()?;
    let mut window = QueryWindow::anchored(Utc::now(), settings.discovery.offset()?, interval);
    info!(
        "Discovering {} signal(s) from {} as {}",
        plan.signals.len(),
        settings.prometheus.server,
        plan.format
    );

    loop {
        let failed = worker::run_passes(&engine, &plan, window).await;
        if !settings.schedule.repeat {
            if failed > 0 {
                anyhow::bail!("{} of {} discovery passes failed", failed, plan.signals.len());
            }
            return Ok(());
        }
        if failed > 0 {
            error!("{} of {} discovery passes failed, retrying next interval", failed, plan.signals.len());
        }
        tokio::time::sleep(interval).await;
        window = window.advance();
    }
}

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use meshgraph_core::{ExportFormat, Settings};
use meshgraph_discovery::{DiscoveryEngine, QueryWindow, TrafficSignal};
use meshgraph_export::{render, RenderOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What every worker in a round does besides discovery itself.
pub struct PassPlan {
    pub signals: Vec<TrafficSignal>,
    pub format: ExportFormat,
    pub render: RenderOptions,
    pub pretty: bool,
    pub output_dir: Option<PathBuf>,
    pub deadline: Duration,
    stdout: Mutex<tokio::io::Stdout>,
}

impl PassPlan {
    pub fn from_settings(settings: &Settings) -> meshgraph_core::Result<Self> {
        Ok(Self {
            signals: settings
                .discovery
                .signals
                .iter()
                .map(|s| TrafficSignal::new(s.trim()))
                .collect(),
            format: settings.export.format,
            render: RenderOptions {
                id_scheme: settings.export.id_scheme,
                region_name: settings.export.region_name.clone(),
                timestamp: 0,
            },
            pretty: settings.export.pretty,
            output_dir: settings.export.output_dir.clone(),
            deadline: settings.discovery.pass_deadline()?,
            stdout: Mutex::new(tokio::io::stdout()),
        })
    }
}

pub fn output_path(dir: &Path, signal: &TrafficSignal, format: ExportFormat) -> PathBuf {
    dir.join(format!("{}.{}.json", signal.metric(), format))
}

/// Runs one pass per signal concurrently and waits for all of them.
/// Returns how many failed.
pub async fn run_passes(
    engine: &Arc<DiscoveryEngine>,
    plan: &Arc<PassPlan>,
    window: QueryWindow,
) -> usize {
    let handles = plan.signals.iter().cloned().map(|signal| {
        let engine = Arc::clone(engine);
        let plan = Arc::clone(plan);
        tokio::spawn(async move {
            let result = run_signal(&engine, &plan, &signal, window).await;
            (signal, result)
        })
    });

    let mut failed = 0;
    for joined in join_all(handles).await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((signal, Err(e))) => {
                error!("Discovery pass for {} failed: {:#}", signal, e);
                failed += 1;
            }
            Err(e) => {
                error!("Discovery worker panicked: {}", e);
                failed += 1;
            }
        }
    }
    failed
}

/// Discovers, renders and writes the document for one signal.
pub async fn run_signal(
    engine: &DiscoveryEngine,
    plan: &PassPlan,
    signal: &TrafficSignal,
    window: QueryWindow,
) -> Result<()> {
    let pass = engine
        .discover_within(signal, window, plan.deadline)
        .await
        .with_context(|| format!("discovering {}", signal))?;
    if !pass.report.is_clean() {
        warn!(
            "{}: {} malformed samples, {} cycles, {} skipped branches",
            signal,
            pass.report.malformed_samples,
            pass.report.cycles().count(),
            pass.report.skipped_branches().count()
        );
    }

    let options = RenderOptions {
        timestamp: Utc::now().timestamp(),
        ..plan.render.clone()
    };
    let json = render(plan.format, &pass.roots, &options).to_json(plan.pretty)?;

    match &plan.output_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
            let path = output_path(dir, signal, plan.format);
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {} nodes to {}", pass.node_count(), path.display());
        }
        None => {
            let mut stdout = plan.stdout.lock().await;
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ::config as cfg;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MeshGraphError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Base URL of the metrics backend, also used to build deep links.
    #[serde(default = "PrometheusConfig::default_server")]
    pub server: String,
    /// Per-query timeout, humantime format.
    #[serde(default = "PrometheusConfig::default_query_timeout")]
    pub query_timeout: String,
}

impl PrometheusConfig {
    fn default_server() -> String {
        "http://localhost:9090".to_string()
    }

    fn default_query_timeout() -> String {
        "10s".to_string()
    }

    pub fn query_timeout(&self) -> Result<Duration> {
        parse_duration("prometheus.query_timeout", &self.query_timeout)
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            server: Self::default_server(),
            query_timeout: Self::default_query_timeout(),
        }
    }
}

/// What to do when a non-root query fails during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchFailurePolicy {
    /// Keep the node as a leaf and report the skipped branch.
    #[default]
    Skip,
    /// Abort the whole pass.
    FailPass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "DiscoveryConfig::default_signals")]
    pub signals: Vec<String>,
    #[serde(default = "DiscoveryConfig::default_offset")]
    pub offset: String,
    #[serde(default = "DiscoveryConfig::default_interval")]
    pub interval: String,
    #[serde(default = "DiscoveryConfig::default_pass_deadline")]
    pub pass_deadline: String,
    #[serde(default = "DiscoveryConfig::default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "DiscoveryConfig::default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub branch_failure: BranchFailurePolicy,
}

impl DiscoveryConfig {
    fn default_signals() -> Vec<String> {
        vec!["istio_request_count".to_string()]
    }

    fn default_offset() -> String {
        "0m".to_string()
    }

    fn default_interval() -> String {
        "30s".to_string()
    }

    fn default_pass_deadline() -> String {
        "5m".to_string()
    }

    fn default_max_concurrent_queries() -> usize {
        8
    }

    fn default_max_depth() -> usize {
        32
    }

    pub fn offset(&self) -> Result<Duration> {
        parse_duration("discovery.offset", &self.offset)
    }

    pub fn interval(&self) -> Result<Duration> {
        parse_duration("discovery.interval", &self.interval)
    }

    pub fn pass_deadline(&self) -> Result<Duration> {
        parse_duration("discovery.pass_deadline", &self.pass_deadline)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            signals: Self::default_signals(),
            offset: Self::default_offset(),
            interval: Self::default_interval(),
            pass_deadline: Self::default_pass_deadline(),
            max_concurrent_queries: Self::default_max_concurrent_queries(),
            max_depth: Self::default_max_depth(),
            branch_failure: BranchFailurePolicy::default(),
        }
    }
}

/// Exchange document produced by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Flat node/edge elements document.
    #[default]
    Plain,
    /// Plain plus per-edge error-rate colouring.
    Annotated,
    /// Nested region/mesh document with rollup volume.
    Mesh,
    /// Aspect-oriented network document with integer ids.
    Cx,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportFormat::Plain => "plain",
            ExportFormat::Annotated => "annotated",
            ExportFormat::Mesh => "mesh",
            ExportFormat::Cx => "cx",
        };
        f.write_str(s)
    }
}

impl FromStr for ExportFormat {
    type Err = MeshGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "cytoscape" => Ok(ExportFormat::Plain),
            "annotated" => Ok(ExportFormat::Annotated),
            "mesh" | "vizceral" => Ok(ExportFormat::Mesh),
            "cx" => Ok(ExportFormat::Cx),
            other => Err(MeshGraphError::Config(format!(
                "unknown export format: {}",
                other
            ))),
        }
    }
}

/// How node identifiers are written into exported documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// `"<name> (<version>)"`
    #[default]
    Qualified,
    /// `"n0"`, `"n1"`, ... in pre-order.
    Sequential,
}

impl FromStr for IdScheme {
    type Err = MeshGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "qualified" => Ok(IdScheme::Qualified),
            "sequential" => Ok(IdScheme::Sequential),
            other => Err(MeshGraphError::Config(format!("unknown id scheme: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub id_scheme: IdScheme,
    #[serde(default = "ExportConfig::default_region_name")]
    pub region_name: String,
    /// Write `<signal>.<format>.json` here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "ExportConfig::default_pretty")]
    pub pretty: bool,
}

impl ExportConfig {
    fn default_region_name() -> String {
        "istio-mesh".to_string()
    }

    fn default_pretty() -> bool {
        true
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            id_scheme: IdScheme::default(),
            region_name: Self::default_region_name(),
            output_dir: None,
            pretty: Self::default_pretty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    /// Re-run discovery every `discovery.interval` instead of exiting.
    #[serde(default)]
    pub repeat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "MESHGRAPH";

    /// Defaults, then `path` (if given), then `MESHGRAPH__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = cfg::Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration from {:?}", path);
            builder = builder.add_source(cfg::File::from(path).required(true));
        }
        builder = builder.add_source(
            cfg::Environment::with_prefix(Self::ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("discovery.signals")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| MeshGraphError::Config(format!("building configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| MeshGraphError::Config(format!("deserializing configuration: {}", e)))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure(
            !self.prometheus.server.trim().is_empty(),
            "prometheus.server cannot be empty",
        )?;
        ensure(
            !self.discovery.signals.is_empty(),
            "discovery.signals must name at least one signal",
        )?;
        ensure(
            self.discovery.signals.iter().all(|s| !s.trim().is_empty()),
            "discovery.signals cannot contain empty names",
        )?;
        ensure(
            self.discovery.max_concurrent_queries > 0,
            "discovery.max_concurrent_queries must be > 0",
        )?;
        ensure(self.discovery.max_depth > 0, "discovery.max_depth must be > 0")?;

        self.prometheus.query_timeout()?;
        self.discovery.offset()?;
        self.discovery.pass_deadline()?;
        ensure(
            !self.discovery.interval()?.is_zero(),
            "discovery.interval must be > 0",
        )?;
        Ok(())
    }
}

fn ensure(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(MeshGraphError::Config(msg.to_string()))
    }
}

/// Parses humantime strings such as `30s`, `5m`, `1h 30m` or `1d`.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| MeshGraphError::Config(format!("{}: invalid duration {:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.discovery.signals, vec!["istio_request_count"]);
        assert_eq!(settings.discovery.interval().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.discovery.offset().unwrap(), Duration::ZERO);
        assert_eq!(settings.export.format, ExportFormat::Plain);
        assert_eq!(settings.discovery.branch_failure, BranchFailurePolicy::Skip);
    }

    #[test]
    fn day_offsets_parse() {
        assert_eq!(
            parse_duration("k", "1d").unwrap(),
            Duration::from_secs(24 * 60 * 60)
        );
        assert!(parse_duration("k", "soon").is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.prometheus.server = "  ".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.discovery.interval = "0s".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.discovery.max_concurrent_queries = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.discovery.signals.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn format_names_round_trip_through_display() {
        for format in [
            ExportFormat::Plain,
            ExportFormat::Annotated,
            ExportFormat::Mesh,
            ExportFormat::Cx,
        ] {
            assert_eq!(format.to_string().parse::<ExportFormat>().unwrap(), format);
        }
        assert_eq!("vizceral".parse::<ExportFormat>().unwrap(), ExportFormat::Mesh);
        assert!("graphml".parse::<ExportFormat>().is_err());
    }
}

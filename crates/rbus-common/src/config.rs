//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Shared primitives and utilities for the node runtime."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMicroSeconds, DurationMilliSeconds};
use tracing::debug;

use crate::identity::{NodeId, Role};
use crate::logging::{LogFormat, LogStream};

fn default_node_id() -> NodeId {
    NodeId::A
}

fn default_initial_role() -> Role {
    Role::Active
}

fn default_bus_baud() -> u32 {
    9600
}

fn default_settle() -> Duration {
    Duration::from_micros(1000)
}

fn default_outbound_queue() -> usize {
    8
}

fn default_host_baud() -> u32 {
    115_200
}

fn default_cycle_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_request_every() -> u32 {
    2
}

fn default_reply_timeout() -> Duration {
    Duration::from_millis(50)
}

fn default_stale_threshold() -> Duration {
    Duration::from_millis(500)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_simulation_seed() -> u64 {
    0xB05_u64
}

fn default_noise_sigma() -> f64 {
    8.0
}

/// Configuration of a single bus node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_id")]
    pub id: NodeId,
    /// Role taken out of reset. Must differ between the two nodes of a pair.
    #[serde(default = "default_initial_role")]
    pub initial_role: Role,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Metadata describing where a [`NodeConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedNodeConfig {
    pub config: NodeConfig,
    pub source: PathBuf,
}

impl NodeConfig {
    pub const ENV_CONFIG_PATH: &str = "RBUS_CONFIG";

    /// Default configuration for `id`, using that node's default role.
    pub fn for_node(id: NodeId) -> Self {
        Self {
            id,
            initial_role: id.default_role(),
            ..Self::default()
        }
    }

    /// Load configuration from disk, respecting the `RBUS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedNodeConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedNodeConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedNodeConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<NodeConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        self.host.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            initial_role: default_initial_role(),
            bus: BusConfig::default(),
            host: HostConfig::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl std::str::FromStr for NodeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: NodeConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Both nodes of a deployment, used where the whole pair is known up front.
#[derive(Debug, Clone)]
pub struct PairConfig {
    pub a: NodeConfig,
    pub b: NodeConfig,
}

impl PairConfig {
    pub fn new(a: NodeConfig, b: NodeConfig) -> Self {
        Self { a, b }
    }

    /// Check the deployment precondition: distinct identities and distinct
    /// initial roles. The protocol cannot recover from both nodes (or
    /// neither) starting out active.
    pub fn validate(&self) -> Result<()> {
        self.a.validate()?;
        self.b.validate()?;
        if self.a.id == self.b.id {
            return Err(anyhow!("both nodes are configured as node {}", self.a.id));
        }
        if self.a.initial_role == self.b.initial_role {
            return Err(anyhow!(
                "nodes {} and {} share initial role {}; exactly one must start active",
                self.a.id,
                self.b.id,
                self.a.initial_role
            ));
        }
        Ok(())
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            a: NodeConfig::for_node(NodeId::A),
            b: NodeConfig::for_node(NodeId::B),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Serial device of the RS485 adapter (only used by the daemon).
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_bus_baud")]
    pub baud: u32,
    /// Settle time after flipping the transceiver direction.
    #[serde(rename = "settle_us", default = "default_settle")]
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    pub settle: Duration,
    /// Capacity of the queue of frames waiting for a free bus.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 {
            return Err(anyhow!("bus baud rate must be non-zero"));
        }
        if self.outbound_queue == 0 {
            return Err(anyhow!("bus outbound_queue must hold at least one frame"));
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_bus_baud(),
            settle: default_settle(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Serial device of the host link; `None` means stdin/stdout.
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_host_baud")]
    pub baud: u32,
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 {
            return Err(anyhow!("host baud rate must be non-zero"));
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_host_baud(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Period of the active node's telemetry cycle (20 Hz by default).
    #[serde(rename = "cycle_interval_ms", default = "default_cycle_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cycle_interval: Duration,
    /// A peer data request is issued every `request_every` cycles.
    #[serde(default = "default_request_every")]
    pub request_every: u32,
    /// Bounded wait for the peer's reply to a data request.
    #[serde(rename = "reply_timeout_ms", default = "default_reply_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub reply_timeout: Duration,
    /// Peer data older than this is reported as zeros.
    #[serde(rename = "stale_threshold_ms", default = "default_stale_threshold")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub stale_threshold: Duration,
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_every == 0 {
            return Err(anyhow!("telemetry request_every must be at least 1"));
        }
        if self.cycle_interval.is_zero()
            || self.reply_timeout.is_zero()
            || self.stale_threshold.is_zero()
        {
            return Err(anyhow!("telemetry intervals must be non-zero"));
        }
        if self.stale_threshold <= self.cycle_interval {
            return Err(anyhow!(
                "telemetry stale_threshold ({:?}) must exceed cycle_interval ({:?})",
                self.stale_threshold,
                self.cycle_interval
            ));
        }
        Ok(())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            cycle_interval: default_cycle_interval(),
            request_every: default_request_every(),
            reply_timeout: default_reply_timeout(),
            stale_threshold: default_stale_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Console stream for log output. The daemon uses stdout as its host
    /// link when no host port is configured, so logs go to stderr there.
    #[serde(default)]
    pub stream: LogStream,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            stream: LogStream::default(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_simulation_seed")]
    pub seed: u64,
    /// Standard deviation of the synthetic sensor noise, in ADC counts.
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_simulation_seed(),
            noise_sigma: default_noise_sigma(),
        }
    }
}

//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "binary"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Binary entrypoint for the R-BUS node daemon."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
mod serial;
mod simulate;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use prometheus::{Encoder, Registry, TextEncoder};
use rbus_common::{init_tracing, LogStream, NodeConfig, NodeId, PairConfig, Role};
use rbus_logging::{log_link_event, LinkEventOutcome, LogContext};
use rbus_node::{Clock, LinkMetrics, Node, NodeIo, SystemClock, ThreadDelay};
use rbus_sim::{default_reading, SimSensors};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::serial::LoggedLeds;
use crate::simulate::ScheduledCommand;

const POLL_PERIOD: Duration = Duration::from_millis(5);

#[derive(Debug, Parser)]
#[command(author, version, about = "R-BUS node daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the node identity")]
    node: Option<CliNode>,

    #[arg(long, value_enum, help = "Override the initial role")]
    role: Option<CliRole>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNode {
    A,
    B,
}

impl From<CliNode> for NodeId {
    fn from(value: CliNode) -> Self {
        match value {
            CliNode::A => NodeId::A,
            CliNode::B => NodeId::B,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRole {
    Active,
    Passive,
}

impl From<CliRole> for Role {
    fn from(value: CliRole) -> Self {
        match value {
            CliRole::Active => Role::Active,
            CliRole::Passive => Role::Passive,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Drive one node over the RS485 adapter; host link on host.port or stdin/stdout")]
    Run {
        #[arg(long, value_name = "DEVICE", help = "Bus serial device (overrides bus.port)")]
        port: Option<String>,
    },
    #[command(about = "Simulate both nodes on an in-process bus")]
    Simulate {
        #[arg(long, default_value_t = 2000, help = "Simulated run time in milliseconds")]
        duration_ms: u64,

        #[arg(
            long = "send",
            value_name = "MS:NODE:LINE",
            help = "Host line to type into a node at a simulated instant (repeatable)"
        )]
        send: Vec<ScheduledCommand>,

        #[arg(long, help = "Pace the simulation at wall-clock speed")]
        realtime: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/node.toml"));

    let loaded = NodeConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(node) = cli.node {
        config.id = node.into();
    }
    if let Some(role) = cli.role {
        config.initial_role = role.into();
    }

    match cli.command.unwrap_or(Commands::Run { port: None }) {
        Commands::Run { port } => {
            // stdout may be the host link.
            config.logging.stream = LogStream::Stderr;
            init_tracing("rbusd", &config.logging)?;
            info!(config_path = %loaded.source.display(), node = %config.id, role = %config.initial_role, "configuration loaded");
            run_node(config, port).await
        }
        Commands::Simulate {
            duration_ms,
            send,
            realtime,
        } => {
            config.logging.stream = LogStream::Stderr;
            init_tracing("rbusd", &config.logging)?;
            let pair_config = pair_from(&config);
            let pair = simulate::run(&pair_config, duration_ms, send, realtime).await?;
            for node in [NodeId::A, NodeId::B] {
                let counters = pair.node(node).metrics().counters();
                info!(
                    node = %node,
                    role = %pair.node(node).role(),
                    frames_sent = counters.frames_sent,
                    frames_received = counters.frames_received,
                    reply_timeouts = counters.reply_timeouts,
                    late_replies = counters.late_replies,
                    role_conflicts = counters.role_conflicts,
                    "simulation finished"
                );
            }
            if config.metrics.enabled {
                dump_metrics(pair.registry())?;
            }
            Ok(())
        }
    }
}

/// Derive both node configs from one loaded file: shared timing and
/// simulation settings, each node in its default role.
fn pair_from(config: &NodeConfig) -> PairConfig {
    let mut pair = PairConfig::default();
    for node in [&mut pair.a, &mut pair.b] {
        node.bus = config.bus.clone();
        node.telemetry = config.telemetry.clone();
        node.simulation = config.simulation.clone();
    }
    pair
}

async fn run_node(config: NodeConfig, port: Option<String>) -> Result<()> {
    let registry = Registry::new();
    let metrics = LinkMetrics::new(config.id)?;
    metrics.register(&registry)?;

    let ctx = LogContext::new()
        .with_node(config.id.as_str())
        .with_role(config.initial_role.as_str());
    let (bus, direction) = match serial::open_bus(&config.bus, port.as_deref()) {
        Ok(opened) => opened,
        Err(err) => {
            log_link_event(
                Some(&ctx),
                "bus.open",
                &format!("{err:#}"),
                LinkEventOutcome::Fault,
            );
            return Err(err);
        }
    };
    log_link_event(Some(&ctx), "bus.open", "bus port opened", LinkEventOutcome::Success);

    let host = serial::open_host(&config.host)?;
    let (sensors, _) = SimSensors::noisy(
        default_reading(config.id),
        config.simulation.seed,
        config.simulation.noise_sigma,
    )?;
    let io = NodeIo {
        bus,
        direction,
        host,
        sensors,
        leds: LoggedLeds,
    };
    let mut node = Node::new(&config, io, metrics)?;

    let clock = SystemClock::start();
    let mut delay = ThreadDelay;
    let mut ticker = interval(POLL_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => node.poll(clock.now_ms(), &mut delay),
        }
    }

    let ctx = ctx.with_role(node.role().as_str()).with_tick(node.tick());
    log_link_event(Some(&ctx), "node.stop", "shutdown requested", LinkEventOutcome::Success);
    if config.metrics.enabled {
        dump_metrics(&registry)?;
    }
    Ok(())
}

fn dump_metrics(registry: &Registry) -> Result<()> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    eprint!("{}", String::from_utf8_lossy(&buffer));
    Ok(())
}

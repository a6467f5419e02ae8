//! ---
//! rbus_section: "06-simulation"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Simulated bus medium and node peripherals."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Two nodes on one simulated bus, stepped in lockstep.

use anyhow::{Context, Result};
use prometheus::Registry;
use rbus_common::{NodeConfig, NodeId, PairConfig};
use rbus_node::{Clock, LinkMetrics, Node, NodeIo};
use rbus_proto::SensorReading;
use tracing::info;

use crate::bus::{SimBus, SimBusPort, SimDirection};
use crate::peripherals::{
    HostHandle, LedHandle, SensorHandle, SimClock, SimDelay, SimHostPort, SimLeds, SimSensors,
};

/// A node wired to simulated peripherals.
pub type SimNode = Node<SimBusPort, SimDirection, SimHostPort, SimSensors, SimLeds>;

/// Default poll period of the harness, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 5;

/// Readings used when none are given: A around 2.5 V / 1.0 V / 0.5 V,
/// B matching the reference exchange `SENS:1500,2000,2500`.
pub fn default_reading(node: NodeId) -> SensorReading {
    match node {
        NodeId::A => SensorReading::new(3102, 1241, 620),
        NodeId::B => SensorReading::new(1500, 2000, 2500),
    }
}

/// Test-side handles for one node.
#[derive(Debug, Clone)]
pub struct NodeHandles {
    pub host: HostHandle,
    pub leds: LedHandle,
    pub sensors: SensorHandle,
}

/// Two nodes sharing a [`SimBus`] and a [`SimClock`].
pub struct SimulatedPair {
    clock: SimClock,
    bus: SimBus,
    registry: Registry,
    delay: SimDelay,
    nodes: [SimNode; 2],
    handles: [NodeHandles; 2],
}

impl SimulatedPair {
    /// Build a pair with noisy sensors seeded from each node's simulation
    /// settings.
    pub fn new(pair: &PairConfig) -> Result<Self> {
        Self::build(pair, |config| {
            let sim = &config.simulation;
            let seed = sim.seed.wrapping_add(index(config.id) as u64);
            SimSensors::noisy(default_reading(config.id), seed, sim.noise_sigma)
                .with_context(|| format!("sensor model for node {}", config.id))
        })
    }

    /// Build a pair whose sensors report exactly the given readings.
    pub fn with_readings(pair: &PairConfig, a: SensorReading, b: SensorReading) -> Result<Self> {
        Self::build(pair, |config| {
            Ok(SimSensors::fixed(match config.id {
                NodeId::A => a,
                NodeId::B => b,
            }))
        })
    }

    fn build<F>(pair: &PairConfig, mut sensors_for: F) -> Result<Self>
    where
        F: FnMut(&NodeConfig) -> Result<(SimSensors, SensorHandle)>,
    {
        pair.validate()?;
        let bus = SimBus::new();
        let registry = Registry::new();
        let mut make = |config: &NodeConfig| -> Result<(SimNode, NodeHandles)> {
            let (port, direction) = bus.attach(config.id);
            let (host, host_handle) = SimHostPort::new();
            let (leds, led_handle) = SimLeds::new();
            let (sensors, sensor_handle) = sensors_for(config)?;
            let metrics = LinkMetrics::new(config.id)?;
            metrics.register(&registry)?;
            let io = NodeIo {
                bus: port,
                direction,
                host,
                sensors,
                leds,
            };
            let node = Node::new(config, io, metrics)
                .with_context(|| format!("starting simulated node {}", config.id))?;
            Ok((
                node,
                NodeHandles {
                    host: host_handle,
                    leds: led_handle,
                    sensors: sensor_handle,
                },
            ))
        };
        let (node_a, handles_a) = make(&pair.a)?;
        let (node_b, handles_b) = make(&pair.b)?;
        info!(
            a_role = %pair.a.initial_role,
            b_role = %pair.b.initial_role,
            "simulated pair ready"
        );
        Ok(Self {
            clock: SimClock::new(),
            bus,
            registry,
            delay: SimDelay::default(),
            nodes: [node_a, node_b],
            handles: [handles_a, handles_b],
        })
    }

    /// Poll both nodes at the current instant, then advance the clock by
    /// [`POLL_INTERVAL_MS`].
    pub fn step(&mut self) {
        let now = self.clock.now_ms();
        for node in self.nodes.iter_mut() {
            node.poll(now, &mut self.delay);
        }
        self.clock.advance(POLL_INTERVAL_MS);
    }

    /// Step until `millis` of simulated time have passed.
    pub fn run_for(&mut self, millis: u64) {
        let until = self.clock.now_ms().saturating_add(millis);
        while self.clock.now_ms() < until {
            self.step();
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn node(&self, id: NodeId) -> &SimNode {
        &self.nodes[index(id)]
    }

    pub fn handles(&self, id: NodeId) -> &NodeHandles {
        &self.handles[index(id)]
    }

    pub fn host(&self, id: NodeId) -> &HostHandle {
        &self.handles(id).host
    }

    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Settle waits requested so far across both nodes.
    pub fn delay(&self) -> SimDelay {
        self.delay
    }
}

fn index(id: NodeId) -> usize {
    match id {
        NodeId::A => 0,
        NodeId::B => 1,
    }
}

//! ---
//! rbus_section: "06-simulation"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Simulated bus medium and node peripherals."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use rbus_node::{Actuators, Clock, Delay, LinkError, LinkResult, SensorSource, SerialLink};
use rbus_proto::{HostLine, HostReport, Led, SensorReading};

const ADC_MAX: f64 = 4095.0;

/// Manually advanced device clock shared by both simulated nodes.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Settle delay that only records how long the node asked to wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimDelay {
    pub total: Duration,
    pub calls: u64,
}

impl Delay for SimDelay {
    fn delay(&mut self, duration: Duration) {
        self.total += duration;
        self.calls += 1;
    }
}

/// Test-side handle to the values a [`SimSensors`] reports.
#[derive(Debug, Clone, Default)]
pub struct SensorHandle(Arc<Mutex<SensorReading>>);

impl SensorHandle {
    pub fn set(&self, reading: SensorReading) {
        *self.0.lock() = reading;
    }

    pub fn get(&self) -> SensorReading {
        *self.0.lock()
    }
}

/// Analog inputs: a base reading plus optional Gaussian noise in ADC counts.
#[derive(Debug)]
pub struct SimSensors {
    base: SensorHandle,
    noise: Option<(StdRng, Normal<f64>)>,
}

impl SimSensors {
    pub fn fixed(reading: SensorReading) -> (Self, SensorHandle) {
        let base = SensorHandle::default();
        base.set(reading);
        (
            Self {
                base: base.clone(),
                noise: None,
            },
            base,
        )
    }

    pub fn noisy(reading: SensorReading, seed: u64, sigma: f64) -> Result<(Self, SensorHandle)> {
        let normal = Normal::new(0.0, sigma)
            .map_err(|err| anyhow!("invalid sensor noise sigma {sigma}: {err}"))?;
        let (mut sensors, handle) = Self::fixed(reading);
        sensors.noise = Some((StdRng::seed_from_u64(seed), normal));
        Ok((sensors, handle))
    }

    fn jitter(&mut self, value: Option<u16>) -> Option<u16> {
        let value = value?;
        let Some((rng, normal)) = self.noise.as_mut() else {
            return Some(value);
        };
        let noisy = (f64::from(value) + normal.sample(rng)).round().clamp(0.0, ADC_MAX);
        Some(noisy as u16)
    }
}

impl SensorSource for SimSensors {
    fn sample(&mut self) -> SensorReading {
        let base = self.base.get();
        SensorReading {
            pot: self.jitter(base.pot),
            ldr: self.jitter(base.ldr),
            enc: self.jitter(base.enc),
        }
    }
}

#[derive(Debug, Default)]
struct LedBank {
    state: BTreeMap<Led, bool>,
    history: Vec<(Led, bool)>,
    faulty: BTreeSet<Led>,
}

/// Test-side view of a [`SimLeds`] bank.
#[derive(Debug, Clone, Default)]
pub struct LedHandle(Arc<Mutex<LedBank>>);

impl LedHandle {
    pub fn is_on(&self, led: Led) -> bool {
        self.0.lock().state.get(&led).copied().unwrap_or(false)
    }

    /// Every actuation in order.
    pub fn history(&self) -> Vec<(Led, bool)> {
        self.0.lock().history.clone()
    }

    /// Make the driver for `led` fail every write until cleared.
    pub fn set_faulty(&self, led: Led, faulty: bool) {
        let mut bank = self.0.lock();
        if faulty {
            bank.faulty.insert(led);
        } else {
            bank.faulty.remove(&led);
        }
    }
}

/// Indicator LEDs.
#[derive(Debug)]
pub struct SimLeds(LedHandle);

impl SimLeds {
    pub fn new() -> (Self, LedHandle) {
        let handle = LedHandle::default();
        (Self(handle.clone()), handle)
    }
}

impl Actuators for SimLeds {
    fn set_led(&mut self, led: Led, on: bool) -> LinkResult<()> {
        let mut bank = self.0 .0.lock();
        if bank.faulty.contains(&led) {
            return Err(LinkError::Actuator {
                led,
                reason: "driver not responding".into(),
            });
        }
        bank.state.insert(led, on);
        bank.history.push((led, on));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HostPipe {
    to_node: VecDeque<u8>,
    from_node: Vec<u8>,
}

/// Host side of a simulated serial link.
#[derive(Debug, Clone, Default)]
pub struct HostHandle(Arc<Mutex<HostPipe>>);

impl HostHandle {
    /// Type a line on the host.
    pub fn send(&self, line: &str) {
        let mut pipe = self.0.lock();
        pipe.to_node.extend(line.as_bytes().iter().copied());
        pipe.to_node.push_back(b'\n');
    }

    /// Complete lines the node has written since the last call.
    pub fn take_lines(&self) -> Vec<String> {
        let mut pipe = self.0.lock();
        let Some(end) = pipe.from_node.iter().rposition(|byte| *byte == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = pipe.from_node.drain(..=end).collect();
        String::from_utf8_lossy(&complete)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    pub fn take_classified(&self) -> Vec<HostLine> {
        self.take_lines()
            .iter()
            .map(|line| HostLine::classify(line))
            .collect()
    }

    pub fn take_reports(&self) -> Vec<HostReport> {
        self.take_classified()
            .into_iter()
            .filter_map(|line| match line {
                HostLine::Report(report) => Some(report),
                _ => None,
            })
            .collect()
    }
}

/// Node side of a simulated host link.
#[derive(Debug)]
pub struct SimHostPort(HostHandle);

impl SimHostPort {
    pub fn new() -> (Self, HostHandle) {
        let handle = HostHandle::default();
        (Self(handle.clone()), handle)
    }
}

impl SerialLink for SimHostPort {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.0 .0.lock().from_node.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> LinkResult<()> {
        Ok(())
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        let mut pipe = self.0 .0.lock();
        let count = pipe.to_node.len();
        buf.extend(pipe.to_node.drain(..));
        Ok(count)
    }
}

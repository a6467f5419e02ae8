//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Telemetry exchange: cycle scheduling, snapshots and the single
//! outstanding data request.

use std::time::Duration;

use rbus_common::time::{age_millis, duration_to_millis};
use rbus_common::{NodeId, Role, TelemetryConfig};
use rbus_proto::{HostReport, SensorReading, SensorVolts};

/// Sensor values captured at one instant of the owning node's clock.
/// Replaced wholesale, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSnapshot {
    reading: SensorReading,
    captured_at: u64,
}

impl SensorSnapshot {
    pub fn new(reading: SensorReading, captured_at: u64) -> Self {
        Self {
            reading,
            captured_at,
        }
    }

    pub fn reading(&self) -> SensorReading {
        self.reading
    }

    pub fn captured_at(&self) -> u64 {
        self.captured_at
    }

    pub fn age(&self, now: u64) -> u64 {
        age_millis(self.captured_at, now)
    }

    /// Fresh while strictly younger than `threshold_ms`.
    pub fn is_fresh(&self, now: u64, threshold_ms: u64) -> bool {
        self.age(now) < threshold_ms
    }
}

/// The one data request that may be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub sent_at: u64,
    pub deadline: u64,
}

impl PendingRequest {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.deadline
    }
}

/// What a telemetry cycle asks the node to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub report: HostReport,
    /// Send `GET_SENSORS` to the peer this cycle.
    pub request_peer: bool,
}

/// How a `SENS:` reply was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Matched the pending request; the peer snapshot was replaced.
    Accepted,
    /// Answered a request that had already timed out; the reply was
    /// dropped and the snapshot left alone.
    Late,
    /// No request was pending; the reply was dropped.
    Unsolicited,
}

#[derive(Debug, Clone, Copy)]
struct Schedule {
    cycle_ms: u64,
    request_every: u64,
    reply_timeout_ms: u64,
    stale_ms: u64,
}

impl From<&TelemetryConfig> for Schedule {
    fn from(config: &TelemetryConfig) -> Self {
        let millis = |duration: Duration| duration_to_millis(duration).max(1);
        Self {
            cycle_ms: millis(config.cycle_interval),
            request_every: u64::from(config.request_every.max(1)),
            reply_timeout_ms: millis(config.reply_timeout),
            stale_ms: millis(config.stale_threshold),
        }
    }
}

/// Telemetry state owned by the control loop.
#[derive(Debug, Clone)]
pub struct TelemetryExchange {
    schedule: Schedule,
    cycles: u64,
    next_cycle_at: Option<u64>,
    local: Option<SensorSnapshot>,
    peer: Option<SensorSnapshot>,
    pending: Option<PendingRequest>,
    /// Last request that timed out, until the next one is sent.
    expired: Option<PendingRequest>,
}

impl TelemetryExchange {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            schedule: Schedule::from(config),
            cycles: 0,
            next_cycle_at: None,
            local: None,
            peer: None,
            pending: None,
            expired: None,
        }
    }

    /// Start cycling; the first cycle is due immediately.
    pub fn activate(&mut self, now: u64) {
        self.cycles = 0;
        self.next_cycle_at = Some(now);
    }

    /// Stop cycling. A request already in flight keeps its deadline so the
    /// bus stays quiet until the peer's answer window has passed.
    pub fn deactivate(&mut self) {
        self.next_cycle_at = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.next_cycle_at.is_some()
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.next_cycle_at.is_some_and(|at| now >= at)
    }

    /// Run one cycle with a fresh local reading.
    pub fn run_cycle(
        &mut self,
        now: u64,
        reading: SensorReading,
        device: NodeId,
        role: Role,
    ) -> CycleOutput {
        self.advance_schedule(now);
        let local = SensorSnapshot::new(reading, now);
        self.local = Some(local);
        self.cycles += 1;

        let report = HostReport {
            device,
            role,
            timestamp: now,
            local: local.reading().volts(),
            remote: self.remote_volts(now),
        };
        let request_peer = self.pending.is_none() && self.cycles % self.schedule.request_every == 0;
        CycleOutput {
            report,
            request_peer,
        }
    }

    fn advance_schedule(&mut self, now: u64) {
        let cycle = self.schedule.cycle_ms;
        let next = match self.next_cycle_at {
            Some(at) if now < at.saturating_add(cycle) => at.saturating_add(cycle),
            // Fell behind by more than a cycle: realign instead of bursting.
            _ => now.saturating_add(cycle),
        };
        self.next_cycle_at = Some(next);
    }

    /// Record that `GET_SENSORS` left the node.
    pub fn request_sent(&mut self, now: u64) -> PendingRequest {
        let pending = PendingRequest {
            sent_at: now,
            deadline: now.saturating_add(self.schedule.reply_timeout_ms),
        };
        self.pending = Some(pending);
        self.expired = None;
        pending
    }

    /// Clear the pending request once its deadline has passed. The peer
    /// snapshot is left untouched. Returns the expired request.
    pub fn expire(&mut self, now: u64) -> Option<PendingRequest> {
        match self.pending {
            Some(pending) if pending.is_expired(now) => {
                self.pending = None;
                self.expired = Some(pending);
                Some(pending)
            }
            _ => None,
        }
    }

    /// Handle a `SENS:` reply, stamping it with the local clock. A reply
    /// to a request that already expired is late; only one is expected.
    pub fn accept_reply(&mut self, now: u64, reading: SensorReading) -> ReplyOutcome {
        if self.pending.take().is_some() {
            self.peer = Some(SensorSnapshot::new(reading, now));
            return ReplyOutcome::Accepted;
        }
        match self.expired.take() {
            Some(_) => ReplyOutcome::Late,
            None => ReplyOutcome::Unsolicited,
        }
    }

    /// Peer values for a host report: zeros once the snapshot is stale.
    pub fn remote_volts(&self, now: u64) -> SensorVolts {
        match self.peer {
            Some(snapshot) if snapshot.is_fresh(now, self.schedule.stale_ms) => {
                snapshot.reading().volts()
            }
            _ => SensorVolts::ZERO,
        }
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending
    }

    pub fn local(&self) -> Option<SensorSnapshot> {
        self.local
    }

    pub fn peer(&self) -> Option<SensorSnapshot> {
        self.peer
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

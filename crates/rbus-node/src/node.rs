//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! The node control loop.
//!
//! One call to [`Node::poll`] is one cooperative step: service the host
//! link, service the bus, expire an overdue data request, flush queued bus
//! frames and, while ACTIVE, run a telemetry cycle when one is due. Each
//! step finishes processing a frame before the next one starts, so the role
//! and both snapshots have a single writer.

use std::collections::VecDeque;

use rbus_common::{NodeConfig, NodeId, Role};
use rbus_logging::{bus_debug, bus_info, bus_warn, LogContext};
use rbus_proto::host::encode_ack;
use rbus_proto::{
    BusFrame, CodecError, FrameLineBuffer, HostCommand, LedCommand, LineEvent, RoleDirective,
};

use crate::arbiter::{RoleArbiter, RoleTransition};
use crate::hal::{
    Actuators, Delay, DirectionControl, LinkError, LinkResult, SensorSource, SerialLink,
};
use crate::metrics::LinkMetrics;
use crate::router::{CommandRouter, Route};
use crate::telemetry::{PendingRequest, ReplyOutcome, SensorSnapshot, TelemetryExchange};
use crate::transceiver::BusTransceiver;

/// Peripherals handed to a node.
pub struct NodeIo<P, D, H, S, A> {
    pub bus: P,
    pub direction: D,
    pub host: H,
    pub sensors: S,
    pub leds: A,
}

/// One bus node.
pub struct Node<P, D, H, S, A> {
    id: NodeId,
    arbiter: RoleArbiter,
    telemetry: TelemetryExchange,
    router: CommandRouter,
    transceiver: BusTransceiver<P, D>,
    host: H,
    sensors: S,
    leds: A,
    bus_rx: FrameLineBuffer,
    host_rx: FrameLineBuffer,
    scratch: Vec<u8>,
    outbound: VecDeque<String>,
    outbound_capacity: usize,
    metrics: LinkMetrics,
    tick: u64,
}

impl<P, D, H, S, A> Node<P, D, H, S, A>
where
    P: SerialLink,
    D: DirectionControl,
    H: SerialLink,
    S: SensorSource,
    A: Actuators,
{
    /// Build a node in its configured initial role with the transceiver
    /// resting in receive mode.
    pub fn new(
        config: &NodeConfig,
        io: NodeIo<P, D, H, S, A>,
        metrics: LinkMetrics,
    ) -> LinkResult<Self> {
        let transceiver = BusTransceiver::new(io.bus, io.direction, config.bus.settle)?;
        let node = Self {
            id: config.id,
            arbiter: RoleArbiter::new(config.initial_role),
            telemetry: TelemetryExchange::new(&config.telemetry),
            router: CommandRouter::new(config.id),
            transceiver,
            host: io.host,
            sensors: io.sensors,
            leds: io.leds,
            bus_rx: FrameLineBuffer::new(),
            host_rx: FrameLineBuffer::new(),
            scratch: Vec::with_capacity(rbus_proto::LINE_CAPACITY),
            outbound: VecDeque::with_capacity(config.bus.outbound_queue),
            outbound_capacity: config.bus.outbound_queue.max(1),
            metrics,
            tick: 0,
        };
        bus_info!(
            context = node.log_context(),
            "node ready (settle {} us)",
            node.transceiver.settle().as_micros()
        );
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.arbiter.role()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn metrics(&self) -> &LinkMetrics {
        &self.metrics
    }

    pub fn pending_request(&self) -> Option<PendingRequest> {
        self.telemetry.pending()
    }

    pub fn peer_snapshot(&self) -> Option<SensorSnapshot> {
        self.telemetry.peer()
    }

    pub fn local_snapshot(&self) -> Option<SensorSnapshot> {
        self.telemetry.local()
    }

    /// Frames waiting for a quiet bus.
    pub fn queued_frames(&self) -> usize {
        self.outbound.len()
    }

    fn log_context(&self) -> LogContext<'static> {
        LogContext::new()
            .with_node(self.id.as_str())
            .with_role(self.arbiter.role().as_str())
            .with_tick(self.tick)
    }

    /// Run one control-loop step at device time `now` (milliseconds).
    pub fn poll<Y: Delay>(&mut self, now: u64, delay: &mut Y) {
        self.tick += 1;
        if self.arbiter.is_active() && !self.telemetry.is_scheduled() {
            self.telemetry.activate(now);
        }
        self.service_host(now, delay);
        self.service_bus(now, delay);
        if let Some(expired) = self.telemetry.expire(now) {
            self.metrics.reply_timeouts.inc();
            bus_debug!(
                context = self.log_context(),
                "no reply to data request sent at {} ms; keeping previous peer snapshot",
                expired.sent_at
            );
        }
        self.flush_outbound(delay);
        if self.arbiter.is_active() && self.telemetry.is_due(now) {
            self.run_cycle(now, delay);
        }
    }

    fn service_host<Y: Delay>(&mut self, now: u64, delay: &mut Y) {
        self.scratch.clear();
        if let Err(err) = self.host.read_available(&mut self.scratch) {
            self.link_fault("host read", &err);
            return;
        }
        let events = self.host_rx.extend(&self.scratch);
        for event in events {
            match event {
                LineEvent::Line(line) => match HostCommand::parse(&line) {
                    Some(command) => self.handle_host_command(now, command, delay),
                    None => bus_debug!(
                        context = self.log_context(),
                        "ignoring host line {line:?}"
                    ),
                },
                LineEvent::Overflow => {
                    self.metrics.frames_dropped.inc();
                    bus_debug!(context = self.log_context(), "host line over capacity dropped");
                }
            }
        }
    }

    fn service_bus<Y: Delay>(&mut self, now: u64, delay: &mut Y) {
        self.scratch.clear();
        if let Err(err) = self.transceiver.receive(&mut self.scratch) {
            self.link_fault("bus read", &err);
            return;
        }
        let events = self.bus_rx.extend(&self.scratch);
        for event in events {
            match event {
                LineEvent::Line(line) => match BusFrame::decode(&line) {
                    Some(frame) => {
                        self.metrics.frames_received.inc();
                        self.handle_bus_frame(now, frame, delay);
                    }
                    None => {
                        self.metrics.frames_dropped.inc();
                        bus_debug!(context = self.log_context(), "dropping bus line {line:?}");
                    }
                },
                LineEvent::Overflow => {
                    self.metrics.frames_dropped.inc();
                    bus_debug!(context = self.log_context(), "bus line over capacity dropped");
                }
            }
        }
    }

    fn handle_host_command<Y: Delay>(&mut self, now: u64, command: HostCommand, delay: &mut Y) {
        match self.router.route_host(command) {
            Route::Role(directive) => {
                let transition = self.arbiter.apply_host(directive);
                self.after_transition(now, transition);
                if let Some(notify) = transition.notify_peer {
                    self.enqueue(BusFrame::Role(notify));
                }
            }
            Route::Local(commands) => self.actuate(&commands),
            Route::Forward(frame) => self.enqueue(frame),
            Route::Ignore => {}
        }
        // Forwarded frames go out right away when the bus is quiet.
        self.flush_outbound(delay);
    }

    fn handle_bus_frame<Y: Delay>(&mut self, now: u64, frame: BusFrame, delay: &mut Y) {
        match frame {
            BusFrame::DataRequest => self.answer_data_request(now, delay),
            BusFrame::SensorData(reading) => match self.telemetry.accept_reply(now, reading) {
                ReplyOutcome::Accepted => {
                    bus_debug!(context = self.log_context(), "peer snapshot refreshed")
                }
                ReplyOutcome::Late => {
                    self.metrics.late_replies.inc();
                    bus_debug!(
                        context = self.log_context(),
                        "sensor reply arrived after its request expired; dropped"
                    )
                }
                ReplyOutcome::Unsolicited => {
                    self.role_conflict("unsolicited sensor reply");
                }
            },
            BusFrame::Role(directive) => self.apply_peer_directive(now, directive),
            frame @ (BusFrame::Led(_) | BusFrame::Command(_)) => {
                match self.router.route_peer(&frame) {
                    Route::Local(commands) => self.actuate(&commands),
                    _ => bus_debug!(
                        context = self.log_context(),
                        "{} frame not addressed to this node",
                        frame.kind()
                    ),
                }
            }
        }
    }

    fn answer_data_request<Y: Delay>(&mut self, now: u64, delay: &mut Y) {
        if self.arbiter.is_active() {
            self.role_conflict("data request received while active");
            return;
        }
        let reading = self.sensors.sample();
        bus_debug!(
            context = self.log_context(),
            "answering data request at {} ms",
            now
        );
        // Replies bypass the queue: the requester is waiting for exactly this.
        if let Some(line) = self.encode(&BusFrame::SensorData(reading)) {
            self.send_line(&line, delay);
        }
    }

    fn apply_peer_directive(&mut self, now: u64, directive: RoleDirective) {
        let transition = self.arbiter.apply_peer(directive);
        self.after_transition(now, transition);
    }

    fn after_transition(&mut self, now: u64, transition: RoleTransition) {
        if !transition.changed() {
            return;
        }
        self.metrics.role_transitions.inc();
        if transition.to.is_active() {
            self.telemetry.activate(now);
        } else {
            self.telemetry.deactivate();
        }
        bus_info!(
            context = self.log_context(),
            "role {} -> {} ({} directive)",
            transition.from,
            transition.to,
            transition.source.as_str()
        );
    }

    fn run_cycle<Y: Delay>(&mut self, now: u64, delay: &mut Y) {
        let reading = self.sensors.sample();
        let output = self
            .telemetry
            .run_cycle(now, reading, self.id, self.arbiter.role());
        match output.report.to_line() {
            Ok(line) => {
                if self.write_host(&line) {
                    self.metrics.host_reports.inc();
                }
            }
            Err(err) => bus_warn!(
                context = self.log_context(),
                "host report not serialisable: {err}"
            ),
        }
        if output.request_peer {
            if let Some(line) = self.encode(&BusFrame::DataRequest) {
                if self.send_line(&line, delay) {
                    self.telemetry.request_sent(now);
                    self.metrics.telemetry_requests.inc();
                }
            }
        }
    }

    fn actuate(&mut self, commands: &[LedCommand]) {
        for command in commands {
            match self.leds.set_led(command.led, command.on) {
                Ok(()) => {
                    bus_debug!(
                        context = self.log_context(),
                        "led {} set {}",
                        command.led,
                        command.on
                    );
                    self.write_host(&encode_ack(command));
                }
                Err(err) => self.link_fault("actuator", &err),
            }
        }
    }

    fn enqueue(&mut self, frame: BusFrame) {
        let Some(line) = self.encode(&frame) else {
            return;
        };
        if self.outbound.len() >= self.outbound_capacity {
            self.metrics.queue_overflows.inc();
            bus_warn!(
                context = self.log_context(),
                "outbound queue full; dropping {} frame",
                frame.kind()
            );
            return;
        }
        self.outbound.push_back(line);
    }

    /// Transmit queued frames while no data request is outstanding.
    fn flush_outbound<Y: Delay>(&mut self, delay: &mut Y) {
        while self.telemetry.pending().is_none() {
            let Some(line) = self.outbound.pop_front() else {
                break;
            };
            self.send_line(&line, delay);
        }
    }

    fn encode(&self, frame: &BusFrame) -> Option<String> {
        match frame.encode_line() {
            Ok(line) => Some(line),
            Err(CodecError::Oversize { kind, len, capacity }) => {
                self.metrics.encode_rejections.inc();
                bus_warn!(
                    context = self.log_context(),
                    "{kind} frame of {len} bytes exceeds line capacity {capacity}; dropped"
                );
                None
            }
            Err(err) => {
                self.metrics.encode_rejections.inc();
                bus_warn!(context = self.log_context(), "frame not encodable: {err}");
                None
            }
        }
    }

    fn send_line<Y: Delay>(&mut self, line: &str, delay: &mut Y) -> bool {
        match self.transceiver.transmit(line.as_bytes(), delay) {
            Ok(()) => {
                self.metrics.frames_sent.inc();
                true
            }
            Err(err) => {
                self.link_fault("bus write", &err);
                false
            }
        }
    }

    fn write_host(&mut self, line: &str) -> bool {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        match self.host.write_all(&bytes) {
            Ok(()) => true,
            Err(err) => {
                self.link_fault("host write", &err);
                false
            }
        }
    }

    fn role_conflict(&self, what: &str) {
        self.metrics.role_conflicts.inc();
        bus_warn!(
            context = self.log_context(),
            "role conflict: {what}; both nodes may hold the same role"
        );
    }

    fn link_fault(&self, step: &str, err: &LinkError) {
        self.metrics.link_faults.inc();
        bus_warn!(context = self.log_context(), "{step} failed: {err}");
    }
}

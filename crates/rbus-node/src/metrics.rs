//! ---
//! rbus_section: "05-observability"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Link counters for a bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};
use rbus_common::NodeId;

/// Counters published by a node. Every series carries a constant `node`
/// label so both nodes of a simulated pair can share one registry.
#[derive(Clone)]
pub struct LinkMetrics {
    pub frames_received: IntCounter,
    pub frames_dropped: IntCounter,
    pub frames_sent: IntCounter,
    pub encode_rejections: IntCounter,
    pub queue_overflows: IntCounter,
    pub telemetry_requests: IntCounter,
    pub reply_timeouts: IntCounter,
    pub late_replies: IntCounter,
    pub role_transitions: IntCounter,
    pub role_conflicts: IntCounter,
    pub host_reports: IntCounter,
    pub link_faults: IntCounter,
}

/// Plain copy of the counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub frames_sent: u64,
    pub encode_rejections: u64,
    pub queue_overflows: u64,
    pub telemetry_requests: u64,
    pub reply_timeouts: u64,
    pub late_replies: u64,
    pub role_transitions: u64,
    pub role_conflicts: u64,
    pub host_reports: u64,
    pub link_faults: u64,
}

fn counter(node: NodeId, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help).const_label("node", node.as_str()))
}

impl LinkMetrics {
    pub fn new(node: NodeId) -> prometheus::Result<Self> {
        Ok(Self {
            frames_received: counter(
                node,
                "rbus_bus_frames_received_total",
                "Bus frames decoded successfully",
            )?,
            frames_dropped: counter(
                node,
                "rbus_bus_frames_dropped_total",
                "Bus or host lines dropped as malformed or overlong",
            )?,
            frames_sent: counter(node, "rbus_bus_frames_sent_total", "Bus frames transmitted")?,
            encode_rejections: counter(
                node,
                "rbus_encode_rejections_total",
                "Outbound frames rejected as oversize or unencodable",
            )?,
            queue_overflows: counter(
                node,
                "rbus_outbound_queue_overflows_total",
                "Frames dropped because the outbound bus queue was full",
            )?,
            telemetry_requests: counter(
                node,
                "rbus_telemetry_requests_total",
                "Data requests sent to the peer",
            )?,
            reply_timeouts: counter(
                node,
                "rbus_reply_timeouts_total",
                "Data requests that expired without a reply",
            )?,
            late_replies: counter(
                node,
                "rbus_late_replies_total",
                "Sensor replies that arrived after their request expired",
            )?,
            role_transitions: counter(
                node,
                "rbus_role_transitions_total",
                "Role changes applied by the arbiter",
            )?,
            role_conflicts: counter(
                node,
                "rbus_role_conflicts_total",
                "Frames implying both nodes hold the same role",
            )?,
            host_reports: counter(
                node,
                "rbus_host_reports_total",
                "Telemetry reports written to the host",
            )?,
            link_faults: counter(
                node,
                "rbus_link_faults_total",
                "Peripheral errors seen by the control loop",
            )?,
        })
    }

    /// Register every counter with `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        for counter in [
            &self.frames_received,
            &self.frames_dropped,
            &self.frames_sent,
            &self.encode_rejections,
            &self.queue_overflows,
            &self.telemetry_requests,
            &self.reply_timeouts,
            &self.late_replies,
            &self.role_transitions,
            &self.role_conflicts,
            &self.host_reports,
            &self.link_faults,
        ] {
            registry.register(Box::new(counter.clone()))?;
        }
        Ok(())
    }

    pub fn counters(&self) -> LinkCounters {
        LinkCounters {
            frames_received: self.frames_received.get(),
            frames_dropped: self.frames_dropped.get(),
            frames_sent: self.frames_sent.get(),
            encode_rejections: self.encode_rejections.get(),
            queue_overflows: self.queue_overflows.get(),
            telemetry_requests: self.telemetry_requests.get(),
            reply_timeouts: self.reply_timeouts.get(),
            late_replies: self.late_replies.get(),
            role_transitions: self.role_transitions.get(),
            role_conflicts: self.role_conflicts.get(),
            host_reports: self.host_reports.get(),
            link_faults: self.link_faults.get(),
        }
    }
}

//! ---
//! rbus_section: "03-logging"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Structured logging adapters and sinks."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Node-scoped structured logging for R-BUS.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Initialize a baseline tracing subscriber suitable for tools and tests.
///
/// Output goes to stderr so that tools using stdout as a data channel stay clean.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Node identifier (`A` or `B`).
    pub node: Option<&'a str>,
    /// Current bus role of the node.
    pub role: Option<&'a str>,
    /// Control loop iteration.
    pub tick: Option<u64>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node identifier.
    pub fn with_node(mut self, node: &'a str) -> Self {
        self.node = Some(node);
        self
    }

    /// Attach a role descriptor.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach a tick value.
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl LinkEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LinkEventOutcome::Success => "success",
            LinkEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a lifecycle event (bus port opened, node stopped, ...). Faults are
/// logged at error level.
pub fn log_link_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LinkEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                node = ctx.node,
                role = ctx.role,
                tick = ctx.tick,
                message = %message
            )
        };
    }
    match outcome {
        LinkEventOutcome::Success => emit!(Level::INFO),
        LinkEventOutcome::Fault => emit!(Level::ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new().with_node("A").with_role("ACTIVE");
        bus_info!(context = ctx.clone(), "node online");
        bus_debug!("no context attached");
        bus_warn!(context = ctx.with_tick(7), "reply timeout after {} ms", 50);
    }

    #[test]
    fn link_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_node("B");
        log_link_event(
            Some(&ctx),
            "bus.open",
            "bus port opened",
            LinkEventOutcome::Success,
        );
        log_link_event(None, "bus.open", "bus port failed", LinkEventOutcome::Fault);
    }
}

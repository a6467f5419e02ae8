//! ---
//! rbus_section: "03-logging"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Structured logging adapters and sinks."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Logging macros enriched with node context.
//!
//! Context fields that are unset are left out of the event rather than
//! logged as empty strings.

#[doc(hidden)]
#[macro_export]
macro_rules! bus_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext<'_> = &$ctx;
        $crate::tracing::event!(
            $level,
            node = ctx.node,
            role = ctx.role,
            tick = ctx.tick,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with node context.
#[macro_export]
macro_rules! bus_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with node context.
#[macro_export]
macro_rules! bus_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with node context.
#[macro_export]
macro_rules! bus_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bus_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

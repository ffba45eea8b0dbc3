#![deny(missing_docs)]
//! Logging for the session client, its channels and the reference service.
//!
//! Session transitions log under the emitting module's target. Individual
//! frames crossing a channel log at trace level under [`WIRE_TARGET`] via
//! [`stream_wire!`], so a binary can silence or isolate protocol traffic
//! without touching the rest.

/// Log target for frames crossing a channel, in either direction.
pub const WIRE_TARGET: &str = "stream::wire";

/// Traces one frame (or a dropped one) under [`WIRE_TARGET`].
#[macro_export]
macro_rules! stream_wire {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::WIRE_TARGET, $($arg)*);
    }};
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! stream_trace {
    (target: $target:expr, $($arg:tt)*) => {{
        log::trace!(target: $target, $($arg)*);
    }};
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! stream_debug {
    (target: $target:expr, $($arg:tt)*) => {{
        log::debug!(target: $target, $($arg)*);
    }};
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! stream_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! stream_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! stream_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Installs a terminal logger for test binaries. Later calls are no-ops.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Trace in debug builds so wire traffic shows up with `--nocapture`.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

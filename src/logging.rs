//! Logging and tracing setup.
//!
//! The library only emits `tracing` events; binaries and tests decide
//! whether and how to subscribe.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

static INIT: Once = Once::new();

/// Output shape of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Pretty,
    Json,
}

fn install(output: Output) {
    INIT.call_once(|| {
        // RUST_LOG wins; graph cache traffic is only visible at trace
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("elfgraph=info"));
        let base = tracing_subscriber::fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_line_number(true);
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match output {
            Output::Pretty => base.boxed(),
            Output::Json => base.json().with_current_span(true).boxed(),
        };

        if tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .is_ok()
        {
            info!(?output, "elfgraph tracing initialized");
        }
    });
}

/// Initialize the global tracing subscriber.
///
/// Only the first call of either initializer takes effect, and a subscriber
/// installed elsewhere is left alone.
pub fn init_tracing() {
    install(Output::Pretty);
}

/// Same as [`init_tracing`] with one JSON object per event
pub fn init_tracing_json() {
    install(Output::Json);
}

/// Macro for creating spans
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::debug_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::debug_span!($name, $($field)*)
    };
}

/// Macro for logging and returning errors
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::debug!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::debug!(error = %e, message = $msg, "Operation failed");
        e
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, trace};

    #[test]
    fn test_init_tracing_once() {
        init_tracing();
        init_tracing();
        init_tracing_json();
    }

    #[test]
    fn test_span_creation() {
        init_tracing();
        let span = span_trace!("resolve", section = 3, attr = "relas");
        let _guard = span.enter();
        trace!("Inside span");
        debug!(section = 3, "Structured event");
    }

    #[test]
    fn test_log_error_returns_value() {
        init_tracing();
        let err = log_error!(crate::error::ElfGraphError::Closed, "closing twice");
        assert!(matches!(err, crate::error::ElfGraphError::Closed));
    }
}

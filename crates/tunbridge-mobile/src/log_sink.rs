//! Host log sink
//!
//! The host hands the controller a single-method capability to receive
//! error messages. It is only called on failed start paths.

use tracing::error;

/// Receives error text destined for the host application
pub trait LogSink: Send + Sync {
    fn log_data(&self, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log_data(&self, message: &str) {
        self(message)
    }
}

/// Sink that forwards to `tracing`, for hosts without their own logger
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log_data(&self, message: &str) {
        error!(target: "tunbridge::host", "{}", message);
    }
}

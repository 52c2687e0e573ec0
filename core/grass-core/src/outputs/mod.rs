//! Output sinks and the dispatcher that fans messages out to them.
//! New sinks are wired up in [`crate::TrackerConfig::build_outputs`].

mod console;
mod file;
mod webhook;

pub use console::ConsoleOutput;
pub use file::{FileOutput, DEFAULT_LOG_FILE};
pub use webhook::{WebhookOutput, WEBHOOK_URL_ENV};

use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

use crate::error::Result;

/// A destination for session messages.
///
/// Implementors should:
/// - Return `Err` rather than panic when delivery fails
/// - Not retry; the dispatcher treats each call as fire-and-forget
pub trait OutputSink: Send + Sync {
    /// Short identifier used in logs (e.g., "console", "webhook")
    fn name(&self) -> &'static str;

    /// Deliver one message. `Ok(())` means it was delivered.
    fn deliver(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// Sends each message to every registered sink, in registration order.
///
/// One sink failing (error or panic) never stops the others, and `dispatch`
/// itself never fails.
#[derive(Default)]
pub struct OutputDispatcher {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl OutputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn OutputSink>) {
        debug!(sink = sink.name(), "Registered output");
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.register(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub fn dispatch(&self, message: &str) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for sink in &self.sinks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(message)));
            match outcome {
                Ok(Ok(())) => summary.delivered.push(sink.name()),
                Ok(Err(err)) => {
                    error!(sink = sink.name(), error = %err, "Error sending to output");
                    summary.failed.push(sink.name());
                }
                Err(_) => {
                    error!(sink = sink.name(), "Output panicked while sending");
                    summary.failed.push(sink.name());
                }
            }
        }

        summary
    }
}

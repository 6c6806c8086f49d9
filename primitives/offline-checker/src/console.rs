//! Dry-run publisher that prints reports instead of posting them.

use crate::discord::embed_payload;
use crate::error::CheckerError;
use crate::poller::ReportSink;
use presence_report::Report;

/// Writes each report's message payload to stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsolePublisher {
    pretty: bool,
}

impl ConsolePublisher {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats the payload for console output.
    pub fn render(&self, report: &Report) -> String {
        let payload = embed_payload(report);
        if self.pretty {
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
        } else {
            payload.to_string()
        }
    }
}

impl ReportSink for ConsolePublisher {
    async fn publish(&mut self, report: &Report) -> Result<(), CheckerError> {
        println!("{}", self.render(report));
        Ok(())
    }
}

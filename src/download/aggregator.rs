use std::io::Write;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{BatchReport, TaskResult};

/// Drains the result stream, printing a progress line per finished game and
/// collecting failures. Item failures are reported, never escalated.
pub struct Aggregator<W: Write> {
    total: usize,
    processed: usize,
    failures: Vec<TaskResult>,
    out: W,
}

impl<W: Write> Aggregator<W> {
    pub fn new(total: usize, out: W) -> Self {
        Aggregator {
            total,
            processed: 0,
            failures: Vec::new(),
            out,
        }
    }

    /// Consume results until every task has reported, then print the
    /// failure summary.
    pub async fn drain(mut self, mut rx: mpsc::UnboundedReceiver<TaskResult>) -> BatchReport {
        while let Some(result) = rx.recv().await {
            self.record(result);
        }
        self.finish()
    }

    pub fn record(&mut self, result: TaskResult) {
        self.processed += 1;

        let status = match &result.error {
            Some(err) => {
                self.line(format_args!("Error: {}", err));
                "❌"
            }
            None => "✅",
        };
        let (processed, total, percent) = (self.processed, self.total, self.percent());
        self.line(format_args!(
            "[{}] {} Downloaded game {} | Progress: {}/{} ({:.2}%) games",
            result.year, status, result.id, processed, total, percent
        ));

        if !result.is_success() {
            self.failures.push(result);
        }
    }

    /// Share of the expected total processed so far, in percent.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    pub fn finish(mut self) -> BatchReport {
        if !self.failures.is_empty() {
            self.line(format_args!("Errors:"));
            let lines: Vec<String> = self
                .failures
                .iter()
                .filter_map(|r| r.error.as_ref().map(|e| format!("  {}: {}", r.id, e)))
                .collect();
            for l in lines {
                self.line(format_args!("{}", l));
            }
        }

        info!(
            "Batch finished: {}/{} games downloaded, {} failed",
            self.processed - self.failures.len(),
            self.processed,
            self.failures.len()
        );

        BatchReport {
            processed: self.processed,
            failures: self.failures,
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", args) {
            debug!("Could not write progress line: {}", e);
        }
    }
}

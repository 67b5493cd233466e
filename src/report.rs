//! Per-run warning reporter
//!
//! Non-fatal data anomalies (absent coordinates, unseen categories) degrade to a
//! documented default instead of failing, but they must never be silent. Components
//! take a `RunReport` by mutable reference and record each anomaly on it; the report
//! lives for exactly one pipeline run, so there is no process-global logger state to
//! configure or reset between runs.

use tracing::warn;

/// Collects warnings emitted during a single pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    warnings: Vec<String>,
}

impl RunReport {
    /// Create an empty report for a new run
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal anomaly. Also emitted through `tracing` at warn level.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Warnings recorded so far, in emission order
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut report = RunReport::new();
        assert!(report.is_empty());

        report.warn("first");
        report.warn("second");

        assert_eq!(report.warnings(), &["first".to_string(), "second".to_string()]);
    }
}

use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Suite scoped progress reporting.
///
/// Every event carries the suite name so interleaved output of parallel suites stays readable.
#[derive(Clone, Debug)]
pub struct Reporter {
    suite: Arc<str>,
}

impl Reporter {
    /// Creates a reporter for the given suite.
    pub fn new(suite: impl Into<Arc<str>>) -> Self {
        Self { suite: suite.into() }
    }

    /// Suite the reporter belongs to.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Reports a regular message.
    pub fn message(&self, message: &str) {
        info!(target: "testkit::reporter", suite = %self.suite, "{message}");
    }

    /// Reports a message only relevant when debugging the suite.
    pub fn debug(&self, message: &str) {
        debug!(target: "testkit::reporter", suite = %self.suite, "{message}");
    }

    /// Reports a non fatal problem.
    pub fn warn(&self, message: &str) {
        warn!(target: "testkit::reporter", suite = %self.suite, "{message}");
    }

    /// Starts a named action; finish it with [`Action::finish`] or [`Action::fail`].
    pub fn start_action(&self, name: &str) -> Action {
        info!(target: "testkit::reporter", suite = %self.suite, action = name, "started");
        Action { reporter: self.clone(), name: name.to_string(), started: Instant::now() }
    }
}

/// An in-flight action started with [`Reporter::start_action`].
#[derive(Debug)]
#[must_use = "call `finish` or `fail` to report the outcome"]
pub struct Action {
    reporter: Reporter,
    name: String,
    started: Instant,
}

impl Action {
    /// Name of the action.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports successful completion.
    pub fn finish(self) {
        info!(
            target: "testkit::reporter",
            suite = %self.reporter.suite,
            action = %self.name,
            elapsed = ?self.started.elapsed(),
            "finished"
        );
    }

    /// Reports failure of the action.
    pub fn fail(self, reason: &str) {
        warn!(
            target: "testkit::reporter",
            suite = %self.reporter.suite,
            action = %self.name,
            elapsed = ?self.started.elapsed(),
            reason,
            "failed"
        );
    }
}

//! History of [`SessionMetrics`] collected during a single run.

use std::time::Duration;

use crate::metrics::{sampler::millis, SessionMetrics};

/// Append-only history of [`SessionMetrics`] of a single run.
///
/// Exposes the steady-state view: the trailing entries lying within a fixed
/// time span of the newest entry, so scoring ignores startup transients.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    /// All the [`SessionMetrics`] in the order they were appended.
    history: Vec<SessionMetrics>,

    /// Trailing time span of the steady-state view.
    span: Duration,
}

impl SampleWindow {
    /// Returns new empty [`SampleWindow`] with the provided steady-state
    /// `span`.
    #[must_use]
    pub fn new(span: Duration) -> Self {
        Self {
            history: Vec::new(),
            span,
        }
    }

    /// Appends new [`SessionMetrics`] to this [`SampleWindow`].
    ///
    /// Out of order entries are appended as is.
    pub fn push(&mut self, metrics: SessionMetrics) {
        self.history.push(metrics);
    }

    /// Returns the most recently appended [`SessionMetrics`].
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&SessionMetrics> {
        self.history.last()
    }

    /// Returns number of entries in this [`SampleWindow`].
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Indicates whether this [`SampleWindow`] has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Returns all the entries whose timestamp is not older than the span of
    /// this [`SampleWindow`] counting from the most recently appended entry.
    ///
    /// Empty if nothing was appended yet.
    #[must_use]
    pub fn steady_state(&self) -> Vec<&SessionMetrics> {
        let latest = match self.history.last() {
            Some(latest) => millis(latest),
            None => return Vec::new(),
        };
        let oldest_allowed = latest - self.span.as_secs_f64() * 1000.;
        self.history
            .iter()
            .filter(|m| millis(m) >= oldest_allowed)
            .collect()
    }
}

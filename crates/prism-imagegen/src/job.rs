//! Lifecycle of one submitted image on a submit-and-poll provider.
//!
//! ```text
//! Submitted ──► Polling ──► Ready
//!     │            ├──────► Failed
//!     │            └──────► TimedOut
//!     └──────────────────► Failed
//! ```
//!
//! `Ready`, `Failed` and `TimedOut` are terminal.

use std::{fmt, time::Duration};

use tokio::time::Instant;

use crate::{
    error::{ProviderError, Result},
    types::ImageResult,
};

/// Opaque locator returned by the provider at submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PollingHandle(String);

impl PollingHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
pub(crate) enum JobState {
    Submitted,
    Polling,
    Ready(ImageResult),
    Failed(ProviderError),
    TimedOut(Duration),
}

impl JobState {
    const fn name(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_) | Self::TimedOut(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One image being produced by a polling provider
#[derive(Debug)]
pub(crate) struct GenerationJob {
    index: usize,
    state: JobState,
    polling_handle: Option<PollingHandle>,
    task_id: Option<String>,
    submitted_at: Option<Instant>,
    last_polled_at: Option<Instant>,
}

impl GenerationJob {
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            state: JobState::Submitted,
            polling_handle: None,
            task_id: None,
            submitted_at: None,
            last_polled_at: None,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn state(&self) -> &JobState {
        &self.state
    }

    pub const fn polling_handle(&self) -> Option<&PollingHandle> {
        self.polling_handle.as_ref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub const fn submitted_at(&self) -> Option<Instant> {
        self.submitted_at
    }

    pub const fn last_polled_at(&self) -> Option<Instant> {
        self.last_polled_at
    }

    /// Time since the submission was accepted
    pub fn elapsed(&self) -> Option<Duration> {
        self.submitted_at().map(|at| at.elapsed())
    }

    /// Record the accepted submission and begin polling
    pub fn start_polling(&mut self, handle: PollingHandle, task_id: Option<String>, now: Instant) -> Result<()> {
        self.transition(JobState::Polling)?;
        self.polling_handle = Some(handle);
        self.task_id = task_id;
        self.submitted_at = Some(now);
        Ok(())
    }

    pub fn record_poll(&mut self, now: Instant) {
        self.last_polled_at = Some(now);
    }

    pub fn complete(&mut self, result: ImageResult) -> Result<()> {
        self.transition(JobState::Ready(result))
    }

    pub fn fail(&mut self, error: ProviderError) -> Result<()> {
        self.transition(JobState::Failed(error))
    }

    pub fn time_out(&mut self, budget: Duration) -> Result<()> {
        self.transition(JobState::TimedOut(budget))
    }

    fn transition(&mut self, next: JobState) -> Result<()> {
        let allowed = match (&self.state, &next) {
            (JobState::Submitted, JobState::Polling | JobState::Failed(_)) => true,
            (JobState::Polling, next) => next.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(ProviderError::internal(format!(
                "Job {} cannot move from {} to {}.",
                self.index, self.state, next
            )));
        }

        tracing::trace!(job = self.index, from = %self.state, to = %next, "job state change");
        self.state = next;

        Ok(())
    }

    /// Consume the job, yielding its image or its normalized failure
    pub fn into_outcome(self) -> Result<ImageResult> {
        match self.state {
            JobState::Ready(result) => Ok(result),
            JobState::Failed(error) => Err(error),
            JobState::TimedOut(budget) => Err(ProviderError::timeout(format!(
                "Image generation timed out after polling for {}s.",
                budget.as_secs_f64()
            ))),
            state => Err(ProviderError::internal(format!(
                "Job {} ended while still {state}.",
                self.index
            ))),
        }
    }
}

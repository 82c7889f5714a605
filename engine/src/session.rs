//! Job session state.
//!
//! A `JobSession` is the single slot for the report job of one UI session.
//! It is owned by the controller and is the only place the "processing" flag
//! lives. Every change goes through `transition`, which rejects moves the
//! lifecycle does not allow:
//!
//! ```text
//! Idle -> Submitting -> Polling -> Completing -> Idle
//!             |            |  ^
//!             |            +--+   (each progress report)
//!             +------------+----> Idle   (cancel)
//!             +-----------------> Completing (resolved before first poll)
//! ```

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::ProgressStatus;

/// Phase of the job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// No job; a submission is accepted.
    Idle,
    /// Job submitted, no progress seen yet.
    Submitting,
    /// Job running, status being polled.
    Polling,
    /// Submission resolved; result being delivered.
    Completing,
}

impl JobPhase {
    fn can_transition_to(self, to: JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, to),
            (Idle, Submitting)
                | (Submitting, Polling)
                | (Polling, Polling)
                | (Submitting, Completing)
                | (Polling, Completing)
                | (Completing, Idle)
                | (Submitting, Idle)
                | (Polling, Idle)
        )
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Idle => write!(f, "Idle"),
            JobPhase::Submitting => write!(f, "Submitting"),
            JobPhase::Polling => write!(f, "Polling"),
            JobPhase::Completing => write!(f, "Completing"),
        }
    }
}

/// The job slot of one UI session.
#[derive(Debug)]
pub struct JobSession {
    phase: JobPhase,
    job_id: Option<Uuid>,
    cancel: Option<CancellationToken>,
    progress: Option<ProgressStatus>,
}

impl JobSession {
    pub fn new() -> Self {
        JobSession {
            phase: JobPhase::Idle,
            job_id: None,
            cancel: None,
            progress: None,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// True from submission until the job is completed or cancelled.
    pub fn is_processing(&self) -> bool {
        self.phase != JobPhase::Idle
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    /// Most recent progress report of the active job.
    pub fn progress(&self) -> Option<ProgressStatus> {
        self.progress
    }

    /// Whether `job_id` names the job currently occupying the slot.
    pub fn is_current(&self, job_id: Uuid) -> bool {
        self.job_id == Some(job_id)
    }

    /// Occupy the slot with a new job.
    pub fn begin(&mut self, job_id: Uuid, cancel: CancellationToken) -> Result<(), EngineError> {
        self.transition(JobPhase::Submitting)?;
        self.job_id = Some(job_id);
        self.cancel = Some(cancel);
        self.progress = None;
        Ok(())
    }

    /// Store a progress report from the poller.
    pub fn record_progress(&mut self, status: ProgressStatus) -> Result<(), EngineError> {
        self.transition(JobPhase::Polling)?;
        self.progress = Some(status);
        Ok(())
    }

    /// Note that a poll happened without usable progress.
    pub fn mark_polling(&mut self) -> Result<(), EngineError> {
        self.transition(JobPhase::Polling)
    }

    /// Enter the completion phase once the submission has resolved.
    ///
    /// The lifecycle task has already stopped polling at this point; the
    /// token is dropped so a late cancel cannot reach a finished job.
    pub fn begin_completion(&mut self) -> Result<(), EngineError> {
        self.transition(JobPhase::Completing)?;
        self.cancel = None;
        Ok(())
    }

    /// Release the slot after the result was delivered.
    pub fn finish(&mut self) -> Result<(), EngineError> {
        self.transition(JobPhase::Idle)?;
        self.reset();
        Ok(())
    }

    /// Cancel the active job and release the slot immediately.
    ///
    /// Fires the job's cancellation token, which stops polling and aborts the
    /// in-flight submission. Returns the id of the cancelled job.
    pub fn cancel(&mut self) -> Result<Uuid, EngineError> {
        self.transition(JobPhase::Idle)?;
        let job_id = self.job_id;
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.reset();
        job_id.ok_or(EngineError::InvalidTransition {
            from: JobPhase::Idle,
            to: JobPhase::Idle,
        })
    }

    fn transition(&mut self, to: JobPhase) -> Result<(), EngineError> {
        if !self.phase.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::trace!(from = %self.phase, to = %to, "Job session transition");
        self.phase = to;
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = JobPhase::Idle;
        self.job_id = None;
        self.cancel = None;
        self.progress = None;
    }
}

impl Default for JobSession {
    fn default() -> Self {
        Self::new()
    }
}

//! Platform API seam.
//!
//! The scheduler talks to the platform exclusively through
//! [`SimulationApi`], so tests drive the job state machine with an in-memory
//! implementation and no network.

use crate::error::BrainError;
use crate::metrics::{AlphaDocument, CorrelationBounds};
use crate::settings::SimulationRequest;

/// Remote tracking handle for a submitted simulation (the progress URL on the
/// real platform).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

/// Lifecycle status of an evaluation job.
///
/// `Submitted -> Pending -> {Complete | Warning | Failed | Error}`; the four
/// right-hand statuses are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Pending,
    Complete,
    Warning,
    Failed,
    Error,
}

impl JobStatus {
    /// Map the platform's status string. Unknown strings poll again later.
    pub fn from_remote(status: &str) -> Self {
        match status {
            "COMPLETE" => JobStatus::Complete,
            "WARNING" => JobStatus::Warning,
            "FAILED" | "FAIL" => JobStatus::Failed,
            "ERROR" => JobStatus::Error,
            _ => JobStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Warning | JobStatus::Failed | JobStatus::Error
        )
    }

    /// Terminal and scoreable (the metrics document exists).
    pub fn has_result(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Warning)
    }
}

/// One poll of a job handle.
#[derive(Debug, Clone, Default)]
pub struct PollReply {
    /// Current status, if the platform reported one.
    pub status: Option<JobStatus>,
    /// Remote alpha id, present once the simulation finishes.
    pub alpha_id: Option<String>,
    /// The platform reported stale session credentials.
    pub auth_expired: bool,
}

/// Blocking platform operations used by the scheduler.
///
/// `probe_*` methods perform a single request; the scheduler owns the bounded
/// polling loop around them.
pub trait SimulationApi {
    /// Exchange credentials for a fresh session.
    fn reauthenticate(&mut self) -> Result<(), BrainError>;

    /// Submit one candidate; returns its tracking handle.
    fn submit(&mut self, request: &SimulationRequest) -> Result<JobHandle, BrainError>;

    /// Poll a handle once.
    fn poll(&mut self, handle: &JobHandle) -> Result<PollReply, BrainError>;

    /// Fetch the metrics document for a finished simulation.
    fn fetch_metrics(&mut self, alpha_id: &str) -> Result<AlphaDocument, BrainError>;

    /// One probe of the self-correlation endpoint; `None` while not ready.
    fn probe_correlation(&mut self, alpha_id: &str)
        -> Result<Option<CorrelationBounds>, BrainError>;

    /// One probe of the competition score endpoint; `Some(after - before)`
    /// once the score exists.
    fn probe_competition_score(&mut self, alpha_id: &str) -> Result<Option<f64>, BrainError>;
}

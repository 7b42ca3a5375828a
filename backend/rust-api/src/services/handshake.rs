use tokio::task::JoinHandle;

use crate::error::ProgressionError;
use crate::metrics::VERDICT_POLLS_ACTIVE;
use crate::models::{ProgressRecord, QuestionStatus};

/// Bookkeeping for the pending -> verdict polling cycle. At most one poll
/// loop may be outstanding per participant engine; a newly started loop
/// supersedes (aborts) its predecessor, and a loop created for an older
/// generation discards whatever it observed.
pub struct SubmissionHandshake {
    generation: u64,
    poll: Option<JoinHandle<()>>,
}

impl SubmissionHandshake {
    pub fn new() -> Self {
        Self {
            generation: 0,
            poll: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Installs a freshly spawned poll loop, superseding any prior one.
    pub fn begin_poll(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.poll.replace(handle) {
            old.abort();
        } else {
            VERDICT_POLLS_ACTIVE.inc();
        }
    }

    /// Cancels the outstanding poll loop, e.g. on navigation away from a
    /// pending question.
    pub fn stop_poll(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.poll.take() {
            handle.abort();
            VERDICT_POLLS_ACTIVE.dec();
        }
    }

    /// Called from inside the poll loop once it observed a terminal status:
    /// releases the handle without aborting the (already returning) task.
    pub fn finish_poll(&mut self, generation: u64) {
        if generation == self.generation && self.poll.take().is_some() {
            VERDICT_POLLS_ACTIVE.dec();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }
}

impl Default for SubmissionHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubmissionHandshake {
    fn drop(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.abort();
            VERDICT_POLLS_ACTIVE.dec();
        }
    }
}

/// Submit-for-judgment guard. An exhausted timer closes the question for
/// good; otherwise only a question actively being worked on can be handed to
/// the judges.
pub fn ensure_submittable(record: &ProgressRecord) -> Result<(), ProgressionError> {
    if record.timed_out() {
        return Err(ProgressionError::SubmissionClosed);
    }
    match record.status {
        QuestionStatus::InProgress => Ok(()),
        QuestionStatus::NotStarted => Err(ProgressionError::InvalidTransition("not_started")),
        QuestionStatus::Pending => Err(ProgressionError::InvalidTransition("pending")),
        QuestionStatus::Correct => Err(ProgressionError::InvalidTransition("correct")),
        QuestionStatus::Wrong => Err(ProgressionError::InvalidTransition("wrong")),
        QuestionStatus::Skipped => Err(ProgressionError::InvalidTransition("skipped")),
    }
}

/// Start/resume guard: a fresh question or a previously skipped one can be
/// (re)entered; anything else is rejected.
pub fn ensure_startable(record: &ProgressRecord) -> Result<(), ProgressionError> {
    if record.timed_out() {
        return Err(ProgressionError::SubmissionClosed);
    }
    match record.status {
        QuestionStatus::NotStarted | QuestionStatus::Skipped | QuestionStatus::InProgress => Ok(()),
        QuestionStatus::Pending => Err(ProgressionError::InvalidTransition("pending")),
        QuestionStatus::Correct => Err(ProgressionError::InvalidTransition("correct")),
        QuestionStatus::Wrong => Err(ProgressionError::InvalidTransition("wrong")),
    }
}

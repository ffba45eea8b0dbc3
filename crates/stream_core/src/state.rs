use stream_logging::{stream_debug, stream_info, stream_warn};

use crate::view_model::SessionView;
use crate::SubmitError;

pub const EMPTY_INPUT_MESSAGE: &str = "Input cannot be empty.";
pub const DEFAULT_REMOTE_ERROR: &str = "An error occurred";
pub const DISCONNECT_MESSAGE: &str = "Connection to the processing service was lost.";
pub const SEND_FAILED_MESSAGE: &str = "Not connected to the processing service.";
pub const IDLE_TIMEOUT_MESSAGE: &str = "Timed out waiting for the processing service.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Completed,
    Failed,
}

impl JobStatus {
    /// Submitted and Streaming both mean "awaiting or receiving".
    pub fn is_busy(self) -> bool {
        matches!(self, JobStatus::Submitted | JobStatus::Streaming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

/// Job status, result sequence and error message, mutated together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    status: JobStatus,
    results: Vec<String>,
    error: Option<String>,
    connection: ConnectionStatus,
    last_input: Option<String>,
    job_seq: u64,
    activity: u64,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status,
            busy: self.status.is_busy(),
            results: self.results.clone(),
            error: self.error.clone(),
            connection: self.connection,
            input: self.last_input.clone(),
            job_seq: self.job_seq,
            dirty: self.dirty,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn job_seq(&self) -> u64 {
        self.job_seq
    }

    pub fn activity(&self) -> u64 {
        self.activity
    }

    /// Returns whether anything observable changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Validates `raw` and moves into Submitted. Returns the trimmed text.
    pub(crate) fn begin_job(&mut self, raw: &str) -> Result<String, SubmitError> {
        let text = raw.trim();
        if text.is_empty() {
            // Status and results stay put; a live job keeps its own error slot.
            if !self.status.is_busy() {
                self.error = Some(EMPTY_INPUT_MESSAGE.to_string());
                self.mark_dirty();
            }
            return Err(SubmitError::Validation);
        }
        if self.status.is_busy() {
            return Err(SubmitError::Conflict {
                status: self.status,
            });
        }

        self.status = JobStatus::Submitted;
        self.results.clear();
        self.error = None;
        self.last_input = Some(text.to_string());
        self.job_seq += 1;
        self.activity += 1;
        self.mark_dirty();
        stream_info!("job {} submitted ({} chars)", self.job_seq, text.len());
        Ok(text.to_string())
    }

    /// Appends an item if a job is live. Returns false when the item was discarded.
    pub(crate) fn apply_item(&mut self, value: String) -> bool {
        match self.status {
            JobStatus::Submitted | JobStatus::Streaming => {
                self.status = JobStatus::Streaming;
                self.results.push(value);
                self.activity += 1;
                self.mark_dirty();
                true
            }
            JobStatus::Idle | JobStatus::Completed | JobStatus::Failed => {
                stream_debug!(
                    "discarding item outside a live job (status {:?})",
                    self.status
                );
                false
            }
        }
    }

    pub(crate) fn apply_done(&mut self) {
        if !self.status.is_busy() {
            stream_debug!("ignoring done (status {:?})", self.status);
            return;
        }
        self.status = JobStatus::Completed;
        self.activity += 1;
        self.mark_dirty();
        stream_info!(
            "job {} completed with {} item(s)",
            self.job_seq,
            self.results.len()
        );
    }

    pub(crate) fn apply_remote_error(&mut self, message: Option<String>) {
        if !self.status.is_busy() {
            stream_warn!(
                "ignoring error outside a live job (status {:?}): {:?}",
                self.status,
                message
            );
            return;
        }
        let message = message
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_ERROR.to_string());
        self.fail(message);
    }

    pub(crate) fn apply_connected(&mut self) {
        if self.connection != ConnectionStatus::Connected {
            self.connection = ConnectionStatus::Connected;
            self.mark_dirty();
        }
    }

    pub(crate) fn apply_disconnected(&mut self) {
        if self.connection != ConnectionStatus::Disconnected {
            self.connection = ConnectionStatus::Disconnected;
            self.mark_dirty();
        }
        if self.status.is_busy() {
            self.fail(DISCONNECT_MESSAGE.to_string());
        }
    }

    pub(crate) fn apply_send_failed(&mut self, job_seq: u64) {
        if job_seq == self.job_seq && self.status.is_busy() {
            self.fail(SEND_FAILED_MESSAGE.to_string());
        }
    }

    pub(crate) fn apply_idle_timeout(&mut self, activity: u64) {
        if activity == self.activity && self.status.is_busy() {
            self.fail(IDLE_TIMEOUT_MESSAGE.to_string());
        } else {
            stream_debug!(
                "stale idle timer (armed at {}, now {})",
                activity,
                self.activity
            );
        }
    }

    fn fail(&mut self, message: String) {
        stream_warn!("job {} failed: {}", self.job_seq, message);
        self.status = JobStatus::Failed;
        self.error = Some(message);
        self.activity += 1;
        self.mark_dirty();
    }
}

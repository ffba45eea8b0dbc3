use crate::{ConnectionStatus, JobStatus};

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub status: JobStatus,
    pub busy: bool,
    pub results: Vec<String>,
    pub error: Option<String>,
    pub connection: ConnectionStatus,
    pub input: Option<String>,
    pub job_seq: u64,
    pub dirty: bool,
}

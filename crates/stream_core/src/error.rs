use thiserror::Error;

use crate::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("input cannot be empty")]
    Validation,
    #[error("a job is already in flight (status {status:?})")]
    Conflict { status: JobStatus },
}

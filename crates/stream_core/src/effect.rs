use crate::SubmitError;

/// Side effects requested by [`crate::update`]; executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Emit `start_processing` with the (trimmed) job text.
    StartProcessing { job_seq: u64, text: String },
    /// (Re)start the idle watchdog for the given activity counter.
    ArmIdleTimer { activity: u64 },
    /// The submission was refused; no network IO happened.
    SubmitRejected(SubmitError),
}

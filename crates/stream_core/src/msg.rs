#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to process the given raw input.
    SubmitRequested(String),
    /// Transport established (or re-established) the link.
    Connected,
    /// Service emitted one incremental result.
    ItemReceived(String),
    /// Service finished the current job.
    DoneReceived,
    /// Service reported a failure; message is optional on the wire.
    ErrorReceived { message: Option<String> },
    /// Transport lost the link without being asked to.
    Disconnected,
    /// The `start_processing` send for `job_seq` could not be enqueued.
    SendFailed { job_seq: u64 },
    /// Idle watchdog armed at `activity` expired.
    IdleTimeout { activity: u64 },
    /// Fallback for placeholder wiring.
    NoOp,
}

//! Stream core: pure session state machine and view-model helpers.
mod effect;
mod error;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::SubmitError;
pub use msg::Msg;
pub use state::{
    AppState, ConnectionStatus, JobStatus, DEFAULT_REMOTE_ERROR, DISCONNECT_MESSAGE,
    EMPTY_INPUT_MESSAGE, IDLE_TIMEOUT_MESSAGE, SEND_FAILED_MESSAGE,
};
pub use update::update;
pub use view_model::SessionView;

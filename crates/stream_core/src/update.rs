use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested(raw) => match state.begin_job(&raw) {
            Ok(text) => vec![
                Effect::StartProcessing {
                    job_seq: state.job_seq(),
                    text,
                },
                Effect::ArmIdleTimer {
                    activity: state.activity(),
                },
            ],
            Err(err) => vec![Effect::SubmitRejected(err)],
        },
        Msg::ItemReceived(value) => {
            if state.apply_item(value) {
                vec![Effect::ArmIdleTimer {
                    activity: state.activity(),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::DoneReceived => {
            state.apply_done();
            Vec::new()
        }
        Msg::ErrorReceived { message } => {
            state.apply_remote_error(message);
            Vec::new()
        }
        Msg::Connected => {
            state.apply_connected();
            Vec::new()
        }
        Msg::Disconnected => {
            state.apply_disconnected();
            Vec::new()
        }
        Msg::SendFailed { job_seq } => {
            state.apply_send_failed(job_seq);
            Vec::new()
        }
        Msg::IdleTimeout { activity } => {
            state.apply_idle_timeout(activity);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

use stream_core::{update, AppState, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn notifications_while_idle_leave_state_untouched() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::ItemReceived("late".to_string()));
    assert_eq!(state, next);
    assert!(effects.is_empty());

    let (next, _) = update(next, Msg::DoneReceived);
    let (next, _) = update(
        next,
        Msg::ErrorReceived {
            message: Some("stray".to_string()),
        },
    );
    assert_eq!(state, next);
}

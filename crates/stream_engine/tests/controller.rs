use std::sync::{Arc, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use stream_core::{ConnectionStatus, JobStatus, SubmitError, DEFAULT_REMOTE_ERROR};
use stream_engine::{
    Channel, ControllerSettings, Frame, MemoryChannel, SessionController, DONE_EVENT, ERROR_EVENT,
    ITEM_EVENT, START_PROCESSING_EVENT,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(stream_logging::initialize_for_tests);
}

fn no_timeout() -> ControllerSettings {
    ControllerSettings { idle_timeout: None }
}

fn setup() -> (Arc<MemoryChannel>, SessionController) {
    init_logging();
    let channel = Arc::new(MemoryChannel::connected());
    let controller = SessionController::new(channel.clone(), no_timeout());
    (channel, controller)
}

fn item(channel: &MemoryChannel, value: &str) {
    assert!(channel.deliver(ITEM_EVENT, Some(json!({ "value": value }))));
}

fn start_frame(text: &str) -> Frame {
    Frame::new(START_PROCESSING_EVENT, Some(json!({ "text": text })))
}

#[test]
fn hello_end_to_end() {
    let (channel, controller) = setup();

    controller.submit("hello").unwrap();
    assert!(controller.snapshot().busy);
    item(&channel, "H");
    item(&channel, "E");
    channel.deliver(DONE_EVENT, None);

    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.results, vec!["H".to_string(), "E".to_string()]);
    assert_eq!(view.error, None);
    assert!(!view.busy);
    assert_eq!(channel.sent(), vec![start_frame("hello")]);
}

#[test]
fn bad_input_end_to_end() {
    let (channel, controller) = setup();

    controller.submit("x").unwrap();
    channel.deliver(ERROR_EVENT, Some(json!({ "message": "bad input" })));

    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.results.is_empty());
    assert_eq!(view.error.as_deref(), Some("bad input"));
}

#[test]
fn error_without_payload_uses_default_message() {
    let (channel, controller) = setup();

    controller.submit("x").unwrap();
    channel.deliver(ERROR_EVENT, None);

    let view = controller.snapshot();
    assert_eq!(view.error.as_deref(), Some(DEFAULT_REMOTE_ERROR));
    assert!(!view.busy);
}

#[test]
fn whitespace_submit_never_reaches_the_channel() {
    let (channel, controller) = setup();

    assert_eq!(controller.submit("  \t "), Err(SubmitError::Validation));
    assert!(channel.sent().is_empty());
    assert_eq!(controller.snapshot().status, JobStatus::Idle);
}

#[test]
fn busy_submit_is_rejected_without_second_send() {
    let (channel, controller) = setup();

    controller.submit("  first  ").unwrap();
    assert_eq!(
        controller.submit("second"),
        Err(SubmitError::Conflict {
            status: JobStatus::Submitted
        })
    );
    item(&channel, "TSRIF");
    assert!(matches!(
        controller.submit("third"),
        Err(SubmitError::Conflict { .. })
    ));

    assert_eq!(channel.sent(), vec![start_frame("first")]);
}

#[test]
fn late_items_after_done_are_discarded() {
    let (channel, controller) = setup();

    controller.submit("a").unwrap();
    item(&channel, "A");
    channel.deliver(DONE_EVENT, Some(json!({ "message": "Processing complete" })));
    item(&channel, "LATE");
    channel.deliver(ERROR_EVENT, Some(json!({ "message": "late" })));

    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.results, vec!["A".to_string()]);
    assert_eq!(view.error, None);
}

#[test]
fn disconnect_keeps_partial_results_and_allows_resubmit_after_reconnect() {
    let (channel, controller) = setup();

    controller.submit("one two").unwrap();
    item(&channel, "ENO");
    channel.drop_link();

    let view = controller.snapshot();
    assert!(!view.busy);
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.results, vec!["ENO".to_string()]);
    assert_eq!(view.connection, ConnectionStatus::Disconnected);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(channel.connect("memory://")).unwrap();
    assert_eq!(controller.snapshot().connection, ConnectionStatus::Connected);

    controller.submit("again").unwrap();
    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Submitted);
    assert!(view.results.is_empty());
    assert_eq!(view.error, None);
}

#[test]
fn submit_while_link_is_down_fails_the_job() {
    let (channel, controller) = setup();
    channel.drop_link();

    controller.submit("hello").unwrap();

    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.is_some());
    assert!(channel.sent().is_empty());
}

#[test]
fn rebinding_handlers_processes_each_event_once() {
    let (channel, controller) = setup();
    controller.bind_handlers();
    controller.bind_handlers();
    assert_eq!(channel.handler_count(), 5);

    controller.submit("dup").unwrap();
    item(&channel, "PUD");
    channel.deliver(DONE_EVENT, None);

    assert_eq!(controller.snapshot().results, vec!["PUD".to_string()]);
}

#[test]
fn second_controller_on_same_channel_replaces_bindings() {
    let (channel, first) = setup();
    let second = SessionController::new(channel.clone(), no_timeout());

    second.submit("x").unwrap();
    item(&channel, "X");

    assert_eq!(second.snapshot().results, vec!["X".to_string()]);
    assert!(first.snapshot().results.is_empty());
    assert_eq!(channel.handler_count(), 5);
}

#[test]
fn non_string_items_are_kept_in_compact_json() {
    let (channel, controller) = setup();

    controller.submit("n").unwrap();
    channel.deliver(ITEM_EVENT, Some(json!({ "value": 7 })));
    channel.deliver(ITEM_EVENT, Some(json!({ "value": { "k": true } })));
    channel.deliver(ITEM_EVENT, Some(json!({ "nope": 1 })));

    assert_eq!(
        controller.snapshot().results,
        vec!["7".to_string(), r#"{"k":true}"#.to_string()]
    );
}

#[tokio::test]
async fn shutdown_deregisters_handlers_and_closes() {
    let (channel, controller) = setup();

    controller.shutdown().await;

    assert_eq!(channel.handler_count(), 0);
    assert!(!channel.is_connected());
    assert!(!channel.deliver(ITEM_EVENT, Some(json!({ "value": "X" }))));
}

#[tokio::test]
async fn subscribers_observe_each_transition() {
    let (channel, controller) = setup();
    let mut views = controller.subscribe();

    controller.submit("go").unwrap();
    views.changed().await.unwrap();
    assert_eq!(views.borrow_and_update().status, JobStatus::Submitted);

    item(&channel, "OG");
    views.changed().await.unwrap();
    assert_eq!(views.borrow_and_update().results, vec!["OG".to_string()]);

    channel.deliver(DONE_EVENT, None);
    views.changed().await.unwrap();
    let view = views.borrow_and_update().clone();
    assert_eq!(view.status, JobStatus::Completed);
    assert!(!view.busy);
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_fails_a_stalled_job() {
    init_logging();
    let channel = Arc::new(MemoryChannel::connected());
    let controller = SessionController::new(
        channel.clone(),
        ControllerSettings {
            idle_timeout: Some(Duration::from_secs(5)),
        },
    );

    controller.submit("slow").unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    item(&channel, "WOLS");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(controller.snapshot().status, JobStatus::Streaming);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.results, vec!["WOLS".to_string()]);
    assert!(view.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn idle_timer_is_harmless_after_completion() {
    init_logging();
    let channel = Arc::new(MemoryChannel::connected());
    let controller = SessionController::new(
        channel.clone(),
        ControllerSettings {
            idle_timeout: Some(Duration::from_secs(1)),
        },
    );

    controller.submit("quick").unwrap();
    channel.deliver(DONE_EVENT, None);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let view = controller.snapshot();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn failed_connect_is_reported_and_not_retried() {
    init_logging();
    let channel = Arc::new(MemoryChannel::new());
    channel.set_unreachable(true);
    let controller = SessionController::new(channel.clone(), no_timeout());
    assert!(channel.has_handler(ITEM_EVENT));

    let err = channel.connect("memory://down").await.unwrap_err();
    assert!(matches!(err, stream_engine::ConnectionError::Unreachable { .. }));
    assert_eq!(
        controller.snapshot().connection,
        ConnectionStatus::Disconnected
    );

    channel.set_unreachable(false);
    channel.connect("memory://up").await.unwrap();
    assert_eq!(controller.snapshot().connection, ConnectionStatus::Connected);
    assert!(channel.take_sent().is_empty());
}

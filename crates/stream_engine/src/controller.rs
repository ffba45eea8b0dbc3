use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use stream_core::{update, AppState, Effect, Msg, SessionView, SubmitError};
use stream_logging::{stream_debug, stream_error, stream_warn};
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::channel::{Channel, Handler, Payload};
use crate::frame::{
    item_text, ErrorPayload, ItemPayload, StartProcessing, CONNECT_EVENT, DISCONNECT_EVENT,
    DONE_EVENT, ERROR_EVENT, ITEM_EVENT, START_PROCESSING_EVENT,
};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Fail a busy job when nothing arrives for this long. `None` disables.
    pub idle_timeout: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Binds the session state machine to a [`Channel`].
///
/// Every notification is turned into a [`Msg`], applied with
/// [`stream_core::update`] under one lock, published to subscribers, and the
/// resulting effects are executed once the lock is released.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    channel: Arc<dyn Channel>,
    settings: ControllerSettings,
    state: Mutex<AppState>,
    view_tx: watch::Sender<SessionView>,
    /// The one live idle watchdog; re-arming aborts the previous one.
    idle_timer: Mutex<Option<AbortHandle>>,
}

const BOUND_EVENTS: [&str; 5] = [
    CONNECT_EVENT,
    ITEM_EVENT,
    DONE_EVENT,
    ERROR_EVENT,
    DISCONNECT_EVENT,
];

impl SessionController {
    pub fn new(channel: Arc<dyn Channel>, settings: ControllerSettings) -> Self {
        let state = AppState::new();
        let (view_tx, _) = watch::channel(state.view());
        let controller = Self {
            inner: Arc::new(Inner {
                channel,
                settings,
                state: Mutex::new(state),
                view_tx,
                idle_timer: Mutex::new(None),
            }),
        };
        controller.bind_handlers();
        if controller.inner.channel.is_connected() {
            controller.inner.dispatch(Msg::Connected);
        }
        controller
    }

    /// Binds the protocol handlers. Safe to call again; bindings are replaced.
    pub fn bind_handlers(&self) {
        let channel = &self.inner.channel;
        channel.on(CONNECT_EVENT, self.handler(|_| Some(Msg::Connected)));
        channel.on(ITEM_EVENT, self.handler(item_msg));
        channel.on(DONE_EVENT, self.handler(|_| Some(Msg::DoneReceived)));
        channel.on(ERROR_EVENT, self.handler(error_msg));
        channel.on(DISCONNECT_EVENT, self.handler(|_| Some(Msg::Disconnected)));
    }

    /// Starts a job. Rejections happen locally and never touch the network.
    pub fn submit(&self, text: &str) -> Result<(), SubmitError> {
        match self.inner.dispatch(Msg::SubmitRequested(text.to_string())) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn snapshot(&self) -> SessionView {
        self.inner.lock_state().view()
    }

    /// Receiver that observes every published view.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.inner.channel
    }

    /// Deregisters every handler and closes the channel.
    pub async fn shutdown(&self) {
        for event in BOUND_EVENTS {
            self.inner.channel.off(event);
        }
        self.inner.disarm_idle_timer();
        self.inner.channel.close().await;
    }

    fn handler(&self, to_msg: fn(Payload) -> Option<Msg>) -> Handler {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |payload: Payload| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Some(msg) = to_msg(payload) {
                inner.dispatch(msg);
            }
        })
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `msg` and runs its effects. Returns a submit rejection, if any.
    fn dispatch(self: &Arc<Self>, msg: Msg) -> Option<SubmitError> {
        let effects = {
            let mut guard = self.lock_state();
            let state = std::mem::take(&mut *guard);
            let (state, effects) = update(state, msg);
            *guard = state;
            if guard.consume_dirty() {
                self.view_tx.send_replace(guard.view());
            }
            effects
        };

        let mut rejection = None;
        for effect in effects {
            match effect {
                Effect::StartProcessing { job_seq, text } => self.start_processing(job_seq, text),
                Effect::ArmIdleTimer { activity } => self.arm_idle_timer(activity),
                Effect::SubmitRejected(err) => {
                    stream_debug!("submit rejected: {}", err);
                    rejection = Some(err);
                }
            }
        }
        rejection
    }

    fn start_processing(self: &Arc<Self>, job_seq: u64, text: String) {
        let payload = serde_json::to_value(StartProcessing { text }).ok();
        if let Err(err) = self.channel.send(START_PROCESSING_EVENT, payload) {
            stream_error!("failed to send job {}: {}", job_seq, err);
            self.dispatch(Msg::SendFailed { job_seq });
        }
    }

    fn arm_idle_timer(self: &Arc<Self>, activity: u64) {
        let Some(timeout) = self.settings.idle_timeout else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            stream_warn!("no tokio runtime; idle watchdog not armed");
            return;
        };
        let weak = Arc::downgrade(self);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(Msg::IdleTimeout { activity });
            }
        });
        let previous = self.lock_idle_timer().replace(timer.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn disarm_idle_timer(&self) {
        if let Some(timer) = self.lock_idle_timer().take() {
            timer.abort();
        }
    }

    fn lock_idle_timer(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.idle_timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn item_msg(payload: Payload) -> Option<Msg> {
    let parsed = payload.map(serde_json::from_value::<ItemPayload>);
    match parsed {
        Some(Ok(item)) => Some(Msg::ItemReceived(item_text(item.value))),
        Some(Err(err)) => {
            stream_warn!("dropping malformed item: {}", err);
            None
        }
        None => {
            stream_warn!("dropping item without payload");
            None
        }
    }
}

fn error_msg(payload: Payload) -> Option<Msg> {
    let message = payload
        .filter(|value| !value.is_null())
        .and_then(|value| match value {
            Value::String(text) => Some(text),
            other => serde_json::from_value::<ErrorPayload>(other)
                .ok()
                .and_then(|payload| payload.message),
        });
    Some(Msg::ErrorReceived { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryChannel;

    fn current_timer(controller: &SessionController) -> AbortHandle {
        controller
            .inner
            .lock_idle_timer()
            .clone()
            .expect("watchdog armed")
    }

    #[tokio::test]
    async fn rearming_aborts_the_previous_watchdog() {
        let channel = Arc::new(MemoryChannel::connected());
        let controller = SessionController::new(channel.clone(), ControllerSettings::default());

        controller.submit("many words").unwrap();
        let first = current_timer(&controller);
        let mut replaced = Vec::new();
        for n in 0..50 {
            replaced.push(current_timer(&controller));
            channel.deliver(ITEM_EVENT, Some(serde_json::json!({ "value": n })));
        }
        let live = current_timer(&controller);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert!(first.is_finished());
        assert!(replaced.iter().all(AbortHandle::is_finished));
        assert!(!live.is_finished());
    }

    #[tokio::test]
    async fn shutdown_disarms_the_watchdog() {
        let channel = Arc::new(MemoryChannel::connected());
        let controller = SessionController::new(channel.clone(), ControllerSettings::default());

        controller.submit("x").unwrap();
        let timer = current_timer(&controller);
        controller.shutdown().await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert!(controller.inner.lock_idle_timer().is_none());
        assert!(timer.is_finished());
    }
}

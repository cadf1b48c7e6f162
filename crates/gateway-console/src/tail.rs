//! Bounded live tail of the MQTT messages the gateway publishes.
//!
//! The backend runs the actual subscriber; this session starts and stops it
//! and polls its buffer. While running, two tasks exist side by side:
//!
//! - a poll loop that fetches the buffer every poll period and replaces the
//!   local copy wholesale
//! - a ceiling timer that stops the capture once the session has run for
//!   the configured maximum
//!
//! Every run gets an epoch. Tasks and in-flight answers carry the epoch they
//! were started under and are ignored once it is no longer current, which
//! makes [`TailSession::stop`] idempotent and immune to late poll results.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use gateway_core::{ConsoleSettings, TailMessage};
use gateway_protocol::TailStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actions::ActionError;
use crate::client::GatewayClient;
use crate::lock;
use crate::notify::{NoticeLevel, Notifier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailState {
    #[default]
    Stopped,
    /// Waiting for the backend to confirm the capture.
    Starting,
    Running,
}

/// Why a running session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    /// The session hit its maximum duration.
    Ceiling,
    /// A poll found the backend capture no longer running.
    RemoteEnded,
}

/// What a view renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TailSnapshot {
    pub state: TailState,
    pub topic: Option<String>,
    /// Backend buffer as of the last poll, newest first.
    pub messages: Vec<TailMessage>,
}

/// Handle to the tail session; clones share it.
#[derive(Clone)]
pub struct TailSession {
    inner: Arc<TailInner>,
}

struct TailInner {
    client: GatewayClient,
    notifier: Arc<dyn Notifier>,
    poll_period: Duration,
    ceiling: Duration,
    control: Mutex<TailControl>,
    snapshot: watch::Sender<TailSnapshot>,
}

#[derive(Default)]
struct TailControl {
    state: TailState,
    epoch: u64,
    poll: Option<JoinHandle<()>>,
    ceiling: Option<JoinHandle<()>>,
}

impl TailSession {
    pub fn new(
        client: GatewayClient,
        notifier: Arc<dyn Notifier>,
        poll_period: Duration,
        ceiling: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(TailSnapshot::default());
        Self {
            inner: Arc::new(TailInner {
                client,
                notifier,
                poll_period,
                ceiling,
                control: Mutex::new(TailControl::default()),
                snapshot,
            }),
        }
    }

    pub fn from_settings(
        client: GatewayClient,
        notifier: Arc<dyn Notifier>,
        settings: &ConsoleSettings,
    ) -> Self {
        Self::new(
            client,
            notifier,
            settings.tail_poll_period(),
            settings.tail_ceiling(),
        )
    }

    pub fn state(&self) -> TailState {
        lock(&self.inner.control).state
    }

    pub fn snapshot(&self) -> TailSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that sees every state and buffer change.
    pub fn subscribe(&self) -> watch::Receiver<TailSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Ask the backend to start capturing, then poll until stopped.
    ///
    /// Does nothing unless the session is stopped. A rejection is reported
    /// to the user as "Failed to start: <reason>".
    pub async fn start(&self) -> Result<(), ActionError> {
        let Some(epoch) = self.inner.begin() else {
            debug!("Tail already active, start ignored");
            return Ok(());
        };

        let failure = match self.inner.client.tail_start().await {
            Ok(ack) if ack.ok => {
                if !self.inner.arm(epoch) {
                    self.inner.stop_unarmed().await;
                }
                return Ok(());
            }
            Ok(ack) => ActionError::Rejected(ack.reason()),
            Err(e) => ActionError::from(e),
        };

        self.inner.abandon(epoch);
        self.inner
            .notifier
            .notify(NoticeLevel::Danger, &format!("Failed to start: {failure}"));
        Err(failure)
    }

    /// Adopt a capture that is already running on the backend.
    ///
    /// Loads the current buffer either way. Returns whether the session is
    /// now running.
    pub async fn attach(&self) -> Result<bool, ActionError> {
        let Some(epoch) = self.inner.begin() else {
            return Ok(false);
        };

        match self.inner.client.tail_status().await {
            Ok(status) if status.running => {
                self.inner.absorb(status);
                Ok(self.inner.arm(epoch))
            }
            Ok(status) => {
                self.inner.abandon(epoch);
                self.inner.absorb(status);
                Ok(false)
            }
            Err(e) => {
                self.inner.abandon(epoch);
                Err(e.into())
            }
        }
    }

    /// Stop polling and tell the backend to stop capturing.
    ///
    /// Returns `false` (and sends nothing) if the session was not active.
    pub async fn stop(&self) -> bool {
        self.inner.shutdown(None, StopReason::User).await
    }

    /// Empty the backend buffer and the local copy. The session keeps running.
    pub async fn clear(&self) -> Result<(), ActionError> {
        let failure = match self.inner.client.clear_messages().await {
            Ok(ack) if ack.ok => {
                self.inner.snapshot.send_modify(|s| s.messages.clear());
                return Ok(());
            }
            Ok(ack) => ActionError::Rejected(ack.reason()),
            Err(e) => ActionError::from(e),
        };
        self.inner.notifier.notify(
            NoticeLevel::Danger,
            &format!("Failed to clear messages: {failure}"),
        );
        Err(failure)
    }
}

impl TailInner {
    /// Stopped -> Starting under a fresh epoch.
    fn begin(&self) -> Option<u64> {
        let epoch = {
            let mut control = lock(&self.control);
            if control.state != TailState::Stopped {
                return None;
            }
            control.state = TailState::Starting;
            control.epoch += 1;
            control.epoch
        };
        self.publish_state(TailState::Starting);
        Some(epoch)
    }

    /// Starting -> Stopped without contacting the backend.
    fn abandon(&self, epoch: u64) {
        {
            let mut control = lock(&self.control);
            if control.epoch != epoch || control.state != TailState::Starting {
                return;
            }
            control.state = TailState::Stopped;
            control.epoch += 1;
        }
        self.publish_state(TailState::Stopped);
    }

    /// Starting -> Running: spawn the poll loop and the ceiling timer.
    fn arm(self: &Arc<Self>, epoch: u64) -> bool {
        {
            let mut control = lock(&self.control);
            if control.epoch != epoch || control.state != TailState::Starting {
                return false;
            }
            control.state = TailState::Running;

            let weak = Arc::downgrade(self);
            control.poll = Some(tokio::spawn(poll_loop(weak.clone(), epoch, self.poll_period)));

            let ceiling = self.ceiling;
            control.ceiling = Some(tokio::spawn(async move {
                sleep(ceiling).await;
                if let Some(inner) = weak.upgrade() {
                    info!("Tail reached its {:?} ceiling", ceiling);
                    inner.shutdown(Some(epoch), StopReason::Ceiling).await;
                }
            }));
        }
        self.publish_state(TailState::Running);
        info!("Tail running (poll every {:?})", self.poll_period);
        true
    }

    /// The session was stopped while the backend was still starting its
    /// capture. That stop may have reached the backend first, so stop again
    /// unless a newer run has begun since.
    async fn stop_unarmed(&self) {
        if lock(&self.control).state != TailState::Stopped {
            return;
        }
        debug!("Tail stopped before the backend confirmed the start");
        self.stop_backend().await;
    }

    fn is_current(&self, epoch: u64) -> bool {
        let control = lock(&self.control);
        control.epoch == epoch && control.state == TailState::Running
    }

    /// One poll. Returns whether the loop should keep going.
    async fn poll_once(&self, epoch: u64) -> bool {
        let status = match self.client.tail_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Tail poll failed: {}", e);
                return self.is_current(epoch);
            }
        };

        let running = status.running;
        {
            let control = lock(&self.control);
            if control.epoch != epoch || control.state != TailState::Running {
                return false;
            }
            self.absorb(status);
        }

        if !running {
            info!("Backend capture ended");
            self.shutdown(Some(epoch), StopReason::RemoteEnded).await;
        }
        running
    }

    /// Replace the local buffer with a polled one.
    fn absorb(&self, status: TailStatus) {
        let TailStatus {
            topic, messages, ..
        } = status;
        self.snapshot.send_modify(|s| {
            s.messages = messages;
            if topic.is_some() {
                s.topic = topic;
            }
        });
    }

    /// Any active state -> Stopped. `epoch` restricts the stop to one run.
    async fn shutdown(&self, epoch: Option<u64>, reason: StopReason) -> bool {
        let (poll, ceiling) = {
            let mut control = lock(&self.control);
            if control.state == TailState::Stopped || epoch.is_some_and(|e| e != control.epoch) {
                return false;
            }
            control.state = TailState::Stopped;
            control.epoch += 1;
            (control.poll.take(), control.ceiling.take())
        };

        // The task running this shutdown must not abort itself.
        if reason != StopReason::RemoteEnded {
            if let Some(poll) = poll {
                poll.abort();
            }
        }
        if reason != StopReason::Ceiling {
            if let Some(ceiling) = ceiling {
                ceiling.abort();
            }
        }
        self.publish_state(TailState::Stopped);
        info!("Tail stopped ({:?})", reason);

        if reason != StopReason::RemoteEnded {
            self.stop_backend().await;
        }
        true
    }

    async fn stop_backend(&self) {
        match self.client.tail_stop().await {
            Ok(ack) if ack.ok => {}
            Ok(ack) => warn!("Backend refused to stop the tail: {}", ack.reason()),
            Err(e) => warn!("Failed to stop the backend tail: {}", e),
        }
    }

    fn publish_state(&self, state: TailState) {
        self.snapshot.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }
}

impl Drop for TailInner {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in [control.poll.take(), control.ceiling.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn poll_loop(weak: Weak<TailInner>, epoch: u64, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if !inner.is_current(epoch) || !inner.poll_once(epoch).await {
            break;
        }
    }
    debug!("Tail poll loop finished");
}

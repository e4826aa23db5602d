//! Backend event stream client
//!
//! Split in two layers:
//!
//! - [`StreamSupervisor`]: the Disconnected / Open / Reconnecting state machine.
//!   Pure: every input returns a list of [`Effect`]s and nothing else happens.
//! - [`BackendMonitor`]: a tokio task that owns the supervisor, executes its
//!   effects (open/close channel, arm/cancel the reopen timer, post notices)
//!   and publishes a [`BackendSnapshot`] after every step.
//!
//! Every opened channel gets a fresh generation number. Payloads, failures and
//! reopen timers are tagged with the generation that produced them and are
//! dropped when it is no longer the authoritative one, so a superseded channel
//! or a cancelled backoff can never act on the current connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionState;
use crate::error::MonitorError;
use crate::history::{EventHistory, InputEvent, DEFAULT_HISTORY_CAPACITY};
use crate::reconnect::{
    ReconnectDecision, ReconnectState, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS,
};

/// Raw event payloads from one channel; ends when the channel closes
pub type EventChannel = BoxStream<'static, Result<String, MonitorError>>;

/// Opens the one-way event channel
#[async_trait]
pub trait EventConnector: Send + Sync + 'static {
    async fn open(&self) -> Result<EventChannel, MonitorError>;
}

/// Connect/disconnect requests to the backend collaborator
#[async_trait]
pub trait InputBackend: Send + Sync + 'static {
    /// Ask the backend to start reading `device_path`; returns its display name
    async fn connect(&self, device_path: &str) -> Result<String, MonitorError>;

    async fn disconnect(&self) -> Result<(), MonitorError>;
}

/// Tunables for the stream client
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub history_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Disconnected,
    /// Channel requested or open
    Open,
    /// Waiting out a backoff delay
    Reconnecting,
}

/// User-visible notices
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connected { device_name: String },
    Disconnected,
    ConnectFailed(String),
    DisconnectFailed(String),
    /// One payload could not be parsed; the channel stays open
    ParseError(String),
    /// Terminal: the subsystem is now disconnected
    MaxRetriesExceeded { attempts: u32 },
}

impl Notice {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::Connected { .. } | Notice::Disconnected)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { device_name } => write!(f, "Connected to {device_name}"),
            Notice::Disconnected => write!(f, "Disconnected"),
            Notice::ConnectFailed(reason) => write!(f, "Connect failed: {reason}"),
            Notice::DisconnectFailed(reason) => write!(f, "Disconnect failed: {reason}"),
            Notice::ParseError(reason) => write!(f, "Error receiving event data: {reason}"),
            Notice::MaxRetriesExceeded { attempts } => write!(
                f,
                "Event stream failed, maximum retries reached ({attempts})"
            ),
        }
    }
}

/// Side effects requested by the supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Close whatever channel is open, then open a new one
    Open { generation: u64 },
    /// Close the open channel, if any
    Close,
    /// Arm the reopen timer for the channel of `generation`
    ScheduleReopen { generation: u64, delay: Duration },
    /// Disarm the reopen timer, if any
    CancelReopen,
    Notify(Notice),
}

/// Read-only view of the backend channel
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSnapshot {
    pub connection: ConnectionState,
    pub phase: StreamPhase,
    pub device_path: Option<String>,
    pub attempts: u32,
    /// Events accepted since the device was connected
    pub received: u64,
    /// Newest first
    pub history: Vec<InputEvent>,
}

impl Default for BackendSnapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionState::disconnected(),
            phase: StreamPhase::Disconnected,
            device_path: None,
            attempts: 0,
            received: 0,
            history: Vec::new(),
        }
    }
}

/// Backend channel state machine
#[derive(Debug)]
pub struct StreamSupervisor {
    connection: ConnectionState,
    reconnect: ReconnectState,
    history: EventHistory,
    phase: StreamPhase,
    generation: u64,
    device_path: Option<String>,
    received: u64,
}

impl StreamSupervisor {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            connection: ConnectionState::disconnected(),
            reconnect: ReconnectState::new(settings.base_delay, settings.max_attempts),
            history: EventHistory::new(settings.history_capacity),
            phase: StreamPhase::Disconnected,
            generation: 0,
            device_path: None,
            received: 0,
        }
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn reconnect(&self) -> &ReconnectState {
        &self.reconnect
    }

    /// Generation of the authoritative channel
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The backend accepted `device_path`
    pub fn connected(&mut self, device_path: &str, device_name: &str) -> Vec<Effect> {
        self.generation += 1;
        self.connection.mark_connected(device_name);
        self.device_path = Some(device_path.to_string());
        self.reconnect.reset();
        self.history.clear();
        self.received = 0;
        self.phase = StreamPhase::Open;
        info!("Backend device connected: {} ({})", device_name, device_path);

        vec![
            Effect::Open {
                generation: self.generation,
            },
            Effect::Notify(Notice::Connected {
                device_name: device_name.to_string(),
            }),
        ]
    }

    /// The backend refused or the request failed; nothing is left half-open
    pub fn connect_failed(&mut self, reason: &str) -> Vec<Effect> {
        self.generation += 1;
        self.connection.fail(reason);
        self.device_path = None;
        self.phase = StreamPhase::Disconnected;
        warn!("Backend connect failed: {}", reason);

        vec![
            Effect::Close,
            Effect::CancelReopen,
            Effect::Notify(Notice::ConnectFailed(reason.to_string())),
        ]
    }

    /// A payload arrived on channel `generation`
    pub fn on_message(&mut self, generation: u64, data: &str) -> Vec<Effect> {
        if !self.is_live(generation) {
            debug!("Dropping payload from stale channel {}", generation);
            return Vec::new();
        }

        match InputEvent::from_json(data) {
            Ok(event) => {
                debug!("Event {} = {}", event.event_name, event.value);
                self.history.push(event);
                self.received += 1;
                self.reconnect.reset();
                Vec::new()
            }
            Err(e) => {
                warn!("Malformed event payload: {}", e);
                vec![Effect::Notify(Notice::ParseError(e.to_string()))]
            }
        }
    }

    /// Channel `generation` broke or closed
    pub fn on_channel_failure(&mut self, generation: u64, reason: &str) -> Vec<Effect> {
        if !self.is_live(generation) {
            debug!("Ignoring failure of stale channel {}: {}", generation, reason);
            return Vec::new();
        }

        match self.reconnect.on_failure() {
            ReconnectDecision::Retry { attempt, delay } => {
                self.phase = StreamPhase::Reconnecting;
                warn!(
                    "Event stream error ({}), reconnecting ({}/{}) in {}ms",
                    reason,
                    attempt,
                    self.reconnect.ceiling(),
                    delay.as_millis()
                );
                vec![
                    Effect::Close,
                    Effect::ScheduleReopen { generation, delay },
                ]
            }
            ReconnectDecision::GiveUp { attempts } => {
                error!(
                    "Event stream failed after {} reconnect attempts, giving up",
                    attempts
                );
                self.generation += 1;
                self.phase = StreamPhase::Disconnected;
                self.device_path = None;
                self.connection.fail("max retries exceeded");
                vec![
                    Effect::Close,
                    Effect::CancelReopen,
                    Effect::Notify(Notice::MaxRetriesExceeded { attempts }),
                ]
            }
        }
    }

    /// The backoff timer armed for `generation` fired
    pub fn on_reopen_due(&mut self, generation: u64) -> Vec<Effect> {
        let still_wanted = self.connection.is_connected()
            && self.phase == StreamPhase::Reconnecting
            && generation == self.generation;
        if !still_wanted {
            debug!("Discarding reopen for superseded channel {}", generation);
            return Vec::new();
        }

        self.generation += 1;
        self.phase = StreamPhase::Open;
        debug!("Reopening event stream as channel {}", self.generation);
        vec![Effect::Open {
            generation: self.generation,
        }]
    }

    /// User-initiated disconnect. No backoff applies; safe to repeat.
    pub fn disconnect(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.phase = StreamPhase::Disconnected;
        self.device_path = None;
        self.connection.mark_disconnected();
        self.reconnect.reset();
        self.history.clear();
        self.received = 0;
        info!("Backend device disconnected");

        vec![
            Effect::Close,
            Effect::CancelReopen,
            Effect::Notify(Notice::Disconnected),
        ]
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            connection: self.connection.clone(),
            phase: self.phase,
            device_path: self.device_path.clone(),
            attempts: self.reconnect.attempts(),
            received: self.received,
            history: self.history.to_vec(),
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        self.connection.is_connected()
            && self.phase == StreamPhase::Open
            && generation == self.generation
    }
}

// ============================================================================
// Async driver
// ============================================================================

enum Command {
    Connect {
        device_path: String,
        reply: oneshot::Sender<Result<String, MonitorError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

enum ChannelMessage {
    Payload { generation: u64, data: String },
    Failed { generation: u64, reason: String },
    ReopenDue { generation: u64 },
}

/// Owner of the backend stream task.
///
/// Dropping it together with every [`MonitorHandle`] stops the task and
/// closes the channel.
pub struct BackendMonitor {
    handle: MonitorHandle,
    task: JoinHandle<()>,
}

/// Cloneable request handle to the backend stream task, for callers that
/// run requests off their own loop
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<BackendSnapshot>,
}

impl BackendMonitor {
    /// Spawn the monitor task on the current tokio runtime.
    ///
    /// Notices are delivered on the returned receiver.
    pub fn spawn(
        backend: Arc<dyn InputBackend>,
        connector: Arc<dyn EventConnector>,
        settings: StreamSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let supervisor = StreamSupervisor::new(&settings);
        let (snapshot_tx, snapshot_rx) = watch::channel(supervisor.snapshot());

        let driver = Driver {
            supervisor,
            backend,
            connector,
            channel: None,
            reopen: None,
            channel_tx,
            notices: notice_tx,
            snapshots: snapshot_tx,
        };
        let task = tokio::spawn(driver.run(command_rx, channel_rx));

        (
            Self {
                handle: MonitorHandle {
                    commands: command_tx,
                    snapshots: snapshot_rx,
                },
                task,
            },
            notice_rx,
        )
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Connect to `device_path`, replacing any current device.
    ///
    /// On failure the channel is left disconnected with the error recorded.
    pub async fn connect(&self, device_path: &str) -> Result<String, MonitorError> {
        self.handle.connect(device_path).await
    }

    /// Close the channel and tell the backend to release the device
    pub async fn disconnect(&self) -> Result<(), MonitorError> {
        self.handle.disconnect().await
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendSnapshot> {
        self.handle.subscribe()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.handle.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Backend monitor task ended abnormally: {}", e);
        }
    }
}

impl MonitorHandle {
    /// See [`BackendMonitor::connect`]
    pub async fn connect(&self, device_path: &str) -> Result<String, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect {
                device_path: device_path.to_string(),
                reply,
            })
            .map_err(|_| MonitorError::Stopped)?;
        rx.await.map_err(|_| MonitorError::Stopped)?
    }

    pub async fn disconnect(&self) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply })
            .map_err(|_| MonitorError::Stopped)?;
        rx.await.map_err(|_| MonitorError::Stopped)
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendSnapshot> {
        self.snapshots.clone()
    }
}

struct Driver {
    supervisor: StreamSupervisor,
    backend: Arc<dyn InputBackend>,
    connector: Arc<dyn EventConnector>,
    /// Cancels the live channel reader
    channel: Option<CancellationToken>,
    /// Cancels the pending reopen timer
    reopen: Option<CancellationToken>,
    channel_tx: mpsc::UnboundedSender<ChannelMessage>,
    notices: mpsc::UnboundedSender<Notice>,
    snapshots: watch::Sender<BackendSnapshot>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut channel_rx: mpsc::UnboundedReceiver<ChannelMessage>,
    ) {
        debug!("Backend monitor started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect { device_path, reply }) => {
                        let result = self.connect(&device_path).await;
                        self.publish();
                        let _ = reply.send(result);
                    }
                    Some(Command::Disconnect { reply }) => {
                        self.disconnect().await;
                        self.publish();
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(message) = channel_rx.recv() => {
                    let effects = match message {
                        ChannelMessage::Payload { generation, data } => {
                            self.supervisor.on_message(generation, &data)
                        }
                        ChannelMessage::Failed { generation, reason } => {
                            self.supervisor.on_channel_failure(generation, &reason)
                        }
                        ChannelMessage::ReopenDue { generation } => {
                            self.supervisor.on_reopen_due(generation)
                        }
                    };
                    self.apply(effects);
                }
            }
            self.publish();
        }

        self.close_channel();
        self.cancel_reopen();
        debug!("Backend monitor stopped");
    }

    async fn connect(&mut self, device_path: &str) -> Result<String, MonitorError> {
        if self.supervisor.connection().is_connected() {
            info!("Replacing backend device connection");
            self.disconnect().await;
            self.publish();
        }

        match self.backend.connect(device_path).await {
            Ok(device_name) => {
                let effects = self.supervisor.connected(device_path, &device_name);
                self.apply(effects);
                Ok(device_name)
            }
            Err(e) => {
                let effects = self.supervisor.connect_failed(&e.to_string());
                self.apply(effects);
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        let effects = self.supervisor.disconnect();
        self.apply(effects);
        if let Err(e) = self.backend.disconnect().await {
            warn!("Backend disconnect request failed: {}", e);
            let _ = self.notices.send(Notice::DisconnectFailed(e.to_string()));
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Open { generation } => self.open_channel(generation),
                Effect::Close => self.close_channel(),
                Effect::ScheduleReopen { generation, delay } => {
                    self.schedule_reopen(generation, delay)
                }
                Effect::CancelReopen => self.cancel_reopen(),
                Effect::Notify(notice) => {
                    let _ = self.notices.send(notice);
                }
            }
        }
    }

    fn open_channel(&mut self, generation: u64) {
        self.close_channel();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let connector = Arc::clone(&self.connector);
        let tx = self.channel_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Event channel {} closed", generation);
                }
                _ = read_channel(connector, generation, tx) => {}
            }
        });

        self.channel = Some(cancel);
    }

    fn close_channel(&mut self) {
        if let Some(token) = self.channel.take() {
            token.cancel();
        }
    }

    fn schedule_reopen(&mut self, generation: u64, delay: Duration) {
        self.cancel_reopen();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.channel_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Reopen for channel {} cancelled", generation);
                }
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(ChannelMessage::ReopenDue { generation });
                }
            }
        });

        self.reopen = Some(cancel);
    }

    fn cancel_reopen(&mut self) {
        if let Some(token) = self.reopen.take() {
            token.cancel();
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.supervisor.snapshot());
    }
}

/// Pump one channel into the driver until it fails or closes
async fn read_channel(
    connector: Arc<dyn EventConnector>,
    generation: u64,
    tx: mpsc::UnboundedSender<ChannelMessage>,
) {
    let mut channel = match connector.open().await {
        Ok(channel) => channel,
        Err(e) => {
            let _ = tx.send(ChannelMessage::Failed {
                generation,
                reason: e.to_string(),
            });
            return;
        }
    };
    debug!("Event channel {} open", generation);

    while let Some(item) = channel.next().await {
        match item {
            Ok(data) => {
                if tx.send(ChannelMessage::Payload { generation, data }).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(ChannelMessage::Failed {
                    generation,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }

    let _ = tx.send(ChannelMessage::Failed {
        generation,
        reason: "event stream closed".to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{"event_name":"BTN_SOUTH","value":1,"timestamp":1700000000.5}"#;

    fn connected() -> (StreamSupervisor, u64) {
        let mut supervisor = StreamSupervisor::new(&StreamSettings::default());
        let effects = supervisor.connected("/dev/input/event3", "Wireless Controller");
        let generation = match effects.first() {
            Some(Effect::Open { generation }) => *generation,
            other => panic!("expected Open, got {other:?}"),
        };
        (supervisor, generation)
    }

    fn scheduled_delay(effects: &[Effect]) -> Option<Duration> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleReopen { delay, .. } => Some(*delay),
            _ => None,
        })
    }

    /// Fail the current channel, fire its reopen, return the delay and new generation
    fn fail_and_reopen(supervisor: &mut StreamSupervisor, generation: u64) -> (Duration, u64) {
        let effects = supervisor.on_channel_failure(generation, "reset by peer");
        let delay = scheduled_delay(&effects).expect("reopen scheduled");
        let effects = supervisor.on_reopen_due(generation);
        match effects.as_slice() {
            [Effect::Open { generation }] => (delay, *generation),
            other => panic!("expected Open, got {other:?}"),
        }
    }

    #[test]
    fn connect_opens_channel_and_notifies() {
        let (supervisor, generation) = connected();
        assert_eq!(supervisor.phase(), StreamPhase::Open);
        assert_eq!(supervisor.generation(), generation);
        assert_eq!(
            supervisor.connection().identity(),
            Some("Wireless Controller")
        );
    }

    #[test]
    fn events_go_to_history() {
        let (mut supervisor, generation) = connected();
        assert!(supervisor.on_message(generation, EVENT).is_empty());
        assert_eq!(supervisor.history().len(), 1);
        assert_eq!(
            supervisor.history().iter().next().unwrap().event_name,
            "BTN_SOUTH"
        );
    }

    #[test]
    fn malformed_payload_keeps_channel() {
        let (mut supervisor, generation) = connected();
        let effects = supervisor.on_message(generation, "{oops");
        assert!(matches!(
            &effects[..],
            [Effect::Notify(Notice::ParseError(_))]
        ));
        assert_eq!(supervisor.phase(), StreamPhase::Open);
        assert_eq!(supervisor.reconnect().attempts(), 0);
        assert!(supervisor.history().is_empty());
    }

    #[test]
    fn backoff_sequence_then_forced_disconnect() {
        let (mut supervisor, mut generation) = connected();
        let mut delays = Vec::new();
        for _ in 0..5 {
            let (delay, next) = fail_and_reopen(&mut supervisor, generation);
            delays.push(delay.as_millis());
            generation = next;
        }
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 32000]);

        let effects = supervisor.on_channel_failure(generation, "refused");
        assert_eq!(scheduled_delay(&effects), None);
        assert!(effects.contains(&Effect::Notify(Notice::MaxRetriesExceeded { attempts: 5 })));
        assert_eq!(supervisor.phase(), StreamPhase::Disconnected);
        assert!(!supervisor.connection().is_connected());
        assert_eq!(
            supervisor.connection().last_error(),
            Some("max retries exceeded")
        );
    }

    #[test]
    fn success_resets_backoff() {
        let (mut supervisor, generation) = connected();
        let (_, generation) = fail_and_reopen(&mut supervisor, generation);
        let (second, generation) = fail_and_reopen(&mut supervisor, generation);
        assert_eq!(second, Duration::from_millis(4000));

        supervisor.on_message(generation, EVENT);
        assert_eq!(supervisor.reconnect().attempts(), 0);
        let (after_success, _) = fail_and_reopen(&mut supervisor, generation);
        assert_eq!(after_success, Duration::from_millis(2000));
    }

    #[test]
    fn disconnect_during_backoff_cancels_reopen() {
        let (mut supervisor, generation) = connected();
        supervisor.on_channel_failure(generation, "eof");
        assert_eq!(supervisor.phase(), StreamPhase::Reconnecting);

        let effects = supervisor.disconnect();
        assert!(effects.contains(&Effect::CancelReopen));
        // A timer that raced the cancellation is ignored
        assert!(supervisor.on_reopen_due(generation).is_empty());
        assert_eq!(supervisor.phase(), StreamPhase::Disconnected);
        assert_eq!(supervisor.reconnect().attempts(), 0);
    }

    #[test]
    fn duplicate_reopen_is_ignored() {
        let (mut supervisor, generation) = connected();
        supervisor.on_channel_failure(generation, "eof");
        assert_eq!(supervisor.on_reopen_due(generation).len(), 1);
        assert!(supervisor.on_reopen_due(generation).is_empty());
    }

    #[test]
    fn stale_channel_cannot_append() {
        let (mut supervisor, old) = connected();
        supervisor.disconnect();
        let effects = supervisor.connected("/dev/input/event9", "Arcade Stick");
        assert!(matches!(effects[0], Effect::Open { generation } if generation != old));

        supervisor.on_message(old, EVENT);
        assert!(supervisor.history().is_empty());
        assert!(supervisor.on_channel_failure(old, "late").is_empty());
        assert_eq!(supervisor.phase(), StreamPhase::Open);
    }

    #[test]
    fn failure_after_disconnect_is_ignored() {
        let (mut supervisor, generation) = connected();
        supervisor.disconnect();
        assert!(supervisor.on_channel_failure(generation, "closed").is_empty());
        assert_eq!(supervisor.reconnect().attempts(), 0);
    }

    #[test]
    fn failed_connect_leaves_disconnected() {
        let mut supervisor = StreamSupervisor::new(&StreamSettings::default());
        let effects = supervisor.connect_failed("No such device");
        assert!(effects.contains(&Effect::Notify(Notice::ConnectFailed(
            "No such device".into()
        ))));
        assert_eq!(supervisor.phase(), StreamPhase::Disconnected);
        assert!(!supervisor.connection().is_connected());
        assert_eq!(supervisor.connection().last_error(), Some("No such device"));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut supervisor = StreamSupervisor::new(&StreamSettings::default());
        supervisor.disconnect();
        supervisor.disconnect();
        assert_eq!(supervisor.snapshot(), BackendSnapshot::default());
    }

    #[test]
    fn notice_messages() {
        assert_eq!(
            Notice::MaxRetriesExceeded { attempts: 5 }.to_string(),
            "Event stream failed, maximum retries reached (5)"
        );
        assert!(Notice::ParseError("x".into()).is_error());
        assert!(!Notice::Disconnected.is_error());
    }
}

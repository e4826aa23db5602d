//! End-to-end behaviour of the backend monitor against scripted collaborators

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use joymap_monitor::{
    BackendMonitor, EventChannel, EventConnector, InputBackend, MonitorError, Notice, StreamPhase,
    StreamSettings,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

const EVENT_A: &str = r#"{"event_name":"BTN_SOUTH","value":1,"timestamp":1700000000.0}"#;
const EVENT_B: &str = r#"{"event_name":"ABS_X","value":-0.5,"timestamp":1700000001.0}"#;

#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl InputBackend for FakeBackend {
    async fn connect(&self, device_path: &str) -> Result<String, MonitorError> {
        self.calls.lock().push(format!("connect {device_path}"));
        if device_path == "/dev/missing" {
            return Err(MonitorError::ConnectRejected("No such device".into()));
        }
        Ok(format!("Pad at {device_path}"))
    }

    async fn disconnect(&self) -> Result<(), MonitorError> {
        self.calls.lock().push("disconnect".into());
        Ok(())
    }
}

enum Script {
    /// `open` fails outright
    Refuse,
    /// Yield these payloads, then end the channel
    Burst(Vec<&'static str>),
    /// Stay open; payloads are pushed through the returned sender
    Live,
}

/// Connector following a per-open script; refuses once the script runs out
#[derive(Default)]
struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    opens: Mutex<Vec<Instant>>,
    live: Mutex<Vec<mpsc::UnboundedSender<Result<String, MonitorError>>>>,
}

impl ScriptedConnector {
    fn with(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    fn opens(&self) -> Vec<Instant> {
        self.opens.lock().clone()
    }

    fn live(&self, index: usize) -> mpsc::UnboundedSender<Result<String, MonitorError>> {
        self.live.lock()[index].clone()
    }
}

#[async_trait]
impl EventConnector for ScriptedConnector {
    async fn open(&self) -> Result<EventChannel, MonitorError> {
        self.opens.lock().push(Instant::now());
        let step = self.script.lock().pop_front().unwrap_or(Script::Refuse);
        match step {
            Script::Refuse => Err(MonitorError::Channel("connection refused".into())),
            Script::Burst(items) => Ok(futures::stream::iter(
                items.into_iter().map(|s| Ok(s.to_string())),
            )
            .boxed()),
            Script::Live => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.live.lock().push(tx);
                Ok(futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed())
            }
        }
    }
}

fn spawn(
    connector: &Arc<ScriptedConnector>,
) -> (Arc<FakeBackend>, BackendMonitor, mpsc::UnboundedReceiver<Notice>) {
    let backend = Arc::new(FakeBackend::default());
    let (monitor, notices) = BackendMonitor::spawn(
        backend.clone(),
        connector.clone(),
        StreamSettings::default(),
    );
    (backend, monitor, notices)
}

fn gaps_ms(opens: &[Instant]) -> Vec<u128> {
    opens.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn delays_double_until_ceiling_then_disconnect() {
    let connector = Arc::new(ScriptedConnector::default());
    let (backend, monitor, mut notices) = spawn(&connector);

    monitor.connect("/dev/input/event3").await.unwrap();
    loop {
        match notices.recv().await {
            Some(Notice::MaxRetriesExceeded { attempts }) => {
                assert_eq!(attempts, 5);
                break;
            }
            Some(_) => continue,
            None => panic!("monitor stopped"),
        }
    }

    assert_eq!(gaps_ms(&connector.opens()), vec![2000, 4000, 8000, 16000, 32000]);
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.phase, StreamPhase::Disconnected);
    assert!(!snapshot.connection.is_connected());
    assert_eq!(snapshot.connection.last_error(), Some("max retries exceeded"));

    // Nothing further is scheduled
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.opens().len(), 6);
    // Giving up is local; the backend is not asked to release the device
    assert_eq!(backend.calls(), vec!["connect /dev/input/event3"]);
}

#[tokio::test(start_paused = true)]
async fn event_resets_delay_sequence() {
    let connector = Arc::new(ScriptedConnector::with(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Burst(vec![EVENT_A]),
        Script::Refuse,
    ]));
    let (_backend, monitor, _notices) = spawn(&connector);

    monitor.connect("/dev/input/event3").await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;

    // 2s, 4s, then the burst succeeds and the next failure starts over at 2s
    let gaps = gaps_ms(&connector.opens());
    assert_eq!(&gaps[..4], &[2000, 4000, 2000, 4000]);
    assert_eq!(monitor.snapshot().history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reopen() {
    let connector = Arc::new(ScriptedConnector::default());
    let (backend, monitor, _notices) = spawn(&connector);
    let mut snapshots = monitor.subscribe();

    monitor.connect("/dev/input/event3").await.unwrap();
    snapshots
        .wait_for(|s| s.phase == StreamPhase::Reconnecting)
        .await
        .unwrap();

    monitor.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(connector.opens().len(), 1);
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.phase, StreamPhase::Disconnected);
    assert_eq!(snapshot.attempts, 0);
    assert_eq!(
        backend.calls(),
        vec!["connect /dev/input/event3", "disconnect"]
    );
}

#[tokio::test(start_paused = true)]
async fn switching_device_drops_old_channel() {
    let connector = Arc::new(ScriptedConnector::with(vec![Script::Live, Script::Live]));
    let (backend, monitor, _notices) = spawn(&connector);

    monitor.connect("/dev/input/event3").await.unwrap();
    settle().await;
    let first = connector.live(0);
    first.send(Ok(EVENT_A.into())).unwrap();
    settle().await;
    assert_eq!(monitor.snapshot().history.len(), 1);

    let name = monitor.connect("/dev/input/event7").await.unwrap();
    assert_eq!(name, "Pad at /dev/input/event7");
    settle().await;
    assert!(first.is_closed());

    // Late traffic on the old channel never reaches the new history
    let _ = first.send(Ok(EVENT_A.into()));
    connector.live(1).send(Ok(EVENT_B.into())).unwrap();
    settle().await;

    let snapshot = monitor.snapshot();
    let names: Vec<_> = snapshot.history.iter().map(|e| e.event_name.as_str()).collect();
    assert_eq!(names, vec!["ABS_X"]);
    assert_eq!(snapshot.connection.identity(), Some("Pad at /dev/input/event7"));
    assert_eq!(
        backend.calls(),
        vec![
            "connect /dev/input/event3",
            "disconnect",
            "connect /dev/input/event7"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_a_notice_only() {
    let connector = Arc::new(ScriptedConnector::with(vec![Script::Live]));
    let (_backend, monitor, mut notices) = spawn(&connector);

    monitor.connect("/dev/input/event3").await.unwrap();
    settle().await;
    let channel = connector.live(0);
    channel.send(Ok("not json".into())).unwrap();
    channel.send(Ok(EVENT_B.into())).unwrap();
    settle().await;

    assert!(matches!(notices.recv().await, Some(Notice::Connected { .. })));
    assert!(matches!(notices.recv().await, Some(Notice::ParseError(_))));
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.phase, StreamPhase::Open);
    assert_eq!(snapshot.attempts, 0);
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(connector.opens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_connect_stays_disconnected() {
    let connector = Arc::new(ScriptedConnector::default());
    let (_backend, monitor, mut notices) = spawn(&connector);

    let err = monitor.connect("/dev/missing").await.unwrap_err();
    assert_eq!(err, MonitorError::ConnectRejected("No such device".into()));
    settle().await;

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.phase, StreamPhase::Disconnected);
    assert!(!snapshot.connection.is_connected());
    assert!(snapshot.connection.last_error().is_some());
    assert!(connector.opens().is_empty());
    assert!(matches!(notices.recv().await, Some(Notice::ConnectFailed(_))));
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_channel() {
    let connector = Arc::new(ScriptedConnector::with(vec![Script::Live]));
    let (_backend, monitor, _notices) = spawn(&connector);

    monitor.connect("/dev/input/event3").await.unwrap();
    settle().await;
    let channel = connector.live(0);
    monitor.shutdown().await;
    settle().await;
    assert!(channel.is_closed());
}

#[tokio::test(start_paused = true)]
async fn handle_drives_monitor_from_spawned_task() {
    let connector = Arc::new(ScriptedConnector::with(vec![Script::Live]));
    let (backend, monitor, _notices) = spawn(&connector);

    let handle = monitor.handle();
    let request = tokio::spawn(async move { handle.connect("/dev/input/event3").await });
    assert_eq!(request.await.unwrap().unwrap(), "Pad at /dev/input/event3");
    settle().await;
    assert_eq!(monitor.snapshot().phase, StreamPhase::Open);

    let handle = monitor.handle();
    monitor.shutdown().await;
    assert_eq!(handle.disconnect().await, Err(MonitorError::Stopped));
    assert_eq!(backend.calls(), vec!["connect /dev/input/event3"]);
}

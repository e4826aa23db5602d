//! Service requests issued from the dashboard
//!
//! Each request runs on its own task and reports back over a channel, so the
//! run loop keeps drawing and sampling while the service is slow.

use joymap_monitor::MonitorHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::app::{Action, ActionOutcome};
use crate::api::ApiClient;

/// Run `action` in the background; the outcome is sent on `tx`
pub fn spawn_action(
    action: Action,
    api: ApiClient,
    monitor: MonitorHandle,
    tx: mpsc::UnboundedSender<ActionOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = run_action(action, &api, &monitor).await;
        // Receiver is gone once the dashboard quits
        let _ = tx.send(outcome);
    })
}

async fn run_action(action: Action, api: &ApiClient, monitor: &MonitorHandle) -> ActionOutcome {
    debug!("Running {:?}", action);
    match action {
        Action::RefreshDevices => {
            let result = api.list_input_devices().await.map_err(|e| {
                error!("Failed to list devices: {}", e);
                e.to_string()
            });
            ActionOutcome::Devices(result)
        }
        Action::LoadDeviceInfo => {
            let result = api.device_info().await.map_err(|e| {
                error!("Failed to load device info: {}", e);
                e.to_string()
            });
            ActionOutcome::DeviceInfo(result)
        }
        Action::Connect(path) => {
            let result = monitor.connect(&path).await.map_err(|e| e.to_string());
            ActionOutcome::Connect { path, result }
        }
        Action::Disconnect => {
            ActionOutcome::Disconnect(monitor.disconnect().await.map_err(|e| e.to_string()))
        }
    }
}

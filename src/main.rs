//! joymap: terminal client for the joystick mapping service
//!
//! Main entry point, subcommands and the dashboard run loop.

use std::io::{stdout, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures::StreamExt;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use joymap::api::{ApiClient, Mapping};
use joymap::config::MonitorConfig;
use joymap::tui::{render, spawn_action, Action, App};
use joymap_monitor::{
    backend_view, BackendMonitor, BackendSnapshot, GilrsHost, HttpEventConnector, Notice,
    PollerLoop,
};

#[derive(Parser)]
#[command(name = "joymap")]
#[command(about = "Client and live device monitor for the joystick mapping service")]
struct Cli {
    /// Config file path (default: ~/.config/joymap/monitor.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mapping service URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Live dashboard for the local controller and the backend device (default)
    Monitor,
    /// Connect a backend device and log its events until Ctrl+C
    Watch {
        /// Device path as listed by `joymap devices`
        device_path: String,
    },
    /// Show the virtual output device and service health
    Device,
    /// List input devices known to the service
    Devices,
    /// List mappings
    Mappings {
        /// Only mappings of this type (keyboard, keyboard_combo, dpad_horizontal, dpad_vertical)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
        /// Only event names containing this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Inspect or edit a single mapping
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },
    /// Export the full configuration as JSON
    Export {
        #[arg(short, long, default_value = "joystick_mappings.json")]
        output: PathBuf,
    },
    /// Replace the configuration from a JSON file
    Import { file: PathBuf },
    /// Make the service re-read its configuration file
    Reload,
    /// List key names usable in mappings
    Keys,
    /// Rename the virtual output device
    Rename { device_name: String },
}

#[derive(Subcommand)]
enum MappingAction {
    /// Print a mapping as JSON
    Get { event_name: String },
    /// Create or replace a mapping from JSON (file or stdin)
    Set {
        event_name: String,
        /// JSON file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Remove a mapping
    Delete { event_name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they stay off the dashboard
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(MonitorConfig::default_path);
    debug!("Loading config from {:?}", config_path);
    let mut config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let api = ApiClient::new(&config.server_url, config.request_timeout())?;

    match cli.command.unwrap_or(Command::Monitor) {
        Command::Monitor => run_monitor(config, api).await,
        Command::Watch { device_path } => run_watch(config, api, &device_path).await,
        Command::Device => {
            let info = api.device_info().await?;
            let healthy = api.health().await.unwrap_or_else(|e| {
                warn!("Health check failed: {}", e);
                false
            });
            println!("Device:   {}", info.device_name);
            println!("Config:   {}", info.config_path);
            println!("Mappings: {}", info.mappings_count);
            println!("Service:  {}", if healthy { "ok" } else { "unhealthy" });
            Ok(())
        }
        Command::Devices => {
            let devices = api.list_input_devices().await?;
            if devices.is_empty() {
                println!("No input devices found");
            }
            for device in devices {
                let gamepad = if device.is_gamepad { "  [gamepad]" } else { "" };
                println!("{:<24} {}{}", device.path, device.name, gamepad);
            }
            Ok(())
        }
        Command::Mappings { kind, search } => {
            let set = api.mappings().await?;
            println!("Device: {}", set.device_name);
            let mut shown = 0;
            for (name, mapping) in set.filter(kind.as_deref(), search.as_deref()) {
                shown += 1;
                println!(
                    "{:<20} {:<18} {}",
                    name,
                    mapping.kind_label(),
                    mapping.summary()
                );
                if let Some(description) = &mapping.description {
                    println!("{:<20} {}", "", description);
                }
            }
            println!("{} of {} mappings", shown, set.mappings.len());
            Ok(())
        }
        Command::Mapping { action } => run_mapping(&api, action).await,
        Command::Export { output } => {
            let document = api.export().await?;
            std::fs::write(&output, serde_json::to_string_pretty(&document)?)?;
            println!("Configuration exported to {}", output.display());
            Ok(())
        }
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let document: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let ack = api.import(&document).await?;
            println!(
                "{} ({} mappings)",
                ack.message.as_deref().unwrap_or("Configuration imported"),
                ack.mappings_count.unwrap_or_default()
            );
            Ok(())
        }
        Command::Reload => {
            let ack = api.reload().await?;
            println!(
                "{} ({} mappings)",
                ack.message.as_deref().unwrap_or("Configuration reloaded"),
                ack.mappings_count.unwrap_or_default()
            );
            Ok(())
        }
        Command::Keys => {
            let keys = api.available_keys().await?;
            println!("Keys: {}", keys.keys.join(" "));
            println!("Modifiers: {}", keys.modifiers.join(" "));
            Ok(())
        }
        Command::Rename { device_name } => {
            api.set_device_name(&device_name).await?;
            println!("Device renamed to {device_name}");
            Ok(())
        }
    }
}

async fn run_mapping(api: &ApiClient, action: MappingAction) -> Result<()> {
    match action {
        MappingAction::Get { event_name } => {
            let mapping = api.mapping(&event_name).await?;
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }
        MappingAction::Set { event_name, file } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let mapping: Mapping =
                serde_json::from_str(&content).context("Mapping must be a JSON object")?;
            api.put_mapping(&event_name, &mapping).await?;
            println!("Saved {event_name}");
        }
        MappingAction::Delete { event_name } => {
            api.delete_mapping(&event_name).await?;
            println!("Deleted {event_name}");
        }
    }
    Ok(())
}

fn spawn_backend_monitor(
    config: &MonitorConfig,
    api: &ApiClient,
) -> Result<(BackendMonitor, mpsc::UnboundedReceiver<Notice>)> {
    // The event stream is long-lived; no overall request timeout
    let stream_client = reqwest::Client::builder()
        .connect_timeout(config.request_timeout())
        .build()?;
    let connector = HttpEventConnector::new(stream_client, &config.server_url);
    info!("Event stream endpoint: {}", connector.url());

    Ok(BackendMonitor::spawn(
        Arc::new(api.clone()),
        Arc::new(connector),
        config.stream_settings(),
    ))
}

/// Headless: log backend events until Ctrl+C or the stream gives up
async fn run_watch(config: MonitorConfig, api: ApiClient, device_path: &str) -> Result<()> {
    let (monitor, mut notices) = spawn_backend_monitor(&config, &api)?;
    let mut snapshots = monitor.subscribe();

    let device_name = monitor.connect(device_path).await?;
    info!("Watching {} ({}). Press Ctrl+C to exit.", device_name, device_path);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0u64;
    let mut failure = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            notice = notices.recv() => match notice {
                Some(Notice::MaxRetriesExceeded { attempts }) => {
                    failure = Some(format!("event stream lost after {attempts} reconnect attempts"));
                    break;
                }
                Some(notice) if notice.is_error() => warn!("{}", notice),
                Some(notice) => info!("{}", notice),
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                printed = print_new_events(&snapshot, printed);
            }
        }
    }

    if failure.is_none() {
        if let Err(e) = monitor.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
    }
    monitor.shutdown().await;

    match failure {
        Some(reason) => bail!(reason),
        None => Ok(()),
    }
}

/// Print events received since `printed`, oldest first; returns the new count
fn print_new_events(snapshot: &BackendSnapshot, printed: u64) -> u64 {
    let fresh = snapshot.received.saturating_sub(printed) as usize;
    if fresh == 0 {
        return snapshot.received;
    }
    let view = backend_view(&snapshot.connection, &snapshot.history, fresh);
    for row in view.recent.iter().rev() {
        println!(
            "{}  {:<7} {:<16} {:>8.2}",
            row.time,
            format!("{:?}", row.kind).to_lowercase(),
            row.name,
            row.value
        );
    }
    snapshot.received
}

/// Run the dashboard
async fn run_monitor(config: MonitorConfig, api: ApiClient) -> Result<()> {
    let (monitor, mut notices) = spawn_backend_monitor(&config, &api)?;
    let mut snapshots = monitor.subscribe();

    // Controller sampling runs on its own thread
    let (poll_tx, mut poll_rx) = mpsc::unbounded_channel();
    let mut poller = PollerLoop::new();
    poller.start(GilrsHost::new, config.tick(), poll_tx)?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    // Service requests run off the loop and report back here
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let dispatch = |app: &mut App, action: Action| {
        app.begin(&action);
        spawn_action(action, api.clone(), monitor.handle(), outcome_tx.clone());
    };

    let mut app = App::new(config);
    dispatch(&mut app, Action::LoadDeviceInfo);
    dispatch(&mut app, Action::RefreshDevices);

    let mut events = EventStream::new();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|f| render::render(f, &app)) {
            break Err(e.into());
        }

        tokio::select! {
            // Terminal events
            event = events.next() => {
                if let Some(Ok(event)) = event {
                    if let Some(action) = handle_event(&mut app, event) {
                        dispatch(&mut app, action);
                    }
                }
            }

            Some(update) = poll_rx.recv() => app.apply_poller_update(update),

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                app.set_backend(snapshots.borrow_and_update().clone());
            }

            Some(notice) = notices.recv() => app.apply_notice(notice),

            Some(outcome) = outcome_rx.recv() => app.apply_outcome(outcome),
        }

        if app.should_quit {
            break Ok(());
        }
    };

    // Cleanup
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    poller.stop();
    if app.backend.connection.is_connected() {
        if let Err(e) = monitor.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
    }
    monitor.shutdown().await;

    result
}

/// Handle terminal events
fn handle_event(app: &mut App, event: Event) -> Option<Action> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = !app.show_help,
        KeyCode::Esc => app.show_help = false,
        KeyCode::Char('d') => return Some(Action::RefreshDevices),
        KeyCode::Char('x') => return Some(Action::Disconnect),
        KeyCode::Up => app.select_prev(),
        KeyCode::Down => app.select_next(),
        KeyCode::Enter => return app.connect_selected(),
        _ => {}
    }
    None
}

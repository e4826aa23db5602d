//! TUI rendering logic

use joymap_monitor::{AxisRow, AxisZone, BackendView, ButtonRow, ControllerView, EventKind, StreamPhase};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::tui::app::App;

/// Buttons per line in the controller panel
const BUTTONS_PER_LINE: usize = 6;

/// Render the entire application UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(10),   // Panels
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    render_title(frame, app, chunks[0]);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    render_controller_panel(frame, &app.controller_view(), panels[0]);
    render_backend_panel(frame, app, panels[1]);

    render_status_bar(frame, app, chunks[2]);

    if app.show_help {
        render_help_overlay(frame);
    }
}

fn render_title(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " joymap monitor ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}", app.config.server_url),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(info) = &app.device_info {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            info.device_name.clone(),
            Style::default().fg(Color::Cyan),
        ));
        spans.push(Span::styled(
            format!(" ({} mappings)", info.mappings_count),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let line = Line::from(spans);
    let widget = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn connection_span(connected: bool, status: &str) -> Span<'static> {
    let color = if connected { Color::Green } else { Color::Red };
    Span::styled(format!("● {status}"), Style::default().fg(color))
}

// ------------------------------------------------------------------
// Local controller
// ------------------------------------------------------------------

fn render_controller_panel(frame: &mut Frame, view: &ControllerView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Local Controller ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let button_lines = view.buttons.len().div_ceil(BUTTONS_PER_LINE) as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),                // Status
            Constraint::Length(button_lines + 1), // Buttons
            Constraint::Min(0),                   // Axes
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Line::from(connection_span(view.connected, &view.status))),
        chunks[0],
    );

    if !view.connected {
        let hint = Paragraph::new("Press any button on a controller to activate it")
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(hint, chunks[1]);
        return;
    }

    let lines: Vec<Line> = view
        .buttons
        .chunks(BUTTONS_PER_LINE)
        .map(|row| Line::from(row.iter().flat_map(button_spans).collect::<Vec<_>>()))
        .collect();
    frame.render_widget(Paragraph::new(lines), chunks[1]);

    render_axes(frame, &view.axes, chunks[2]);
}

fn button_spans(button: &ButtonRow) -> [Span<'static>; 2] {
    let level = (button.intensity * 255.0).round().clamp(0.0, 255.0) as u8;
    let mut style = Style::default().fg(Color::Rgb(level, level, level));
    if button.pressed {
        style = style.bg(Color::Green).add_modifier(Modifier::BOLD);
    }
    let index = button.label.trim_start_matches("Button ");
    [
        Span::styled(format!("{index:>2}:{:.2}", button.value), style),
        Span::raw(" "),
    ]
}

fn render_axes(frame: &mut Frame, axes: &[AxisRow], area: Rect) {
    if axes.is_empty() {
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(axes.iter().map(|_| Constraint::Length(1)))
        .split(area);

    for (axis, row) in axes.iter().zip(rows.iter()) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(14), // Label
                Constraint::Min(10),    // Bar
                Constraint::Length(7),  // Value
            ])
            .split(*row);

        frame.render_widget(Paragraph::new(axis.label.as_str()), chunks[0]);
        render_axis_bar(frame, axis, chunks[1]);
        frame.render_widget(
            Paragraph::new(format!("{:>6.2}", axis.value)),
            chunks[2],
        );
    }
}

/// Centre-origin bar with a marker at the axis position
fn render_axis_bar(frame: &mut Frame, axis: &AxisRow, area: Rect) {
    let width = area.width as usize;
    if width < 3 {
        return;
    }

    let color = match axis.zone {
        AxisZone::Neutral => Color::DarkGray,
        AxisZone::Active => Color::Cyan,
    };
    let center = width / 2;
    let marker = ((axis.position / 100.0) * (width - 1) as f64).round() as usize;
    let (lo, hi) = (center.min(marker), center.max(marker));

    let spans: Vec<Span> = (0..width)
        .map(|i| {
            if i == marker {
                Span::styled("█", Style::default().fg(color))
            } else if i == center {
                Span::styled("|", Style::default().fg(Color::White))
            } else if i > lo && i < hi {
                Span::styled("=", Style::default().fg(color))
            } else {
                Span::styled("-", Style::default().fg(Color::DarkGray))
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ------------------------------------------------------------------
// Backend device
// ------------------------------------------------------------------

fn render_backend_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Backend Input Device ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let view = app.backend_view();
    let device_rows = (app.devices.len().min(6) as u16).max(1);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(device_rows + 1), // Device list
            Constraint::Length(2),               // Status
            Constraint::Min(3),                  // Events
            Constraint::Length(3),               // Distinct names
        ])
        .split(inner);

    render_device_list(frame, app, chunks[0]);
    render_backend_status(frame, app, &view, chunks[1]);
    render_events(frame, &view, chunks[2]);
    render_event_names(frame, &view, chunks[3]);
}

fn render_device_list(frame: &mut Frame, app: &App, area: Rect) {
    if app.devices.is_empty() {
        let hint = Paragraph::new("No devices listed (d to refresh)")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hint, area);
        return;
    }

    // Keep the selection visible
    let visible = area.height.saturating_sub(1).max(1) as usize;
    let first = app.selected_device.saturating_sub(visible - 1);
    let lines: Vec<Line> = app
        .devices
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .map(|(i, device)| {
            let selected = i == app.selected_device;
            let marker = if selected { "> " } else { "  " };
            let gamepad = if device.is_gamepad { " [gamepad]" } else { "" };
            let style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{marker}{} ({}){gamepad}", device.name, device.path),
                style,
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_backend_status(frame: &mut Frame, app: &App, view: &BackendView, area: Rect) {
    let mut spans = vec![connection_span(view.connected, &view.status)];
    if app.backend.phase == StreamPhase::Reconnecting {
        spans.push(Span::styled(
            format!(
                "  reconnecting ({}/{})",
                app.backend.attempts, app.config.stream.max_attempts
            ),
            Style::default().fg(Color::Yellow),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_events(frame: &mut Frame, view: &BackendView, area: Rect) {
    let block = Block::default()
        .borders(Borders::TOP)
        .title(format!(" Recent events ({}) ", view.retained));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !view.connected {
        return;
    }
    if view.recent.is_empty() {
        let waiting = Paragraph::new("Waiting for input events...")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(waiting, inner);
        return;
    }

    let lines: Vec<Line> = view
        .recent
        .iter()
        .map(|row| {
            let (kind, color) = match row.kind {
                EventKind::Press => ("press  ", Color::Green),
                EventKind::Release => ("release", Color::Yellow),
            };
            Line::from(vec![
                Span::styled(format!("{} ", row.time), Style::default().fg(Color::DarkGray)),
                Span::styled(kind, Style::default().fg(color)),
                Span::styled(
                    format!(" {:<16}", row.name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{:>8.2}", row.value)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_event_names(frame: &mut Frame, view: &BackendView, area: Rect) {
    let block = Block::default().borders(Borders::TOP).title(" Seen ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let widget = Paragraph::new(view.distinct_names.join(", "))
        .style(Style::default().fg(Color::Cyan))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, inner);
}

// ------------------------------------------------------------------
// Chrome
// ------------------------------------------------------------------

/// Render status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let message = match &app.status_message {
        Some(message) => {
            let color = if app.status_is_error {
                Color::Red
            } else {
                Color::Green
            };
            Span::styled(message.clone(), Style::default().fg(color))
        }
        None => Span::raw(""),
    };

    let status_line = Line::from(vec![
        message,
        Span::raw(" | "),
        Span::styled(
            "? help | d devices | Enter connect | x disconnect | q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let widget = Paragraph::new(status_line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(widget, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect(60, 50, frame.area());

    let help_text = vec![
        Line::from("Keyboard Shortcuts"),
        Line::from(""),
        Line::from("d            Refresh backend device list"),
        Line::from("Up/Down      Select device"),
        Line::from("Enter        Connect selected device"),
        Line::from("x            Disconnect backend device"),
        Line::from("q            Quit"),
        Line::from("?            Toggle help"),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Helper to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

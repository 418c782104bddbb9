use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::Value;

use crate::app::{ProgressEvent, ProgressSink, ProgressSinkKind};
use crate::error::VizError;
use crate::viewer::{BakeOptions, DisplaySurface};

const EVENTS_MAX: usize = 8;
const SUMMARY_MAX: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolve,
    Fetch,
    Store,
    Render,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve",
            Phase::Fetch => "Fetch",
            Phase::Store => "Store",
            Phase::Render => "Render",
        }
    }
}

#[derive(Debug, Default)]
struct AppState {
    status: String,
    phase: Option<Phase>,
    events: VecDeque<String>,
    summary: Vec<String>,
    error: Option<String>,
    request_count: u64,
    active: bool,
}

pub struct Tui {
    kind: ProgressSinkKind,
    state: Arc<Mutex<AppState>>,
    input: String,
    started: Instant,
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = Some(phase);
                state.status = payload.to_string();
            } else {
                state.status = message.clone();
            }
            if message.starts_with("api.request") {
                state.request_count = state.request_count.saturating_add(1);
            }
            push_capped(&mut state.events, message, EVENTS_MAX);
        }
    }
}

/// Display surface for the interactive session: geometry payloads become
/// summary lines instead of a 3D widget.
pub struct TuiSurface {
    state: Arc<Mutex<AppState>>,
}

impl DisplaySurface for TuiSurface {
    fn show_packed(&mut self, key: &str, bytes: &[u8]) -> Result<(), VizError> {
        self.push(format!("viewer <- {key} ({} packed bytes)", bytes.len()));
        Ok(())
    }

    fn show_model(&mut self, model: &Value) -> Result<(), VizError> {
        let kind = model
            .get("type")
            .and_then(|value| value.as_str())
            .unwrap_or("Model");
        self.push(format!("host <- view {kind}"));
        Ok(())
    }

    fn offer_bake(&mut self, _model: &Value, options: &BakeOptions) -> Result<(), VizError> {
        self.push(format!(
            "host <- bake (layer {}, units {})",
            options.layer, options.units
        ));
        Ok(())
    }
}

impl TuiSurface {
    fn push(&mut self, line: String) {
        if let Ok(mut state) = self.state.lock() {
            push_capped(&mut state.events, line, EVENTS_MAX);
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                ..AppState::default()
            })),
            input: String::new(),
            started: Instant::now(),
        }
    }

    /// Surface bound to this TUI's state, for handing to the renderer.
    pub fn surface(&self) -> TuiSurface {
        TuiSurface {
            state: self.state.clone(),
        }
    }

    /// Marks an inline, recoverable error; shown until the next operation.
    pub fn show_error(&mut self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.error = Some(message.to_string());
        }
    }

    pub fn clear_error(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.error = None;
        }
    }

    /// Single-line text prompt. Enter submits, Esc leaves the session.
    pub fn prompt(&mut self, label: &str, initial: &str) -> miette::Result<Option<String>> {
        self.input = initial.to_string();

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let submitted = loop {
            if let Ok(state) = self.state.lock() {
                let elapsed = self.started.elapsed();
                terminal
                    .draw(|frame| draw_ui(frame, self.kind, &state, Some((label, &self.input)), elapsed))
                    .into_diagnostic()?;
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    match self.handle_input_key(key) {
                        InputAction::Submit => break Some(self.input.trim().to_string()),
                        InputAction::Cancel => break None,
                        InputAction::Pending => {}
                    }
                }
            }
        };

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        Ok(submitted)
    }

    /// Runs a pipeline step on a worker thread while drawing progress.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, VizError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let result = loop {
            if let Ok(state) = self.state.lock() {
                let elapsed = self.started.elapsed();
                terminal
                    .draw(|frame| draw_ui(frame, self.kind, &state, None, elapsed))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                break result;
            }

            // drain key events so the terminal stays responsive; the fetch
            // itself is not cancellable
            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                let _ = event::read().into_diagnostic()?;
            }
        };

        self.set_active(false);
        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        handle.join().ok();
        result.map_err(miette::Report::new)
    }

    /// Records the per-option EUI rows shown on the summary panel.
    pub fn set_summary(&mut self, header: String, rows: Vec<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.summary.clear();
            state.summary.push(header);
            state
                .summary
                .extend(rows.into_iter().take(SUMMARY_MAX));
            state.error = None;
        }
    }

    fn set_active(&mut self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.error = None;
            }
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> InputAction {
        if key.kind != KeyEventKind::Press {
            return InputAction::Pending;
        }
        match key.code {
            KeyCode::Enter => InputAction::Submit,
            KeyCode::Esc => InputAction::Cancel,
            KeyCode::Backspace => {
                self.input.pop();
                InputAction::Pending
            }
            KeyCode::Char(ch) => {
                self.input.push(ch);
                InputAction::Pending
            }
            _ => InputAction::Pending,
        }
    }
}

enum InputAction {
    Submit,
    Cancel,
    Pending,
}

fn draw_ui(
    frame: &mut ratatui::Frame,
    kind: ProgressSinkKind,
    state: &AppState,
    input: Option<(&str, &str)>,
    elapsed: Duration,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let title = match kind {
        ProgressSinkKind::Fetch => "parviz - fetch study",
        ProgressSinkKind::Chart => "parviz - chart",
        ProgressSinkKind::View => "parviz - view option",
    };
    let phase = state
        .phase
        .map(Phase::label)
        .unwrap_or(if state.active { "..." } else { "idle" });
    let header = Paragraph::new(Line::from(vec![
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            "  phase={phase}  requests={}  elapsed={}s",
            state.request_count,
            elapsed.as_secs()
        )),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let mut body: Vec<Line> = Vec::new();
    for line in &state.summary {
        body.push(Line::from(Span::styled(
            line.clone(),
            Style::default().fg(Color::Cyan),
        )));
    }
    if !state.summary.is_empty() && !state.events.is_empty() {
        body.push(Line::from(""));
    }
    for line in &state.events {
        body.push(Line::from(line.clone()));
    }
    let body = Paragraph::new(body)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("session"));
    frame.render_widget(body, chunks[1]);

    let mut footer: Vec<Line> = Vec::new();
    if let Some((label, value)) = input {
        footer.push(Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::Yellow)),
            Span::raw(value.to_string()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]));
    } else {
        footer.push(Line::from(state.status.clone()));
    }
    if let Some(error) = &state.error {
        footer.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    let footer = Paragraph::new(footer)
        .block(Block::default().borders(Borders::ALL).title("input"));
    frame.render_widget(footer, chunks[2]);
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (name, payload) = rest.split_once(';')?;
    let phase = match name.trim() {
        "Resolve" => Phase::Resolve,
        "Fetch" => Phase::Fetch,
        "Store" => Phase::Store,
        "Render" => Phase::Render,
        _ => return None,
    };
    Some((phase, payload.trim()))
}

fn push_capped(queue: &mut VecDeque<String>, line: String, cap: usize) {
    if queue.len() == cap {
        queue.pop_front();
    }
    queue.push_back(line);
}

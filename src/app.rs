//! Main application logic and TUI event loop.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tracing::{info, warn};

use crate::analysis::{AbTestReport, ColumnSelection};
use crate::cli::AppConfig;
use crate::warehouse::{CachedResult, CachedRunner, QueryResult, QueryRunner, WarehouseError};
use crate::ui::{
    chart::{ConversionChart, PosteriorChart},
    editor::{EditorPanel, QueryEditor},
    widgets::{ColumnSelector, SampleTable, StatsPanel, StatusBar},
    HelpOverlay, Theme,
};

/// Runner shared with the query worker thread
pub type SharedRunner = Arc<CachedRunner<Box<dyn QueryRunner + Send + Sync>>>;

type QueryOutcome = Result<CachedResult, WarehouseError>;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// The three column roles picked in the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Event1,
    Event2,
    Assignment,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 3] = [ColumnRole::Event1, ColumnRole::Event2, ColumnRole::Assignment];

    fn index(self) -> usize {
        match self {
            ColumnRole::Event1 => 0,
            ColumnRole::Event2 => 1,
            ColumnRole::Assignment => 2,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ColumnRole::Event1 => "Event 1 Column",
            ColumnRole::Event2 => "Event 2 Column",
            ColumnRole::Assignment => "Assignment Column",
        }
    }
}

/// Which panel is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    Editor,
    Selector(ColumnRole),
}

impl FocusedPanel {
    fn next(self) -> Self {
        match self {
            FocusedPanel::Editor => FocusedPanel::Selector(ColumnRole::Event1),
            FocusedPanel::Selector(ColumnRole::Event1) => FocusedPanel::Selector(ColumnRole::Event2),
            FocusedPanel::Selector(ColumnRole::Event2) => {
                FocusedPanel::Selector(ColumnRole::Assignment)
            }
            FocusedPanel::Selector(ColumnRole::Assignment) => FocusedPanel::Editor,
        }
    }

    fn prev(self) -> Self {
        match self {
            FocusedPanel::Editor => FocusedPanel::Selector(ColumnRole::Assignment),
            FocusedPanel::Selector(ColumnRole::Event1) => FocusedPanel::Editor,
            FocusedPanel::Selector(ColumnRole::Event2) => FocusedPanel::Selector(ColumnRole::Event1),
            FocusedPanel::Selector(ColumnRole::Assignment) => {
                FocusedPanel::Selector(ColumnRole::Event2)
            }
        }
    }
}

/// Pick the column for one role after a new result arrives.
///
/// Keeps the previous choice if the column still exists, then tries the
/// configured name, then falls back to the first column.
fn resolve_selection(
    columns: &[String],
    previous: Option<&str>,
    preferred: Option<&str>,
) -> Option<usize> {
    let find = |name: Option<&str>| name.and_then(|n| columns.iter().position(|c| c == n));
    find(previous)
        .or_else(|| find(preferred))
        .or(if columns.is_empty() { None } else { Some(0) })
}

/// Application state
pub struct App {
    // Configuration
    config: AppConfig,
    theme: Theme,
    project: String,

    // Data
    runner: SharedRunner,
    result: Option<Arc<QueryResult>>,
    from_cache: bool,
    columns: Vec<String>,
    selected: [Option<usize>; 3],
    report: Option<AbTestReport>,

    // In-flight query
    pending: Option<Receiver<QueryOutcome>>,
    spinner_frame: usize,

    // UI State
    editor: QueryEditor,
    focused: FocusedPanel,
    show_help: bool,

    // Exit flag
    should_quit: bool,

    // Error message to display (non-fatal)
    error_message: Option<String>,
}

impl App {
    /// Create a new App instance
    pub fn new(config: AppConfig, runner: SharedRunner, project: String) -> Self {
        let editor = QueryEditor::new(&config.initial_query);
        App {
            config,
            theme: Theme::default(),
            project,
            runner,
            result: None,
            from_cache: false,
            columns: Vec::new(),
            selected: [None; 3],
            report: None,
            pending: None,
            spinner_frame: 0,
            editor,
            focused: FocusedPanel::Editor,
            show_help: false,
            should_quit: false,
            error_message: None,
        }
    }

    /// Set an error message to display (non-fatal)
    pub fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    fn selected_name(&self, role: ColumnRole) -> Option<&str> {
        self.selected[role.index()]
            .and_then(|i| self.columns.get(i))
            .map(String::as_str)
    }

    /// Current column roles, once every selector has a column
    pub fn selection(&self) -> Option<ColumnSelection> {
        Some(ColumnSelection {
            event1: self.selected_name(ColumnRole::Event1)?.to_string(),
            event2: self.selected_name(ColumnRole::Event2)?.to_string(),
            assignment: self.selected_name(ColumnRole::Assignment)?.to_string(),
        })
    }

    fn preferred_name(&self, role: ColumnRole) -> Option<&str> {
        let prefs = &self.config.columns;
        match role {
            ColumnRole::Event1 => prefs.event1.as_deref(),
            ColumnRole::Event2 => prefs.event2.as_deref(),
            ColumnRole::Assignment => prefs.assignment.as_deref(),
        }
    }

    /// Submit the editor's SQL on a worker thread. Ignored while a query is running.
    fn start_query(&mut self, bypass_cache: bool) {
        if self.is_running() {
            return;
        }
        if self.editor.is_blank() {
            self.set_error(WarehouseError::EmptyQuery.to_string());
            return;
        }

        self.error_message = None;
        if bypass_cache {
            self.runner.clear();
        }

        let sql = self.editor.text();
        info!(bypass_cache, chars = sql.len(), "submitting query");
        let runner = Arc::clone(&self.runner);
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            // The receiver is gone only if the app already quit
            let _ = tx.send(runner.run(&sql));
        });
        self.pending = Some(rx);
        self.spinner_frame = 0;
    }

    /// Pick up a finished query, if any
    fn poll_query(&mut self) {
        let Some(rx) = &self.pending else {
            return;
        };
        match rx.try_recv() {
            Ok(outcome) => {
                self.pending = None;
                self.apply_outcome(outcome);
            }
            Err(TryRecvError::Empty) => {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
            }
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.set_error("Query worker stopped unexpectedly".to_string());
            }
        }
    }

    fn apply_outcome(&mut self, outcome: QueryOutcome) {
        match outcome {
            Ok(cached) => self.set_result(cached.result, cached.from_cache),
            Err(e) => {
                warn!(error = %e, "query failed");
                self.result = None;
                self.columns.clear();
                self.report = None;
                self.set_error(format!("An error occurred: {e}"));
            }
        }
    }

    fn set_result(&mut self, result: Arc<QueryResult>, from_cache: bool) {
        let columns = result.column_names();
        let selected = ColumnRole::ALL.map(|role| {
            resolve_selection(&columns, self.selected_name(role), self.preferred_name(role))
        });
        info!(rows = result.rows.len(), from_cache, "result loaded");

        self.columns = columns;
        self.selected = selected;
        self.result = Some(result);
        self.from_cache = from_cache;
        self.recompute_report();
    }

    /// Rebuild the comparison from the current result and column roles
    fn recompute_report(&mut self) {
        self.report = match (&self.result, self.selection()) {
            (Some(result), Some(selection)) => {
                Some(AbTestReport::build(result, selection, self.config.alpha))
            }
            _ => None,
        };
    }

    fn move_selection(&mut self, role: ColumnRole, forward: bool) {
        let len = self.columns.len();
        if len == 0 {
            return;
        }
        let slot = &mut self.selected[role.index()];
        let current = slot.unwrap_or(0);
        *slot = Some(if forward {
            (current + 1) % len
        } else {
            current.checked_sub(1).unwrap_or(len - 1)
        });
        self.recompute_report();
    }

    /// Handle keyboard input
    fn handle_input(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        // Global shortcuts
        match key {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return;
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return;
            }
            _ => {}
        }

        // If help is shown, don't process other keys
        if self.show_help {
            return;
        }

        match key {
            KeyCode::F(5) => {
                self.start_query(false);
                return;
            }
            KeyCode::Char('r') if ctrl => {
                self.start_query(false);
                return;
            }
            KeyCode::Char('l') if ctrl => {
                self.start_query(true);
                return;
            }
            KeyCode::Tab => {
                self.focused = self.focused.next();
                return;
            }
            KeyCode::BackTab => {
                self.focused = self.focused.prev();
                return;
            }
            _ => {}
        }

        // Panel-specific navigation
        match self.focused {
            FocusedPanel::Editor => self.handle_editor_input(key, ctrl),
            FocusedPanel::Selector(role) => self.handle_selector_input(role, key),
        }
    }

    fn handle_editor_input(&mut self, key: KeyCode, ctrl: bool) {
        match key {
            KeyCode::Char('u') if ctrl => self.editor.clear(),
            KeyCode::Char(c) if !ctrl => self.editor.insert_char(c),
            KeyCode::Enter => self.editor.insert_newline(),
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Delete => self.editor.delete(),
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Up => self.editor.move_up(),
            KeyCode::Down => self.editor.move_down(),
            KeyCode::Home => self.editor.move_home(),
            KeyCode::End => self.editor.move_end(),
            KeyCode::Esc => self.focused = self.focused.next(),
            _ => {}
        }
    }

    fn handle_selector_input(&mut self, role: ColumnRole, key: KeyCode) {
        match key {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(role, true),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(role, false),
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Esc => self.focused = FocusedPanel::Editor,
            _ => {}
        }
    }

    /// Render the UI
    fn render(&self, frame: &mut ratatui::Frame) {
        let size = frame.area();

        // Main layout: body and status bar
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(10),   // Body
                Constraint::Length(2), // Status bar
            ])
            .split(size);

        // Body layout: column selection sidebar (left) and content (right)
        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(28), // Sidebar
                Constraint::Min(40),    // Content
            ])
            .split(main_chunks[0]);

        let sidebar_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(body_chunks[0]);

        let sample_height = (self.config.sample_rows as u16).saturating_add(3).min(15);
        let content_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8),             // SQL editor
                Constraint::Length(sample_height), // Sample data
                Constraint::Min(10),               // Analysis
            ])
            .split(body_chunks[1]);

        let analysis_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(content_chunks[2]);

        let left_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(analysis_chunks[0]);

        // Sidebar: one selector per role
        for (role, area) in ColumnRole::ALL.into_iter().zip(sidebar_chunks.iter()) {
            let selector = ColumnSelector::new(
                role.title(),
                &self.columns,
                self.selected[role.index()],
                &self.theme,
            );
            selector.render(frame, *area, self.focused == FocusedPanel::Selector(role));
        }

        EditorPanel::new(&self.editor, &self.theme).render(
            frame,
            content_chunks[0],
            self.focused == FocusedPanel::Editor,
        );

        SampleTable::new(self.result.as_deref(), self.config.sample_rows, &self.theme)
            .render(frame, content_chunks[1], false);

        // Conversion chart and its fallback message
        let conversion_err = self
            .report
            .as_ref()
            .filter(|r| r.conversion.is_err())
            .map(|r| r.lift_message());
        let summary = self.report.as_ref().and_then(|r| r.conversion.as_ref().ok());
        ConversionChart::new(summary, conversion_err.as_deref(), &self.theme)
            .render(frame, left_chunks[0], false);

        StatsPanel::new(self.report.as_ref(), &self.theme).render(frame, left_chunks[1], false);

        let posterior_err = self
            .report
            .as_ref()
            .filter(|r| r.posterior.is_err())
            .and_then(|r| r.posterior_lines().into_iter().next());
        let curves = self
            .report
            .as_ref()
            .and_then(|r| r.posterior.as_deref().ok())
            .unwrap_or(&[]);
        PosteriorChart::new(curves, posterior_err.as_deref(), &self.theme)
            .render(frame, analysis_chunks[1], false);

        // Status bar
        let spinner = self
            .is_running()
            .then(|| SPINNER[self.spinner_frame % SPINNER.len()]);
        StatusBar::new(&self.project, &self.theme)
            .result(self.result.as_deref(), self.from_cache)
            .running(spinner)
            .error(self.error_message.as_deref())
            .render(frame, main_chunks[1]);

        // Render help overlay if active
        if self.show_help {
            HelpOverlay::new(&self.theme).render(frame, size);
        }
    }
}

/// Restore terminal to normal state
fn restore_terminal() {
    // Best effort cleanup - ignore errors since we may be in a panic
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Run the TUI application
pub fn run(config: AppConfig, runner: SharedRunner, project: String) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        restore_terminal();
        return Err(e).context("Failed to setup terminal");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    let mut app = App::new(config, runner, project);

    // Main loop - always restore the terminal afterwards
    let result = run_main_loop(&mut terminal, &mut app);

    restore_terminal();
    terminal.show_cursor().ok();

    result
}

/// Main application loop
fn run_main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;

        app.poll_query();

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_input(key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

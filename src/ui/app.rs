//! Main TUI application state and logic

use crate::analysis::blame::{BlameReport, ReportEntry};
use crate::debuginfo::DebugInfoMap;
use crate::ui::panes::{self, NodesScrollState};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
    backend::Backend,
};
use std::io;
use std::time::Duration;

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Nodes,
    Detail,
}

impl FocusedPane {
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Nodes => FocusedPane::Detail,
            FocusedPane::Detail => FocusedPane::Nodes,
        }
    }
}

/// The main application state
pub struct App {
    /// The report being browsed
    pub report: BlameReport,

    /// Locations of operands named in the detail pane
    pub debug_info: DebugInfoMap,

    /// Currently focused pane
    pub focused_pane: FocusedPane,

    /// Index into the visible entries
    pub selected: usize,

    pub nodes_scroll: NodesScrollState,

    /// Show every visited node rather than only flagged ones
    pub show_all: bool,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,
}

impl App {
    pub fn new(report: BlameReport, debug_info: DebugInfoMap) -> Self {
        let show_all = !report.entries.iter().any(|e| e.is_flagged());
        App {
            report,
            debug_info,
            focused_pane: FocusedPane::Nodes,
            selected: 0,
            nodes_scroll: NodesScrollState { offset: 0 },
            show_all,
            should_quit: false,
            status_message: String::from("Ready!"),
        }
    }

    /// Entries shown in the node list
    pub fn visible_entries(&self) -> Vec<&ReportEntry> {
        visible(&self.report, self.show_all)
    }

    pub fn selected_entry(&self) -> Option<&ReportEntry> {
        self.visible_entries().get(self.selected).copied()
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Panes on top, status bar at bottom
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(main_chunks[0]);

        let entries = visible(&self.report, self.show_all);
        let flagged = self.report.entries.iter().filter(|e| e.is_flagged()).count();
        let total = self.report.entries.len();

        panes::render_nodes_pane(
            frame,
            columns[0],
            &entries,
            self.selected,
            self.focused_pane == FocusedPane::Nodes,
            &mut self.nodes_scroll,
        );

        panes::render_detail_pane(
            frame,
            columns[1],
            entries.get(self.selected).copied(),
            &self.debug_info,
            self.focused_pane == FocusedPane::Detail,
        );

        panes::render_status_bar(
            frame,
            main_chunks[1],
            &self.status_message,
            flagged,
            total,
            self.show_all,
        );
    }

    /// Handle keyboard events
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        let count = self.visible_entries().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                self.selected = count.saturating_sub(1);
                self.status_message = "Jumped to last node".to_string();
            }
            KeyCode::Backspace => {
                self.selected = 0;
                self.status_message = "Jumped to root".to_string();
            }
            KeyCode::Char('a') => {
                self.show_all = !self.show_all;
                self.selected = 0;
                self.nodes_scroll.offset = 0;
                self.status_message = if self.show_all {
                    "Showing all visited nodes".to_string()
                } else {
                    "Showing flagged nodes".to_string()
                };
            }
            _ => {}
        }
    }
}

fn visible(report: &BlameReport, show_all: bool) -> Vec<&ReportEntry> {
    report
        .entries
        .iter()
        .filter(|e| show_all || e.is_flagged())
        .collect()
}

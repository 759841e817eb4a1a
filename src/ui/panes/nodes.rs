//! Blame node list
//!
//! One row per visited node in breadth-first order:
//!
//! ```text
//! HP OP  main.c:12:7       iid 40  @52
//! ```

use super::border_style;
use crate::analysis::blame::ReportEntry;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

/// Scroll state for the node list
pub struct NodesScrollState {
    pub offset: usize,
}

/// Plain-text label of an entry, without flag markers
pub fn entry_label(entry: &ReportEntry) -> String {
    let location = match &entry.location {
        Some(loc) => format!("{}:{}:{}", loc.file, loc.line, loc.column),
        None => "(no location)".to_string(),
    };
    format!("{:<24} iid {:<6} @{}", location, entry.iid, entry.precision)
}

/// Render the node list; `entries` are the rows to show and `selected` indexes them
pub fn render_nodes_pane(
    frame: &mut Frame,
    area: Rect,
    entries: &[&ReportEntry],
    selected: usize,
    is_focused: bool,
    scroll_state: &mut NodesScrollState,
) {
    let block = Block::default()
        .title(format!(" Blame Nodes ({}) ", entries.len()))
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    if entries.is_empty() {
        let paragraph = Paragraph::new("(no nodes)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    // Keep the selection visible
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    if selected < scroll_state.offset {
        scroll_state.offset = selected;
    } else if selected >= scroll_state.offset + visible_height {
        scroll_state.offset = selected + 1 - visible_height;
    }

    let items: Vec<ListItem> = entries
        .iter()
        .enumerate()
        .skip(scroll_state.offset)
        .take(visible_height)
        .map(|(i, entry)| {
            let flag = |on: bool, text: &'static str, color| {
                if on {
                    Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
                } else {
                    Span::styled("   ", Style::default())
                }
            };
            let line = Line::from(vec![
                flag(entry.require_higher_precision, "HP ", DEFAULT_THEME.error),
                flag(
                    entry.require_higher_precision_operator,
                    "OP ",
                    DEFAULT_THEME.operator,
                ),
                Span::styled(
                    entry_label(entry),
                    Style::default().fg(if entry.is_flagged() {
                        DEFAULT_THEME.fg
                    } else {
                        DEFAULT_THEME.comment
                    }),
                ),
            ]);
            let mut item = ListItem::new(line);
            if i == selected {
                item = item.style(Style::default().bg(DEFAULT_THEME.current_line_bg));
            }
            item
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

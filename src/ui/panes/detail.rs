//! Detail pane for the selected blame node

use super::border_style;
use crate::analysis::blame::ReportEntry;
use crate::debuginfo::DebugInfoMap;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
    Frame,
};

fn yes_no(on: bool) -> Span<'static> {
    if on {
        Span::styled("yes", Style::default().fg(DEFAULT_THEME.error).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("no", Style::default().fg(DEFAULT_THEME.success))
    }
}

fn field(name: &'static str) -> Span<'static> {
    Span::styled(format!("{:<22}", name), Style::default().fg(DEFAULT_THEME.comment))
}

pub fn render_detail_pane(
    frame: &mut Frame,
    area: Rect,
    entry: Option<&ReportEntry>,
    debug_info: &DebugInfoMap,
    is_focused: bool,
) {
    let block = Block::default()
        .title(" Node Detail ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused))
        .padding(Padding::new(1, 1, 0, 0));

    let Some(entry) = entry else {
        let paragraph = Paragraph::new("(nothing selected)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    };

    let location = match &entry.location {
        Some(loc) => format!("{}, line {}, column {}", loc.file, loc.line, loc.column),
        None => "unknown".to_string(),
    };

    let mut lines = vec![
        Line::from(vec![
            field("Instruction"),
            Span::styled(entry.iid.to_string(), Style::default().fg(DEFAULT_THEME.number)),
        ]),
        Line::from(vec![
            field("Location"),
            Span::styled(location, Style::default().fg(DEFAULT_THEME.location)),
        ]),
        Line::from(vec![
            field("Precision"),
            Span::styled(
                format!("{} mantissa bits", entry.precision.bits()),
                Style::default().fg(DEFAULT_THEME.precision),
            ),
        ]),
        Line::from(vec![field("Higher precision"), yes_no(entry.require_higher_precision)]),
        Line::from(vec![
            field("Higher prec. operator"),
            yes_no(entry.require_higher_precision_operator),
        ]),
        Line::from(""),
    ];

    if entry.children.is_empty() {
        lines.push(Line::from(Span::styled(
            "No blamed operands",
            Style::default().fg(DEFAULT_THEME.comment),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Blamed operands",
            Style::default().fg(DEFAULT_THEME.primary).add_modifier(Modifier::BOLD),
        )));
        for (side, (iid, precision)) in ["left ", "right"].iter().zip(&entry.children) {
            let at = debug_info
                .get(*iid)
                .map(|loc| format!("  {}:{}", loc.file, loc.line))
                .unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", side), Style::default().fg(DEFAULT_THEME.comment)),
                Span::styled(format!("iid {}", iid), Style::default().fg(DEFAULT_THEME.number)),
                Span::styled(
                    format!(" @{} bits", precision.bits()),
                    Style::default().fg(DEFAULT_THEME.precision),
                ),
                Span::styled(at, Style::default().fg(DEFAULT_THEME.location)),
            ]));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

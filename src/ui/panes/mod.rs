//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`nodes`]: the blame nodes visited by the report walk, flagged ones highlighted
//! - [`detail`]: flags, location and blamed operands of the selected node
//! - [`status`]: status bar with keybindings and report summary
//!
//! Each pane module exports a primary `render_*` function taking the frame, its
//! area and the data it shows.

pub mod detail;
pub mod nodes;
pub mod status;

pub use detail::render_detail_pane;
pub use nodes::{entry_label, render_nodes_pane, NodesScrollState};
pub use status::render_status_bar;

use crate::ui::theme::DEFAULT_THEME;
use ratatui::style::{Modifier, Style};

pub(crate) fn border_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    }
}

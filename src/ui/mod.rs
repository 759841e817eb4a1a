//! Terminal user interface built on [ratatui](https://github.com/ratatui-org/ratatui).
//!
//! The UI is a viewer over a finished [`BlameReport`] and is organized in layers:
//!
//! - **[`app`]**: application state and the keyboard event loop
//! - **[`panes`]**: stateless render functions, one per visible pane
//! - **[`theme`]**: the color palette shared by the panes
//!
//! The entry point for consumers is [`App`]: construct it with a report and call
//! [`App::run`] to start the event loop.
//!
//! [`BlameReport`]: crate::analysis::blame::BlameReport
//! [`App::run`]: app::App::run

pub mod app;
pub mod panes;
pub mod theme;

pub use app::App;

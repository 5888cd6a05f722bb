//! Terminal User Interface components for bq-abtest.

pub mod chart;
pub mod editor;
mod help;
mod theme;
pub mod widgets;

pub use help::HelpOverlay;
pub use theme::Theme;

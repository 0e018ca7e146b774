//! Terminal output for the command line tool

mod renderer;
mod spinner;
mod theme;

pub use renderer::TerminalRenderer;
pub use spinner::WaitSpinner;
pub use theme::Theme;

//! Terminal theme and color definitions

use crossterm::style::Color;

use crate::manager::Health;

/// Theme colors for command output
pub struct Theme {
    /// Color for section headings
    pub title: Color,
    /// Color for answer text
    pub answer: Color,
    /// Color for error messages
    pub error: Color,
    /// Color for dim/secondary info
    pub dim: Color,
    /// Color for success messages
    pub success: Color,
    /// Color for warnings
    pub warning: Color,
    /// Color for usage/stats numbers
    pub stats: Color,
}

impl Theme {
    pub fn health(&self, health: Health) -> Color {
        match health {
            Health::Excellent => self.success,
            Health::Warning => self.warning,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Color::Magenta,
            answer: Color::White,
            error: Color::Red,
            dim: Color::DarkGrey,
            success: Color::Green,
            warning: Color::DarkYellow,
            stats: Color::Blue,
        }
    }
}

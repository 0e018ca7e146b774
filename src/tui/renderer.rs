//! Terminal rendering with markdown support

use crossterm::style::{Color, Stylize};
use std::fmt::Display;
use termimad::MadSkin;

use super::theme::Theme;
use crate::manager::{AssistantAnswer, SystemStatus};

/// Terminal renderer with markdown and styled output
pub struct TerminalRenderer {
    theme: Theme,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let theme = Theme::default();
        let skin = Self::build_skin(&theme);
        Self { theme, skin }
    }

    fn build_skin(theme: &Theme) -> MadSkin {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(to_termimad_color(theme.title));
        skin.bold.set_fg(to_termimad_color(Color::White));
        skin.italic.set_fg(to_termimad_color(theme.dim));
        skin.inline_code.set_fg(to_termimad_color(Color::Green));
        skin.code_block.set_fg(to_termimad_color(Color::Green));
        skin
    }

    /// Render an answer followed by a one-line summary of how it was produced
    pub fn render_answer(&self, answer: &AssistantAnswer) {
        println!();
        if has_markdown_elements(&answer.annotated_text) {
            self.skin.print_text(&answer.annotated_text);
        } else {
            println!("{}", answer.annotated_text.as_str().with(self.theme.answer));
        }
        println!(
            "\n  {} {}",
            "\u{2022}".with(self.theme.dim),
            answer_footer(answer).with(self.theme.dim)
        );
        println!();
    }

    /// Render a plain-text report, highlighting `=== X ===` headings and warnings
    pub fn render_report(&self, report: &impl Display) {
        for line in report.to_string().lines() {
            if line.starts_with("===") {
                println!("{}", line.with(self.theme.title));
            } else if line.starts_with("Warning:") {
                println!("{}", line.with(self.theme.warning));
            } else {
                println!("{}", line);
            }
        }
    }

    pub fn render_status(&self, status: &SystemStatus) {
        println!(
            "  {} {}",
            "Health:".with(self.theme.dim),
            status.health.as_str().with(self.theme.health(status.health))
        );
        println!();
        self.render_report(status);
    }

    /// Render an error message
    pub fn render_error(&self, msg: &str) {
        eprintln!(
            "  {} {}",
            "\u{2717}".with(self.theme.error),
            msg.with(self.theme.error)
        );
    }

    /// Render a success message
    pub fn render_success(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{2713}".with(self.theme.success),
            msg.with(self.theme.success)
        );
    }

    /// Render info text
    pub fn render_info(&self, msg: &str) {
        println!("  {}", msg.with(self.theme.dim));
    }

    /// Render a label and a highlighted value
    pub fn render_field(&self, label: &str, value: impl Display) {
        println!(
            "  {:<22} {}",
            label.with(self.theme.dim),
            value.to_string().with(self.theme.stats)
        );
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary line shown under an answer
fn answer_footer(answer: &AssistantAnswer) -> String {
    let meta = &answer.optimization;
    let source = if answer.from_cache { ", cached" } else { "" };
    format!(
        "{} [{}, context {} -> {} est. tokens ({:.0}% smaller){}] {} ms",
        answer.model,
        meta.strategy,
        meta.original_size,
        meta.optimized_size,
        meta.reduction_percent,
        source,
        answer.elapsed_ms
    )
}

/// Check if content has markdown elements worth rendering
fn has_markdown_elements(content: &str) -> bool {
    content.contains("```")
        || content.contains("## ")
        || content.contains("# ")
        || content.contains("**")
        || content.contains("| ")
        || content.contains("- ")
        || content.contains("_served from cache")
}

/// Convert crossterm Color to termimad color
fn to_termimad_color(color: Color) -> termimad::crossterm::style::Color {
    // termimad re-exports crossterm, so these types are compatible
    match color {
        Color::Black => termimad::crossterm::style::Color::Black,
        Color::DarkGrey => termimad::crossterm::style::Color::DarkGrey,
        Color::Red => termimad::crossterm::style::Color::Red,
        Color::DarkRed => termimad::crossterm::style::Color::DarkRed,
        Color::Green => termimad::crossterm::style::Color::Green,
        Color::DarkGreen => termimad::crossterm::style::Color::DarkGreen,
        Color::Yellow => termimad::crossterm::style::Color::Yellow,
        Color::DarkYellow => termimad::crossterm::style::Color::DarkYellow,
        Color::Blue => termimad::crossterm::style::Color::Blue,
        Color::DarkBlue => termimad::crossterm::style::Color::DarkBlue,
        Color::Magenta => termimad::crossterm::style::Color::Magenta,
        Color::DarkMagenta => termimad::crossterm::style::Color::DarkMagenta,
        Color::Cyan => termimad::crossterm::style::Color::Cyan,
        Color::DarkCyan => termimad::crossterm::style::Color::DarkCyan,
        Color::White => termimad::crossterm::style::Color::White,
        Color::Grey => termimad::crossterm::style::Color::Grey,
        _ => termimad::crossterm::style::Color::Reset,
    }
}

//! Spinner shown while a completion is in flight

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct WaitSpinner {
    bar: ProgressBar,
    active: bool,
}

impl WaitSpinner {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&[
                "\u{2801}", "\u{2803}", "\u{2807}", "\u{280f}", "\u{281f}", "\u{283f}",
                "\u{287f}", "\u{28ff}", "\u{28fe}", "\u{28fc}", "\u{28f8}", "\u{28f0}",
                "\u{28e0}", "\u{28c0}", "\u{2880}", "\u{2800}",
            ]);
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        Self { bar, active: false }
    }

    pub fn start(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.active = true;
    }

    /// Stop and clear the spinner
    pub fn stop(&mut self) {
        if self.active {
            self.bar.finish_and_clear();
            self.active = false;
        }
    }
}

impl Default for WaitSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}

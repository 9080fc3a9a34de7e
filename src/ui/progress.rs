use crate::loader::LoadReport;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner ticking once per loaded entity
pub struct LoadSpinner {
    pb: ProgressBar,
}

impl LoadSpinner {
    pub fn new(message: &str) -> Self {
        if !console::Term::stdout().is_term() {
            return Self { pb: ProgressBar::hidden() };
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn update(&self, report: &LoadReport) {
        self.pb.set_message(format!(
            "{} entities ({} files, {} carved, {} failed)",
            report.processed(),
            report.files,
            report.carved,
            report.failures.len()
        ));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

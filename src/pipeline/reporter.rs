// Run output sinks
//
// The pipeline narrates its progress through a `Reporter` so the CLI can
// print to the terminal while tests and embedding hosts capture lines.

use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    /// Section banner (stage boundaries)
    fn heading(&self, title: &str);
    fn log(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Prints to stdout and mirrors warnings into `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn heading(&self, title: &str) {
        let rule = "=".repeat(60);
        println!("\n{rule}\n  {title}\n{rule}\n");
    }

    fn log(&self, message: &str) {
        println!("  {message}");
    }

    fn warn(&self, message: &str) {
        println!("  ⚠ {message}");
        tracing::warn!("{}", message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Heading(String),
    Log(String),
    Warn(String),
}

/// Captures every line in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<ReportLine>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                ReportLine::Warn(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    /// True when any log or warning line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| match l {
            ReportLine::Heading(s) | ReportLine::Log(s) | ReportLine::Warn(s) => s.contains(needle),
        })
    }

    fn push(&self, line: ReportLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl Reporter for RecordingReporter {
    fn heading(&self, title: &str) {
        self.push(ReportLine::Heading(title.to_string()));
    }

    fn log(&self, message: &str) {
        self.push(ReportLine::Log(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(ReportLine::Warn(message.to_string()));
    }
}

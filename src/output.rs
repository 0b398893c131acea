//! CLI output formatting.
//!
//! Each result has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ```text
//! photos/dawn.jpg → out/dawn.png
//!     Format: png (image/png)
//!     Size: 48.2 KB
//! photos/broken.jpg
//!     Error: Image not readable. Is it a valid image?
//!
//! Transformed 1 image, 1 failed
//! ```
//!
//! With `--json` each result is one [`TransformReport`] object per line.

use crate::imaging::Color;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of transforming one source, as reported by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransformReport {
    pub fn success(
        source: &str,
        output: PathBuf,
        extension: &str,
        mime_type: &'static str,
        bytes: usize,
    ) -> Self {
        Self {
            source: source.to_string(),
            output: Some(output),
            extension: Some(extension.to_string()),
            mime_type: Some(mime_type),
            bytes: Some(bytes),
            error: None,
        }
    }

    pub fn failure(source: &str, error: impl std::fmt::Display) -> Self {
        Self {
            source: source.to_string(),
            output: None,
            extension: None,
            mime_type: None,
            bytes: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

pub fn format_report(report: &TransformReport) -> Vec<String> {
    let mut lines = Vec::new();
    match (&report.output, &report.error) {
        (_, Some(error)) => {
            lines.push(report.source.clone());
            lines.push(format!("    Error: {error}"));
        }
        (Some(output), None) => {
            lines.push(format!("{} → {}", report.source, output.display()));
            if let (Some(ext), Some(mime)) = (&report.extension, report.mime_type) {
                lines.push(format!("    Format: {ext} ({mime})"));
            }
            if let Some(bytes) = report.bytes {
                lines.push(format!("    Size: {}", human_size(bytes)));
            }
        }
        (None, None) => lines.push(report.source.clone()),
    }
    lines
}

pub fn format_report_json(report: &TransformReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

pub fn format_summary(reports: &[TransformReport]) -> String {
    let ok = reports.iter().filter(|r| r.is_ok()).count();
    let failed = reports.len() - ok;
    let noun = if ok == 1 { "image" } else { "images" };
    if failed == 0 {
        format!("Transformed {ok} {noun}")
    } else {
        format!("Transformed {ok} {noun}, {failed} failed")
    }
}

pub fn format_color(spec: &str, color: Color) -> String {
    let [r, g, b, a] = color.to_rgba();
    format!("{spec} → rgba({r}, {g}, {b}, {a})")
}

pub fn print_report(report: &TransformReport) {
    for line in format_report(report) {
        println!("{line}");
    }
}

pub fn print_summary(reports: &[TransformReport]) {
    println!();
    println!("{}", format_summary(reports));
}

//! Progress reporting for the uploader
//!
//! Styled header/summary output plus a spinner shown while the drain loop
//! runs.

use crate::engine::UploadReport;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner displayed while `upload()` blocks
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the spinner line
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the run
pub fn print_header(source: &str, bucket: &str, workers: usize, pretend: bool) {
    println!();
    println!(
        "{} {}",
        style("s3-hauler").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Bucket:").bold(), bucket);
    println!("  {} {}", style("Workers:").bold(), workers);
    if pretend {
        println!("  {} nothing will be uploaded", style("Pretend:").yellow().bold());
    }
    println!();
}

/// Print a summary of the run
pub fn print_summary(report: &UploadReport, bucket: &str) {
    let bytes_str = format_size(report.bytes_uploaded, BINARY);
    let duration_secs = report.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        report.files_uploaded as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Upload Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(report.files_uploaded)
    );
    println!("  {} {}", style("Total Size:").bold(), bytes_str);
    if report.dirs_walked > 0 {
        println!(
            "  {} {}",
            style("Directories:").bold(),
            format_number(report.dirs_walked)
        );
    }
    if report.files_deleted > 0 {
        println!(
            "  {} {}",
            style("Deleted:").bold(),
            format_number(report.files_deleted)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} files/sec, {} passes)",
        style("Duration:").bold(),
        duration_secs,
        rate,
        report.passes
    );
    if report.skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").yellow().bold(),
            format_number(report.skipped)
        );
    }
    if report.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(report.errors)
        );
    }
    println!("  {} {}", style("Bucket:").bold(), bucket);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}

//! End-of-run table listing the decision taken for every image

use prettytable::{format, Cell, Row, Table};
use std::path::Path;

use crate::image_processing::{ImageOutcome, ProcessingResult, SkipReason};
use crate::utils::format_duration;

/// One row of the report
#[derive(Debug, Clone, PartialEq)]
pub struct CropEntry {
    pub input_filename: String,
    pub status: String,
    pub window: String,
    pub boxes: String,
    pub confidence: String,
    pub time: String,
}

#[derive(Debug, Default)]
pub struct CropReport {
    pub entries: Vec<CropEntry>,
}

impl CropReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from batch results; `image_files` supplies names for failed entries
    pub fn from_results(
        image_files: &[impl AsRef<Path>],
        results: &[anyhow::Result<ProcessingResult>],
    ) -> Self {
        let mut report = Self::new();
        for (path, result) in image_files.iter().zip(results) {
            report.add(path.as_ref(), result);
        }
        report
    }

    pub fn add(&mut self, input_path: &Path, result: &anyhow::Result<ProcessingResult>) {
        let input_filename = input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input_path.display().to_string());

        let entry = match result {
            Ok(processed) => {
                let time = format_duration(processed.processing_time);
                match &processed.outcome {
                    ImageOutcome::Cropped { window, box_count } => CropEntry {
                        input_filename,
                        status: "cropped".to_string(),
                        window: format!("{}..{} ({}px)", window.xmin, window.xmax, window.width()),
                        boxes: box_count.to_string(),
                        confidence: format!("{:.2}", window.confidence),
                        time,
                    },
                    ImageOutcome::Skipped(reason) => CropEntry {
                        input_filename,
                        status: skip_status(reason),
                        window: "-".to_string(),
                        boxes: "-".to_string(),
                        confidence: "-".to_string(),
                        time,
                    },
                }
            }
            Err(e) => CropEntry {
                input_filename,
                status: format!("failed: {}", truncate(&e.to_string(), 40)),
                window: "-".to_string(),
                boxes: "-".to_string(),
                confidence: "-".to_string(),
                time: "-".to_string(),
            },
        };

        self.entries.push(entry);
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Input"),
            Cell::new("Status"),
            Cell::new("Window"),
            Cell::new("Boxes"),
            Cell::new("Conf."),
            Cell::new("Time"),
        ]));

        for entry in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(&truncate(&entry.input_filename, 30)),
                Cell::new(&entry.status),
                Cell::new(&entry.window),
                Cell::new(&entry.boxes),
                Cell::new(&entry.confidence),
                Cell::new(&entry.time),
            ]));
        }

        table
    }

    /// Print the report as a formatted table
    pub fn print(&self) {
        if self.entries.is_empty() {
            return;
        }

        println!("\nCROP REPORT ({} images)\n", self.entries.len());
        self.to_table().printstd();
        println!();
    }
}

fn skip_status(reason: &SkipReason) -> String {
    match reason {
        SkipReason::AlreadyProcessed => "skipped: exists".to_string(),
        SkipReason::NoSubjects => "skipped: no subjects".to_string(),
        SkipReason::TooNarrow { width, height } => {
            format!("skipped: {}x{} too narrow", width, height)
        }
    }
}

/// Shorten to `max_len` characters, marking the cut with "..."
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

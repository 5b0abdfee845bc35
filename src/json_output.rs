//! Machine-readable progress
//!
//! With `--json-progress` every status update is written to stdout as one
//! JSON object per line and the styled console output is suppressed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::batch::ProcessingStats;
use crate::image_processing::geometry::CropWindow;
use crate::image_processing::SkipReason;

/// Minimum gap between two progress lines (25 per second)
const PROGRESS_INTERVAL_MS: u64 = 40;

/// Last progress emission timestamp (milliseconds since epoch)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JsonMessage {
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    FileCompleted {
        input_path: String,
        output_path: Option<String>,
        xmin: u32,
        xmax: u32,
        box_count: usize,
        confidence: f32,
        processing_time_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    FileSkipped { input_path: String, reason: String },
    #[serde(rename_all = "camelCase")]
    FileFailed { input_path: String, error: String },
    #[serde(rename_all = "camelCase")]
    Summary {
        total_files: usize,
        cropped: usize,
        skipped: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    pub fn to_line(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Some(json) = self.to_line() {
            println!("{}", json);
        }
    }

    /// Throttled progress line; the final update (current == total) always goes out
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn file_completed(
        input_path: &Path,
        output_path: Option<&Path>,
        window: &CropWindow,
        box_count: usize,
        processing_time_ms: u64,
    ) -> Self {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.map(|p| p.display().to_string()),
            xmin: window.xmin,
            xmax: window.xmax,
            box_count,
            confidence: window.confidence,
            processing_time_ms,
        }
    }

    pub fn file_skipped(input_path: &Path, reason: &SkipReason) -> Self {
        Self::FileSkipped {
            input_path: input_path.display().to_string(),
            reason: skip_reason_label(reason).to_string(),
        }
    }

    pub fn file_failed(input_path: &Path, error: impl Into<String>) -> Self {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
    }

    pub fn summary(stats: &ProcessingStats) -> Self {
        Self::Summary {
            total_files: stats.total_files,
            cropped: stats.cropped,
            skipped: stats.skipped(),
            failed: stats.failed,
            duration_secs: stats.total_duration.as_secs_f64(),
        }
    }
}

/// Short stable label used in JSON lines and the report table
pub fn skip_reason_label(reason: &SkipReason) -> &'static str {
    match reason {
        SkipReason::AlreadyProcessed => "alreadyProcessed",
        SkipReason::NoSubjects => "noSubjects",
        SkipReason::TooNarrow { .. } => "tooNarrow",
    }
}

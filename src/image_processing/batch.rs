use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{ImageOutcome, ProcessingResult, SkipReason};
use crate::utils::format_duration;

/// Progress tracking shared by the worker threads of one batch
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let remaining = self.total_files.saturating_sub(processed);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }

        let time_per_item = self.start_time.elapsed() / processed as u32;
        Some(time_per_item * remaining as u32)
    }

    /// Progress message: completed share plus remaining time once it can be estimated
    pub fn status_line(&self, current: &str) -> String {
        let percent = self.progress() * 100.0;
        match self.eta() {
            Some(eta) => format!("{} ({:.0}%, ~{} left)", current, percent, format_duration(eta)),
            None => format!("{} ({:.0}%)", current, percent),
        }
    }
}

/// Outcome counts for a finished batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub cropped: usize,
    pub skipped_existing: usize,
    pub skipped_no_subjects: usize,
    pub skipped_too_narrow: usize,
    pub failed: usize,
    pub total_duration: Duration,
}

impl ProcessingStats {
    pub fn from_results(results: &[Result<ProcessingResult>], total_duration: Duration) -> Self {
        let mut stats = Self {
            total_files: results.len(),
            total_duration,
            ..Default::default()
        };

        for result in results {
            match result {
                Ok(processed) => match &processed.outcome {
                    ImageOutcome::Cropped { .. } => stats.cropped += 1,
                    ImageOutcome::Skipped(SkipReason::AlreadyProcessed) => {
                        stats.skipped_existing += 1
                    }
                    ImageOutcome::Skipped(SkipReason::NoSubjects) => stats.skipped_no_subjects += 1,
                    ImageOutcome::Skipped(SkipReason::TooNarrow { .. }) => {
                        stats.skipped_too_narrow += 1
                    }
                },
                Err(_) => stats.failed += 1,
            }
        }

        stats
    }

    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_no_subjects + self.skipped_too_narrow
    }

    /// Percentage of attempted images (not skipped as existing) that were cropped
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_files - self.skipped_existing;
        if attempted == 0 {
            0.0
        } else {
            (self.cropped as f64 / attempted as f64) * 100.0
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_files == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total_files as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::geometry::CropWindow;
    use std::path::PathBuf;
    use std::thread;

    fn result(outcome: ImageOutcome) -> Result<ProcessingResult> {
        Ok(ProcessingResult {
            input_path: PathBuf::from("a.jpg"),
            output_path: None,
            outcome,
            processing_time: Duration::ZERO,
        })
    }

    #[test]
    fn test_batch_processor_progress() {
        let processor = BatchProcessor::new(10);

        assert_eq!(processor.progress(), 0.0);

        processor.increment();
        assert!((processor.progress() - 0.1).abs() < 0.01);

        for _ in 0..9 {
            processor.increment();
        }
        assert!((processor.progress() - 1.0).abs() < 0.01);
        assert_eq!(processor.eta(), Some(Duration::ZERO));
    }

    #[test]
    fn test_batch_processor_eta() {
        let processor = BatchProcessor::new(4);
        assert!(processor.eta().is_none());

        thread::sleep(Duration::from_millis(10));
        processor.increment();

        let eta = processor.eta();
        assert!(eta.is_some());
        assert!(eta.unwrap() > Duration::ZERO);
    }

    #[test]
    fn test_empty_batch_progress() {
        assert_eq!(BatchProcessor::new(0).progress(), 1.0);
    }

    #[test]
    fn test_status_line() {
        let processor = BatchProcessor::new(4);
        assert_eq!(processor.status_line("a.jpg"), "a.jpg (0%)");

        for _ in 0..4 {
            processor.increment();
        }
        assert_eq!(processor.status_line("d.jpg"), "d.jpg (100%, ~0ms left)");
    }

    #[test]
    fn test_stats_from_results() {
        let window = CropWindow {
            xmin: 0,
            xmax: 10,
            ymin: 0,
            ymax: 16,
            confidence: 0.9,
        };
        let results = vec![
            result(ImageOutcome::Cropped {
                window,
                box_count: 2,
            }),
            result(ImageOutcome::Cropped {
                window,
                box_count: 1,
            }),
            result(ImageOutcome::Skipped(SkipReason::AlreadyProcessed)),
            result(ImageOutcome::Skipped(SkipReason::NoSubjects)),
            result(ImageOutcome::Skipped(SkipReason::TooNarrow {
                width: 100,
                height: 400,
            })),
            Err(anyhow::anyhow!("decode failed")),
        ];

        let stats = ProcessingStats::from_results(&results, Duration::from_secs(6));

        assert_eq!(stats.total_files, 6);
        assert_eq!(stats.cropped, 2);
        assert_eq!(stats.skipped_existing, 1);
        assert_eq!(stats.skipped_no_subjects, 1);
        assert_eq!(stats.skipped_too_narrow, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped(), 3);
        assert!((stats.success_rate() - 40.0).abs() < 0.01);
        assert_eq!(stats.average_duration(), Duration::from_secs(1));
    }
}

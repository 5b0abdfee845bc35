pub mod annotate;
pub mod apply;
pub mod batch;
pub mod crop_window;
pub mod detection;
pub mod geometry;
pub mod orientation;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::utils::{has_valid_extension, verbose_println};
use apply::{FileImageWriter, ImageWriter};
use batch::BatchProcessor;
use crop_window::{calculate_crop, CropError};
use detection::{DetectionOptions, SubjectDetector};
use geometry::{CropWindow, ImageDimensions};

/// Subdirectory of the output directory that receives preview overlays
pub const PREVIEW_DIR: &str = "preview";

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub detection: DetectionOptions,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub verbose: bool,
    pub parallel_jobs: usize,
    /// Re-process images whose output already exists
    pub force: bool,
    /// Write overlays instead of crops
    pub preview: bool,
    /// Compute windows without writing anything
    pub dry_run: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            detection: DetectionOptions::default(),
            extensions: ["jpg", "jpeg", "png", "webp", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recursive: false,
            verbose: false,
            parallel_jobs: 1,
            force: false,
            preview: false,
            dry_run: false,
        }
    }
}

/// Why an image produced no output
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// An output with the same file name exists
    AlreadyProcessed,
    /// The detector found nothing
    NoSubjects,
    /// Too narrow for a full-height 9:16 window
    TooNarrow { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Cropped { window: CropWindow, box_count: usize },
    Skipped(SkipReason),
}

#[derive(Debug)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    /// Written (or, in dry-run mode, would-be) output file
    pub output_path: Option<PathBuf>,
    pub outcome: ImageOutcome,
    pub processing_time: Duration,
}

impl ProcessingResult {
    fn skipped(input_path: &Path, reason: SkipReason, started: Instant) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: None,
            outcome: ImageOutcome::Skipped(reason),
            processing_time: started.elapsed(),
        }
    }
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    detector: Box<dyn SubjectDetector>,
    writer: Box<dyn ImageWriter>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig, detector: Box<dyn SubjectDetector>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs)
            .build()
            .context("Failed to initialize thread pool")?;

        Ok(Self {
            config,
            detector,
            writer: Box::new(FileImageWriter),
            pool,
        })
    }

    /// Replace the file writer (used by tests and embedders)
    pub fn with_writer(mut self, writer: Box<dyn ImageWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Collect image files from input directories and single files
    pub fn discover_images(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut image_files = Vec::new();

        for input in inputs {
            if input.is_file() {
                if has_valid_extension(input, &self.config.extensions) {
                    image_files.push(input.clone());
                }
                continue;
            }

            verbose_println(
                self.config.verbose,
                &format!("Scanning directory: {}", input.display()),
            );

            let max_depth = if self.config.recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(input).follow_links(false).max_depth(max_depth) {
                let entry = entry.context("Failed to read directory entry")?;
                let path = entry.path();

                if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                    image_files.push(path.to_path_buf());
                }
            }
        }

        image_files.sort();
        image_files.dedup();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// File names already present in the output directory
    pub fn existing_outputs(&self, output_dir: &Path) -> Result<HashSet<OsString>> {
        if !output_dir.is_dir() {
            return Ok(HashSet::new());
        }

        let mut names = HashSet::new();
        for entry in std::fs::read_dir(output_dir)
            .with_context(|| format!("Failed to list output directory: {}", output_dir.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.path().is_file() {
                names.insert(entry.file_name());
            }
        }

        Ok(names)
    }

    /// Directory that receives this run's files: `preview/` in preview mode
    pub fn destination_dir(&self, output_dir: &Path) -> PathBuf {
        if self.config.preview {
            output_dir.join(PREVIEW_DIR)
        } else {
            output_dir.to_path_buf()
        }
    }

    /// Destination for an input: same file name inside [`Self::destination_dir`]
    pub fn output_path_for(&self, input_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let file_name = input_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Input has no file name: {}", input_path.display()))?;

        Ok(self.destination_dir(output_dir).join(file_name))
    }

    /// Process all images in parallel; `on_done` runs once per image as it finishes
    pub fn process_batch<F>(
        &self,
        image_files: &[PathBuf],
        output_dir: &Path,
        on_done: F,
    ) -> Result<Vec<Result<ProcessingResult>>>
    where
        F: Fn(&BatchProcessor, &Path, &Result<ProcessingResult>) + Send + Sync,
    {
        let existing = if self.config.force {
            HashSet::new()
        } else {
            self.existing_outputs(&self.destination_dir(output_dir))?
        };
        verbose_println(
            self.config.verbose,
            &format!("{} outputs already present", existing.len()),
        );

        let processor = BatchProcessor::new(image_files.len());

        let results = self.pool.install(|| {
            image_files
                .par_iter()
                .map(|image_path| {
                    let result = self.process_single_image(image_path, output_dir, &existing);
                    processor.increment();
                    on_done(&processor, image_path, &result);
                    result
                })
                .collect()
        });

        Ok(results)
    }

    /// Detect, place the window and write one image
    pub fn process_single_image(
        &self,
        input_path: &Path,
        output_dir: &Path,
        existing: &HashSet<OsString>,
    ) -> Result<ProcessingResult> {
        let started = Instant::now();

        if let Some(file_name) = input_path.file_name() {
            if existing.contains(file_name) {
                verbose_println(
                    self.config.verbose,
                    &format!("Skipping {}: already processed", input_path.display()),
                );
                return Ok(ProcessingResult::skipped(
                    input_path,
                    SkipReason::AlreadyProcessed,
                    started,
                ));
            }
        }

        let img = orientation::load_oriented_image(input_path)?;
        let dimensions = ImageDimensions::from(img.dimensions());

        let boxes = self
            .detector
            .detect(input_path, &img, &self.config.detection)
            .with_context(|| {
                format!(
                    "{} detector failed on {}",
                    self.detector.name(),
                    input_path.display()
                )
            })?;

        if boxes.is_empty() {
            verbose_println(
                self.config.verbose,
                &format!("Skipping {}: no subjects detected", input_path.display()),
            );
            return Ok(ProcessingResult::skipped(
                input_path,
                SkipReason::NoSubjects,
                started,
            ));
        }

        let window = match calculate_crop(dimensions, &boxes) {
            Ok(window) => window,
            Err(CropError::InvalidDimensions { width, height, .. }) => {
                verbose_println(
                    self.config.verbose,
                    &format!(
                        "Skipping {}: {}x{} is too narrow",
                        input_path.display(),
                        width,
                        height
                    ),
                );
                return Ok(ProcessingResult::skipped(
                    input_path,
                    SkipReason::TooNarrow { width, height },
                    started,
                ));
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to place crop window for {}", input_path.display())
                })
            }
        };

        verbose_println(
            self.config.verbose,
            &format!(
                "{} {}x{}: {} box(es) -> x {}..{}",
                input_path.display(),
                dimensions.width,
                dimensions.height,
                boxes.len(),
                window.xmin,
                window.xmax
            ),
        );

        let output_path = self.output_path_for(input_path, output_dir)?;

        if !self.config.dry_run {
            if self.config.preview {
                let preview = annotate::render_preview(&img, &window, &boxes)?;
                self.writer.write(&preview, &output_path)?;
            } else {
                apply::write_cropped_image(&img, &window, self.writer.as_ref(), &output_path)?;
            }
        }

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path: Some(output_path),
            outcome: ImageOutcome::Cropped {
                window,
                box_count: boxes.len(),
            },
            processing_time: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detection::SidecarDetector;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    fn write_report(path: &Path, boxes: &[[i32; 4]]) {
        let detections: Vec<String> = boxes
            .iter()
            .map(|b| {
                format!(
                    r#"{{"box": [{}, {}, {}, {}], "confidence": 0.9}}"#,
                    b[0], b[1], b[2], b[3]
                )
            })
            .collect();
        std::fs::write(path, format!(r#"{{"detections": [{}]}}"#, detections.join(","))).unwrap();
    }

    fn engine(config: ProcessingConfig) -> ProcessingEngine {
        ProcessingEngine::new(config, Box::new(SidecarDetector::new(None))).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    /// wide.png has one subject, empty.png none, tall.png is portrait
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();

        create_test_image(320, 160).save(input.join("wide.png")).unwrap();
        write_report(&input.join("wide.json"), &[[200, 40, 240, 100]]);

        create_test_image(320, 160).save(input.join("empty.png")).unwrap();

        create_test_image(80, 160).save(input.join("tall.png")).unwrap();
        write_report(&input.join("tall.json"), &[[10, 10, 20, 20]]);

        std::fs::write(input.join("notes.txt"), "not an image").unwrap();

        Fixture {
            _dir: dir,
            input,
            output,
        }
    }

    #[test]
    fn test_discover_images_filters_extensions() {
        let fx = fixture();
        let engine = engine(ProcessingConfig::default());
        let files = engine.discover_images(&[fx.input.clone()]).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["empty.png", "tall.png", "wide.png"]);
    }

    #[test]
    fn test_discover_images_respects_recursion() {
        let fx = fixture();
        let nested = fx.input.join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        create_test_image(32, 16).save(nested.join("deep.png")).unwrap();

        let flat = engine(ProcessingConfig::default());
        assert_eq!(flat.discover_images(&[fx.input.clone()]).unwrap().len(), 3);

        let recursive = engine(ProcessingConfig {
            recursive: true,
            ..Default::default()
        });
        assert_eq!(recursive.discover_images(&[fx.input.clone()]).unwrap().len(), 4);
    }

    #[test]
    fn test_process_batch_writes_crops_and_skips() {
        let fx = fixture();
        let engine = engine(ProcessingConfig {
            parallel_jobs: 2,
            ..Default::default()
        });
        let files = engine.discover_images(&[fx.input.clone()]).unwrap();

        let callbacks = AtomicUsize::new(0);
        let results = engine
            .process_batch(&files, &fx.output, |_, _, _| {
                callbacks.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(callbacks.load(Ordering::Relaxed), 3);

        let outcomes: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().outcome.clone())
            .collect();

        assert_eq!(outcomes[0], ImageOutcome::Skipped(SkipReason::NoSubjects));
        assert_eq!(
            outcomes[1],
            ImageOutcome::Skipped(SkipReason::TooNarrow {
                width: 80,
                height: 160
            })
        );
        // target width 90, box midpoint 220 -> 220 - 45 = 175
        match &outcomes[2] {
            ImageOutcome::Cropped { window, box_count } => {
                assert_eq!((window.xmin, window.xmax), (175, 265));
                assert_eq!(*box_count, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let written = image::open(fx.output.join("wide.png")).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (90, 160));
        assert_eq!(written.get_pixel(0, 0), &Rgb([175, 0, 128]));
        assert!(!fx.output.join("empty.png").exists());
    }

    #[test]
    fn test_existing_outputs_are_skipped_unless_forced() {
        let fx = fixture();
        create_test_image(10, 10).save(fx.output.join("wide.png")).unwrap();
        let files = vec![fx.input.join("wide.png")];

        let results = engine(ProcessingConfig::default())
            .process_batch(&files, &fx.output, |_, _, _| {})
            .unwrap();
        assert_eq!(
            results[0].as_ref().unwrap().outcome,
            ImageOutcome::Skipped(SkipReason::AlreadyProcessed)
        );

        let forced = engine(ProcessingConfig {
            force: true,
            ..Default::default()
        });
        let results = forced.process_batch(&files, &fx.output, |_, _, _| {}).unwrap();
        assert!(matches!(
            results[0].as_ref().unwrap().outcome,
            ImageOutcome::Cropped { .. }
        ));
        let rewritten = image::open(fx.output.join("wide.png")).unwrap();
        assert_eq!(rewritten.width(), 90);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = fixture();
        let engine = engine(ProcessingConfig {
            dry_run: true,
            ..Default::default()
        });
        let results = engine
            .process_batch(&[fx.input.join("wide.png")], &fx.output, |_, _, _| {})
            .unwrap();

        let result = results[0].as_ref().unwrap();
        assert_eq!(result.output_path, Some(fx.output.join("wide.png")));
        assert!(!fx.output.join("wide.png").exists());
    }

    #[test]
    fn test_preview_mode_writes_overlay() {
        let fx = fixture();
        let engine = engine(ProcessingConfig {
            preview: true,
            ..Default::default()
        });
        engine
            .process_batch(&[fx.input.join("wide.png")], &fx.output, |_, _, _| {})
            .unwrap();

        let preview = image::open(fx.output.join(PREVIEW_DIR).join("wide.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(preview.dimensions(), (320, 160));
        assert_eq!(preview.get_pixel(175, 80), &Rgb([0, 255, 0]));
        assert!(!fx.output.join("wide.png").exists());
    }

    #[test]
    fn test_preview_skip_follows_preview_directory() {
        let fx = fixture();
        let files = vec![fx.input.join("wide.png")];
        let preview_engine = engine(ProcessingConfig {
            preview: true,
            ..Default::default()
        });

        // An existing crop does not block its preview
        create_test_image(10, 10).save(fx.output.join("wide.png")).unwrap();
        let results = preview_engine
            .process_batch(&files, &fx.output, |_, _, _| {})
            .unwrap();
        assert!(matches!(
            results[0].as_ref().unwrap().outcome,
            ImageOutcome::Cropped { .. }
        ));
        assert!(fx.output.join(PREVIEW_DIR).join("wide.png").exists());

        // A second preview run finds the overlay and skips it
        let results = preview_engine
            .process_batch(&files, &fx.output, |_, _, _| {})
            .unwrap();
        assert_eq!(
            results[0].as_ref().unwrap().outcome,
            ImageOutcome::Skipped(SkipReason::AlreadyProcessed)
        );

        // Crop mode ignores existing previews
        std::fs::remove_file(fx.output.join("wide.png")).unwrap();
        let results = engine(ProcessingConfig::default())
            .process_batch(&files, &fx.output, |_, _, _| {})
            .unwrap();
        assert!(matches!(
            results[0].as_ref().unwrap().outcome,
            ImageOutcome::Cropped { .. }
        ));
    }

    struct RecordingWriter {
        written: Arc<Mutex<Vec<(PathBuf, (u32, u32))>>>,
    }

    impl ImageWriter for RecordingWriter {
        fn write(&self, pixels: &RgbImage, destination: &Path) -> Result<()> {
            self.written
                .lock()
                .unwrap()
                .push((destination.to_path_buf(), pixels.dimensions()));
            Ok(())
        }
    }

    #[test]
    fn test_custom_writer_receives_crops() {
        let fx = fixture();
        let written = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(ProcessingConfig::default()).with_writer(Box::new(RecordingWriter {
            written: Arc::clone(&written),
        }));

        engine
            .process_batch(&[fx.input.join("wide.png")], &fx.output, |_, _, _| {})
            .unwrap();

        assert_eq!(
            written.lock().unwrap().as_slice(),
            &[(fx.output.join("wide.png"), (90, 160))]
        );
        assert!(!fx.output.join("wide.png").exists());
    }

    #[test]
    fn test_unreadable_image_is_an_error() {
        let fx = fixture();
        let broken = fx.input.join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();

        let results = engine(ProcessingConfig::default())
            .process_batch(&[broken], &fx.output, |_, _, _| {})
            .unwrap();
        assert!(results[0].is_err());
    }

    #[test]
    fn test_malformed_detection_is_an_error() {
        let fx = fixture();
        write_report(&fx.input.join("wide.json"), &[[50, 10, 50, 20]]);

        let results = engine(ProcessingConfig::default())
            .process_batch(&[fx.input.join("wide.png")], &fx.output, |_, _, _| {})
            .unwrap();
        let err = results[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("Failed to place crop window"));
    }
}

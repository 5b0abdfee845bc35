//! Subject detection collaborators
//!
//! Detection itself runs outside this crate. A detector is either an external
//! program that prints a JSON report on stdout, or a JSON report stored next to
//! each image. Both use the same report format:
//!
//! ```json
//! {
//!   "image": "IMG_001.jpg",
//!   "imagesize": { "width": 1920, "height": 1080 },
//!   "detections": [
//!     { "box": [800, 400, 900, 600], "confidence": 0.93, "class": "face", "class_id": 0 }
//!   ],
//!   "error": null
//! }
//! ```

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::geometry::DetectionBox;

/// Default detector settings, matching the bundled anime-face model
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 384;

/// Counter for unique temporary file names across worker threads
static TEMP_IMAGE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Options forwarded to the detector; they only change which boxes come back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub model_input_size: u32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    /// `[xmin, ymin, xmax, ymax]`
    #[serde(rename = "box")]
    pub bounding_box: [i32; 4],
    pub confidence: f32,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub class_id: Option<i32>,
}

impl From<&Detection> for DetectionBox {
    fn from(detection: &Detection) -> Self {
        let [xmin, ymin, xmax, ymax] = detection.bounding_box;
        DetectionBox::new(xmin, ymin, xmax, ymax, detection.confidence)
    }
}

/// JSON report produced by a detector run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionReport {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub imagesize: Option<ImageSize>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DetectionReport {
    /// Convert to boxes, applying the confidence and NMS thresholds
    pub fn into_boxes(self, options: &DetectionOptions) -> Result<Vec<DetectionBox>> {
        if let Some(error) = self.error {
            return Err(anyhow::anyhow!("Detector reported an error: {}", error));
        }

        let boxes: Vec<DetectionBox> = self.detections.iter().map(DetectionBox::from).collect();
        let boxes = filter_by_confidence(boxes, options.confidence_threshold);
        Ok(non_maximum_suppression(boxes, options.nms_threshold))
    }
}

/// Source of detection boxes for an image
pub trait SubjectDetector: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// `img` is the decoded, orientation-corrected buffer of `image_path`;
    /// returned coordinates refer to it.
    fn detect(
        &self,
        image_path: &Path,
        img: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionBox>>;
}

/// Runs an external detector program once per image
///
/// Invoked as
/// `<program> [extra args] --image <png> --output-format json --confidence <c> --nms <n> --size <s>`
/// and expected to print a [`DetectionReport`] on stdout.
pub struct CommandDetector {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: &Path, extra_args: Vec<String>) -> Result<Self> {
        if program.components().count() > 1 && !program.exists() {
            return Err(anyhow::anyhow!(
                "Detector program not found: {}",
                program.display()
            ));
        }

        Ok(Self {
            program: program.to_path_buf(),
            extra_args,
        })
    }

    fn run(&self, input: &Path, options: &DetectionOptions) -> Result<DetectionReport> {
        let output = Command::new(&self.program)
            .args(&self.extra_args)
            .arg("--image")
            .arg(input)
            .arg("--output-format")
            .arg("json")
            .arg("--confidence")
            .arg(options.confidence_threshold.to_string())
            .arg("--nms")
            .arg(options.nms_threshold.to_string())
            .arg("--size")
            .arg(options.model_input_size.to_string())
            .output()
            .with_context(|| format!("Failed to execute detector: {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Detector exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_report(&stdout)
    }

    /// Save the oriented buffer so the detector sees the same pixels we crop
    fn save_temp_image(&self, img: &RgbImage) -> Result<PathBuf> {
        let sequence = TEMP_IMAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = std::env::temp_dir().join(format!(
            "portrait_crop_{}_{}.png",
            std::process::id(),
            sequence
        ));

        img.save(&temp_path)
            .with_context(|| format!("Failed to write temporary image: {}", temp_path.display()))?;

        Ok(temp_path)
    }
}

impl SubjectDetector for CommandDetector {
    fn name(&self) -> &str {
        "command"
    }

    fn detect(
        &self,
        _image_path: &Path,
        img: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionBox>> {
        let temp_path = self.save_temp_image(img)?;
        let report = self.run(&temp_path, options);
        let _ = std::fs::remove_file(&temp_path);

        report?.into_boxes(options)
    }
}

/// Reads `<stem>.json` reports produced ahead of time
pub struct SidecarDetector {
    directory: Option<PathBuf>,
}

impl SidecarDetector {
    /// With no directory, reports are looked up next to each image
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    pub fn report_path(&self, image_path: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) => {
                let stem = image_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("image");
                dir.join(format!("{}.json", stem))
            }
            None => image_path.with_extension("json"),
        }
    }
}

impl SubjectDetector for SidecarDetector {
    fn name(&self) -> &str {
        "sidecar"
    }

    /// A missing report means nothing was detected
    fn detect(
        &self,
        image_path: &Path,
        _img: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionBox>> {
        let report_path = self.report_path(image_path);
        if !report_path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&report_path)
            .with_context(|| format!("Failed to read detection report: {}", report_path.display()))?;

        parse_report(&contents)
            .with_context(|| format!("Invalid detection report: {}", report_path.display()))?
            .into_boxes(options)
    }
}

/// Parse a detector report
pub fn parse_report(raw: &str) -> Result<DetectionReport> {
    serde_json::from_str(raw.trim())
        .with_context(|| format!("Failed to parse detector JSON output: {}", raw.trim()))
}

/// Drop boxes scoring below the threshold
pub fn filter_by_confidence(boxes: Vec<DetectionBox>, threshold: f32) -> Vec<DetectionBox> {
    boxes
        .into_iter()
        .filter(|b| b.confidence >= threshold)
        .collect()
}

/// Greedy non-maximum suppression.
///
/// Higher-confidence boxes win; survivors keep their original relative order.
pub fn non_maximum_suppression(boxes: Vec<DetectionBox>, iou_threshold: f32) -> Vec<DetectionBox> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[b].confidence.total_cmp(&boxes[a].confidence));

    let mut keep = vec![false; boxes.len()];
    let mut kept: Vec<usize> = Vec::new();

    for index in order {
        let suppressed = kept
            .iter()
            .any(|&k| boxes[k].iou(&boxes[index]) >= iou_threshold);
        if !suppressed {
            keep[index] = true;
            kept.push(index);
        }
    }

    boxes
        .into_iter()
        .zip(keep)
        .filter_map(|(b, keep)| keep.then_some(b))
        .collect()
}

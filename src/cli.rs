use clap::Parser;
use std::path::PathBuf;

use crate::image_processing::detection::{
    DetectionOptions, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MODEL_INPUT_SIZE,
    DEFAULT_NMS_THRESHOLD,
};

pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,webp,bmp,tiff";

#[derive(Parser, Debug)]
#[command(
    name = "portrait-crop",
    about = "Cut a full-height 9:16 portrait window out of landscape photos",
    long_about = "
Portrait Crop - subject-aware 9:16 cropping

For every landscape image the tool asks a subject detector for bounding
boxes, chooses the horizontal window of width height*9/16 that covers the
most subject area, and writes the cropped image under the same file name
in the output directory.

Example Usage:
  # Crop with an external detector that prints a JSON report
  portrait-crop -i ~/Photos -o ~/portrait --detector ./find_subject.py

  # Use pre-computed <image>.json reports next to the images
  portrait-crop -i ~/Photos -o ~/portrait --sidecar

  # Draw boxes and the chosen window instead of cropping
  portrait-crop -i ~/Photos -o ~/portrait --sidecar --preview

  # Show what would happen without writing anything
  portrait-crop -i ~/Photos -o ~/portrait --sidecar --dry-run --verbose --report"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "config_file",
        value_name = "DIR|FILE"
    )]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for cropped images
    #[arg(short = 'o', long = "output", default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Detector program; receives --image <png> and prints a JSON report on stdout
    #[arg(long = "detector", value_name = "PROGRAM", conflicts_with = "sidecar")]
    pub detector: Option<PathBuf>,

    /// Extra argument passed to the detector program before the standard ones
    #[arg(long = "detector-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub detector_args: Vec<String>,

    /// Read detections from <image stem>.json instead of running a program
    #[arg(long = "sidecar")]
    pub sidecar: bool,

    /// Directory holding sidecar reports (defaults to each image's directory)
    #[arg(long = "sidecar-dir", value_name = "DIR", requires = "sidecar")]
    pub sidecar_dir: Option<PathBuf>,

    /// Minimum detection confidence (0.0-1.0)
    #[arg(long = "confidence", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
    pub confidence_threshold: f32,

    /// IoU above which overlapping detections are merged (0.0-1.0)
    #[arg(long = "nms", default_value_t = DEFAULT_NMS_THRESHOLD, value_name = "THRESHOLD")]
    pub nms_threshold: f32,

    /// Detector input size in pixels
    #[arg(long = "model-size", default_value_t = DEFAULT_MODEL_INPUT_SIZE, value_name = "PIXELS")]
    pub model_size: u32,

    /// Write detection/crop overlays to <output>/preview instead of crops
    #[arg(long = "preview")]
    pub preview: bool,

    /// Process images even if the output file already exists
    #[arg(long = "force")]
    pub force: bool,

    /// Compute crop windows without writing any file
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Descend into subdirectories of input directories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = DEFAULT_EXTENSIONS)]
    pub extensions_str: String,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print a table with the chosen window for every image
    #[arg(long = "report")]
    pub report: bool,

    /// Emit progress as JSON lines on stdout instead of styled output
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// JSON configuration file; command-line values take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl Args {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions {
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            model_input_size: self.model_size,
        }
    }

    /// Worker count, resolving 0 to the number of CPUs
    pub fn parallel_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: PathBuf::from("."),
            detector: None,
            detector_args: vec![],
            sidecar: false,
            sidecar_dir: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            model_size: DEFAULT_MODEL_INPUT_SIZE,
            preview: false,
            force: false,
            dry_run: false,
            recursive: false,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            jobs: 0,
            verbose: false,
            report: false,
            json_progress: false,
            config_file: None,
        }
    }
}

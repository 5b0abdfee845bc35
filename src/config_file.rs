use crate::cli::{Args, DEFAULT_EXTENSIONS};
use crate::image_processing::detection::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MODEL_INPUT_SIZE, DEFAULT_NMS_THRESHOLD,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Saved settings; every key is optional
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub input_paths: Option<Vec<String>>,
    pub output_path: Option<String>,
    pub detector: Option<String>,
    pub detector_args: Option<Vec<String>>,
    pub sidecar: Option<bool>,
    pub sidecar_dir: Option<String>,
    pub confidence_threshold: Option<f32>,
    pub nms_threshold: Option<f32>,
    pub model_size: Option<u32>,
    pub preview: Option<bool>,
    pub force: Option<bool>,
    pub dry_run: Option<bool>,
    pub recursive: Option<bool>,
    pub extensions: Option<String>,
    pub jobs: Option<usize>,
    pub verbose: Option<bool>,
    pub report: Option<bool>,
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            self.merge_from_config(config);
        }
        Ok(())
    }

    /// A config value only lands where the argument still holds its default
    pub fn merge_from_config(&mut self, config: ConfigFile) {
        if self.input_paths.is_empty() {
            if let Some(inputs) = config.input_paths {
                self.input_paths = inputs.into_iter().map(PathBuf::from).collect();
            }
        }

        if self.output_dir == PathBuf::from(".") {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        // Detector source: the command line wins as a whole
        if self.detector.is_none() && !self.sidecar {
            self.detector = config.detector.map(PathBuf::from);
            self.sidecar = config.sidecar.unwrap_or(false);
        }

        if self.detector_args.is_empty() {
            if let Some(extra) = config.detector_args {
                self.detector_args = extra;
            }
        }

        if self.sidecar_dir.is_none() {
            self.sidecar_dir = config.sidecar_dir.map(PathBuf::from);
        }

        if self.confidence_threshold == DEFAULT_CONFIDENCE_THRESHOLD {
            if let Some(threshold) = config.confidence_threshold {
                self.confidence_threshold = threshold;
            }
        }

        if self.nms_threshold == DEFAULT_NMS_THRESHOLD {
            if let Some(threshold) = config.nms_threshold {
                self.nms_threshold = threshold;
            }
        }

        if self.model_size == DEFAULT_MODEL_INPUT_SIZE {
            if let Some(size) = config.model_size {
                self.model_size = size;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.preview {
            self.preview = config.preview.unwrap_or(false);
        }

        if !self.force {
            self.force = config.force.unwrap_or(false);
        }

        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        if !self.recursive {
            self.recursive = config.recursive.unwrap_or(false);
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        if !self.report {
            self.report = config.report.unwrap_or(false);
        }

        if self.extensions_str == DEFAULT_EXTENSIONS {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        if self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }
    }
}

// Library exports for the binary and for embedding the crop pipeline elsewhere
pub mod cli;
pub mod config_file;
pub mod image_processing;
pub mod json_output;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use image_processing::apply::{apply_crop, write_cropped_image, ImageSource, ImageWriter};
pub use image_processing::crop_window::{calculate_crop, CropError};
pub use image_processing::detection::{
    CommandDetector, DetectionOptions, SidecarDetector, SubjectDetector,
};
pub use image_processing::geometry::{CropWindow, DetectionBox, ImageDimensions};
pub use image_processing::{
    ImageOutcome, ProcessingConfig, ProcessingEngine, ProcessingResult, SkipReason,
};
pub use json_output::JsonMessage;

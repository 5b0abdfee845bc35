//! Geometry primitives shared by the crop search and the preview overlay
//!
//! All coordinates are integer pixels with the origin in the top-left corner.
//! Horizontal ranges are half-open: a window `[xmin, xmax)` is `xmax - xmin` wide.

use serde::{Deserialize, Serialize};

/// Portrait aspect ratio used for the output window (width:height = 9:16)
pub const ASPECT_WIDTH: u32 = 9;
pub const ASPECT_HEIGHT: u32 = 16;

/// A detected region of interest (face, person, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
    /// Detector score in `[0, 1]`, carried through unchanged
    pub confidence: f32,
}

impl DetectionBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
        }
    }

    pub fn width(&self) -> i64 {
        self.xmax as i64 - self.xmin as i64
    }

    pub fn height(&self) -> i64 {
        self.ymax as i64 - self.ymin as i64
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Horizontal midpoint, kept fractional for odd widths
    pub fn mid_x(&self) -> f64 {
        (self.xmin as f64 + self.xmax as f64) / 2.0
    }

    /// Both axes must have positive extent
    pub fn is_well_formed(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }

    /// Intersection over union, used for duplicate suppression
    pub fn iou(&self, other: &DetectionBox) -> f32 {
        let inter_x1 = self.xmin.max(other.xmin) as i64;
        let inter_y1 = self.ymin.max(other.ymin) as i64;
        let inter_x2 = self.xmax.min(other.xmax) as i64;
        let inter_y2 = self.ymax.min(other.ymax) as i64;

        if inter_x2 <= inter_x1 || inter_y2 <= inter_y1 {
            return 0.0;
        }

        let inter_area = (inter_x2 - inter_x1) * (inter_y2 - inter_y1);
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0 {
            return 0.0;
        }

        inter_area as f32 / union_area as f32
    }
}

/// Height and width of the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub height: u32,
    pub width: u32,
}

impl ImageDimensions {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Width of a full-height 9:16 window for this image
    pub fn target_width(&self) -> u32 {
        target_width(self.height)
    }
}

impl From<(u32, u32)> for ImageDimensions {
    /// Build from `image`-style `(width, height)` tuples
    fn from((width, height): (u32, u32)) -> Self {
        Self { height, width }
    }
}

/// `floor(height * 9 / 16)`
pub fn target_width(height: u32) -> u32 {
    ((height as u64 * ASPECT_WIDTH as u64) / ASPECT_HEIGHT as u64) as u32
}

/// The selected horizontal crop; always spans the full image height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    pub xmin: u32,
    pub xmax: u32,
    pub ymin: u32,
    pub ymax: u32,
    /// Confidence of the representative box
    pub confidence: f32,
}

impl CropWindow {
    /// Zero for an inverted window
    pub fn width(&self) -> u32 {
        self.xmax.saturating_sub(self.xmin)
    }

    pub fn height(&self) -> u32 {
        self.ymax.saturating_sub(self.ymin)
    }

    /// True when the box lies entirely inside the window horizontally
    pub fn encloses(&self, detection: &DetectionBox) -> bool {
        detection.xmin >= self.xmin as i32 && detection.xmax <= self.xmax as i32
    }
}

/// Contribution of one box to a candidate window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    /// Fraction of the box counted as covered, 0..=1
    pub weight: f64,
    /// Covered pixel area
    pub area: i64,
}

impl Overlap {
    pub const NONE: Overlap = Overlap {
        weight: 0.0,
        area: 0,
    };
}

/// Score a box against the window `[window_left, window_right]`.
///
/// Only boxes that are fully inside, or that cross the right edge, contribute.
/// A box that crosses only the left edge scores nothing; window selection
/// depends on this rule, so it must not be made symmetric.
pub fn overlap_fraction(detection: &DetectionBox, window_left: i64, window_right: i64) -> Overlap {
    let xmin = detection.xmin as i64;
    let xmax = detection.xmax as i64;

    if xmax < window_left {
        return Overlap::NONE;
    }

    if xmin >= window_left && xmax <= window_right {
        return Overlap {
            weight: 1.0,
            area: detection.area(),
        };
    }

    if xmin <= window_right && xmax > window_right {
        let covered = window_right - xmin;
        return Overlap {
            weight: covered as f64 / (xmax - xmin) as f64,
            area: covered * detection.height(),
        };
    }

    Overlap::NONE
}

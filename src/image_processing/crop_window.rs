//! Crop window selection
//!
//! Picks a single full-height 9:16 window out of a landscape image so that it
//! covers as many detected subjects as possible. One box is simply centred;
//! several boxes go through an exhaustive sliding-window search with a fixed
//! tie-break order (score, then covered area, then the median position).

use thiserror::Error;

use super::geometry::{overlap_fraction, CropWindow, DetectionBox, ImageDimensions};

#[derive(Debug, Error, PartialEq)]
pub enum CropError {
    #[error(
        "No {target_width}px wide window fits in a {width}x{height} image"
    )]
    InvalidDimensions {
        width: u32,
        height: u32,
        target_width: u32,
    },

    #[error("At least one detection box is required to place a crop window")]
    EmptyBoxList,

    #[error("No window position overlaps any detection box in a {width}px wide image")]
    NoCandidateWindow { width: u32 },

    #[error(
        "Detection box #{index} is malformed: ({xmin},{ymin})-({xmax},{ymax})"
    )]
    MalformedBox {
        index: usize,
        xmin: i32,
        ymin: i32,
        xmax: i32,
        ymax: i32,
    },
}

/// A top-scoring window position
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    rect_left: i64,
    area: i64,
}

/// Compute the crop window for an image and its detection boxes.
///
/// The input slice is not modified; multi-box placement works on a copy
/// sorted by `xmin` (stable, so equal `xmin` keeps detector order).
pub fn calculate_crop(
    dimensions: ImageDimensions,
    boxes: &[DetectionBox],
) -> Result<CropWindow, CropError> {
    let target_width = checked_target_width(dimensions)?;

    if boxes.is_empty() {
        return Err(CropError::EmptyBoxList);
    }
    validate_boxes(boxes)?;

    let (unclamped_xmin, confidence) = if let [single] = boxes {
        (center_on_box(single, target_width), single.confidence)
    } else {
        let mut sorted = boxes.to_vec();
        sorted.sort_by_key(|b| b.xmin);
        let rect_left = coverage_search(&sorted, dimensions.width, target_width)?;
        (rect_left, sorted[0].confidence)
    };

    let (xmin, xmax) = clamp_window(unclamped_xmin, target_width, dimensions.width);

    Ok(CropWindow {
        xmin,
        xmax,
        ymin: 0,
        ymax: dimensions.height,
        confidence,
    })
}

/// Target width for the image, or `InvalidDimensions` when no window fits
pub fn checked_target_width(dimensions: ImageDimensions) -> Result<u32, CropError> {
    let target_width = dimensions.target_width();
    if dimensions.width == 0 || target_width == 0 || target_width > dimensions.width {
        return Err(CropError::InvalidDimensions {
            width: dimensions.width,
            height: dimensions.height,
            target_width,
        });
    }
    Ok(target_width)
}

fn validate_boxes(boxes: &[DetectionBox]) -> Result<(), CropError> {
    match boxes.iter().enumerate().find(|(_, b)| !b.is_well_formed()) {
        Some((index, b)) => Err(CropError::MalformedBox {
            index,
            xmin: b.xmin,
            ymin: b.ymin,
            xmax: b.xmax,
            ymax: b.ymax,
        }),
        None => Ok(()),
    }
}

/// Left edge that centres the window on the box midpoint
///
/// Half the target width is taken in whole pixels before subtracting, and the
/// result is truncated toward zero.
pub fn center_on_box(detection: &DetectionBox, target_width: u32) -> i64 {
    let half_width = (target_width / 2) as f64;
    (detection.mid_x() - half_width).trunc() as i64
}

/// Score and covered area of the window starting at `rect_left`.
///
/// `sorted` must be ordered by `xmin`; scanning stops at the first box that
/// starts right of the window.
pub fn score_window(sorted: &[DetectionBox], rect_left: i64, target_width: u32) -> (f64, i64) {
    let rect_right = rect_left + target_width as i64;
    let mut score = 0.0;
    let mut area = 0;

    for detection in sorted {
        if detection.xmin as i64 > rect_right {
            break;
        }
        let overlap = overlap_fraction(detection, rect_left, rect_right);
        score += overlap.weight;
        area += overlap.area;
    }

    (score, area)
}

/// Sliding-window search over every left edge in `[0, width - target_width)`.
///
/// Keeps the positions with the highest score, then the highest covered area
/// among those, and returns the median of the survivors (`len / 2`).
fn coverage_search(
    sorted: &[DetectionBox],
    width: u32,
    target_width: u32,
) -> Result<i64, CropError> {
    // A window as wide as the image has exactly one position.
    if target_width == width {
        return Ok(0);
    }

    let mut best_score = 0.0;
    let mut candidates: Vec<Candidate> = Vec::new();

    for rect_left in 0..(width - target_width) as i64 {
        let (score, area) = score_window(sorted, rect_left, target_width);
        if score <= 0.0 {
            continue;
        }

        if score > best_score {
            best_score = score;
            candidates.clear();
        }
        if score == best_score {
            candidates.push(Candidate { rect_left, area });
        }
    }

    let max_area = candidates
        .iter()
        .map(|c| c.area)
        .max()
        .ok_or(CropError::NoCandidateWindow { width })?;

    // Pushed in ascending rect_left order, so the filtered list stays sorted.
    let best: Vec<&Candidate> = candidates.iter().filter(|c| c.area == max_area).collect();
    Ok(best[best.len() / 2].rect_left)
}

/// Move an unconstrained left edge inside `[0, width]`
pub fn clamp_window(xmin: i64, target_width: u32, width: u32) -> (u32, u32) {
    if xmin < 0 {
        (0, target_width)
    } else if xmin + target_width as i64 > width as i64 {
        (width - target_width, width)
    } else {
        (xmin as u32, xmin as u32 + target_width)
    }
}

use anyhow::{Context, Result};
use exif::{In, Reader, Tag, Value};
use image::{imageops, RgbImage};
use std::path::Path;

/// EXIF orientation tag values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    /// Tag missing or out of range
    Undefined = 0,
    TopLeft = 1,
    /// Mirrored horizontally
    TopRight = 2,
    /// Rotated 180°
    BottomRight = 3,
    /// Mirrored vertically
    BottomLeft = 4,
    /// Transposed (mirror + 90° CCW)
    LeftTop = 5,
    /// Needs 90° CW to display upright
    RightTop = 6,
    /// Transverse (mirror + 90° CW)
    RightBottom = 7,
    /// Needs 90° CCW to display upright
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

/// Decode an image as RGB8 and turn it upright according to its EXIF tag
///
/// Detection and cropping both work on the upright buffer, so box
/// coordinates and crop windows always refer to the same pixels.
pub fn load_oriented_image(image_path: &Path) -> Result<RgbImage> {
    let img = image::open(image_path)
        .with_context(|| format!("Failed to open image: {}", image_path.display()))?
        .to_rgb8();

    let orientation = read_exif_orientation(image_path).unwrap_or(ExifOrientation::Undefined);
    Ok(apply_rotation(img, orientation))
}

/// Read the EXIF orientation tag; files without EXIF data are an error here
pub fn read_exif_orientation(image_path: &Path) -> Result<ExifOrientation> {
    let file = std::fs::File::open(image_path).with_context(|| {
        format!(
            "Failed to open image for EXIF reading: {}",
            image_path.display()
        )
    })?;

    let mut buf_reader = std::io::BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf_reader)
        .context("Failed to read EXIF data")?;

    if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
        if let Value::Short(values) = &field.value {
            if let Some(&orientation_value) = values.first() {
                return Ok(ExifOrientation::from(orientation_value as u32));
            }
        }
    }

    Ok(ExifOrientation::Undefined)
}

/// Apply the rotation/flip that makes the image upright
pub fn apply_rotation(img: RgbImage, orientation: ExifOrientation) -> RgbImage {
    match orientation {
        ExifOrientation::Undefined | ExifOrientation::TopLeft => img,
        ExifOrientation::TopRight => imageops::flip_horizontal(&img),
        ExifOrientation::BottomRight => imageops::rotate180(&img),
        ExifOrientation::BottomLeft => imageops::flip_vertical(&img),
        ExifOrientation::LeftTop => imageops::flip_horizontal(&imageops::rotate90(&img)),
        ExifOrientation::RightTop => imageops::rotate90(&img),
        ExifOrientation::RightBottom => imageops::flip_horizontal(&imageops::rotate270(&img)),
        ExifOrientation::LeftBottom => imageops::rotate270(&img),
    }
}

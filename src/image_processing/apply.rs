use anyhow::{Context, Result};
use image::{imageops, ImageBuffer, Pixel, RgbImage};
use std::ops::Range;
use std::path::Path;

use super::geometry::{CropWindow, ImageDimensions};

/// Pixel buffer that can hand out rectangular sub-regions
pub trait ImageSource {
    type Region;

    fn dimensions(&self) -> ImageDimensions;

    /// Copy of the pixels in `rows` x `cols`
    fn region(&self, rows: Range<u32>, cols: Range<u32>) -> Self::Region;
}

impl<P> ImageSource for ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    type Region = ImageBuffer<P, Vec<P::Subpixel>>;

    fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.height(), self.width())
    }

    fn region(&self, rows: Range<u32>, cols: Range<u32>) -> Self::Region {
        imageops::crop_imm(
            self,
            cols.start,
            rows.start,
            cols.end.saturating_sub(cols.start),
            rows.end.saturating_sub(rows.start),
        )
        .to_image()
    }
}

/// Destination for encoded output images
pub trait ImageWriter: Send + Sync {
    fn write(&self, pixels: &RgbImage, destination: &Path) -> Result<()>;
}

/// Writes images to disk, format picked from the file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageWriter;

impl ImageWriter for FileImageWriter {
    fn write(&self, pixels: &RgbImage, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }

        pixels
            .save(destination)
            .with_context(|| format!("Failed to save image: {}", destination.display()))
    }
}

/// Extract the window's pixels from the source image
pub fn apply_crop<S: ImageSource>(source: &S, window: &CropWindow) -> Result<S::Region> {
    let dimensions = source.dimensions();

    if window.xmax > dimensions.width || window.ymax > dimensions.height {
        return Err(anyhow::anyhow!(
            "Crop window exceeds image bounds: x {}..{}, y {}..{} on {}x{} image",
            window.xmin,
            window.xmax,
            window.ymin,
            window.ymax,
            dimensions.width,
            dimensions.height
        ));
    }

    Ok(source.region(window.ymin..window.ymax, window.xmin..window.xmax))
}

/// Crop and hand the result to the writer
pub fn write_cropped_image(
    img: &RgbImage,
    window: &CropWindow,
    writer: &dyn ImageWriter,
    destination: &Path,
) -> Result<()> {
    let cropped = apply_crop(img, window)?;
    writer.write(&cropped, destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn window(xmin: u32, xmax: u32, height: u32) -> CropWindow {
        CropWindow {
            xmin,
            xmax,
            ymin: 0,
            ymax: height,
            confidence: 1.0,
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        written: Mutex<Vec<(PathBuf, (u32, u32))>>,
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
    fn test_apply_crop_copies_region() {
        let img = create_test_image(320, 180);
        let cropped = apply_crop(&img, &window(40, 141, 180)).unwrap();

        assert_eq!(cropped.dimensions(), (101, 180));
        assert_eq!(cropped.get_pixel(0, 0), img.get_pixel(40, 0));
        assert_eq!(cropped.get_pixel(100, 179), img.get_pixel(140, 179));
    }

    #[test]
    fn test_apply_crop_rejects_out_of_bounds_window() {
        let img = create_test_image(100, 50);
        assert!(apply_crop(&img, &window(80, 120, 50)).is_err());
        assert!(apply_crop(&img, &window(0, 20, 60)).is_err());
    }

    #[test]
    fn test_image_source_dimensions() {
        let img = create_test_image(64, 32);
        assert_eq!(ImageSource::dimensions(&img), ImageDimensions::new(32, 64));
    }

    #[test]
    fn test_write_cropped_image_forwards_region() {
        let img = create_test_image(320, 180);
        let writer = RecordingWriter::default();
        let destination = PathBuf::from("out/wallpaper.png");

        write_cropped_image(&img, &window(0, 101, 180), &writer, &destination).unwrap();

        let written = writer.written.lock().unwrap();
        assert_eq!(written.as_slice(), &[(destination, (101, 180))]);
    }

    #[test]
    fn test_file_writer_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested").join("crop.png");
        let img = create_test_image(16, 16);

        FileImageWriter.write(&img, &destination).unwrap();

        let reloaded = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(reloaded, img);
    }
}

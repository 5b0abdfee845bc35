//! Preview overlays: detections and the chosen crop drawn on the full image

use anyhow::Result;
use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::geometry::{CropWindow, DetectionBox};

/// Height the preview is scaled to
pub const PREVIEW_HEIGHT: u32 = 720;
pub const LINE_THICKNESS: u32 = 3;

const DETECTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const WINDOW_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw every detection box in red and the crop window in green
pub fn draw_crop_overlay(
    img: &RgbImage,
    window: &CropWindow,
    boxes: &[DetectionBox],
) -> RgbImage {
    let mut canvas = img.clone();

    for detection in boxes {
        draw_thick_rect(
            &mut canvas,
            detection.xmin,
            detection.ymin,
            detection.width().max(1) as u32,
            detection.height().max(1) as u32,
            DETECTION_COLOR,
        );
    }

    draw_thick_rect(
        &mut canvas,
        window.xmin as i32,
        window.ymin as i32,
        window.width(),
        window.height(),
        WINDOW_COLOR,
    );

    canvas
}

/// Overlay scaled down to [`PREVIEW_HEIGHT`]; smaller images are left as-is
pub fn render_preview(
    img: &RgbImage,
    window: &CropWindow,
    boxes: &[DetectionBox],
) -> Result<RgbImage> {
    let overlay = draw_crop_overlay(img, window, boxes);
    let (width, height) = overlay.dimensions();

    if height <= PREVIEW_HEIGHT {
        return Ok(overlay);
    }

    let preview_width = ((width as u64 * PREVIEW_HEIGHT as u64) / height as u64).max(1) as u32;
    resize_image(&overlay, preview_width, PREVIEW_HEIGHT)
}

/// Nested one-pixel rectangles, growing inward
fn draw_thick_rect(canvas: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    for inset in 0..LINE_THICKNESS {
        let inner_width = width.saturating_sub(inset * 2);
        let inner_height = height.saturating_sub(inset * 2);
        if inner_width == 0 || inner_height == 0 {
            break;
        }

        let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(inner_width, inner_height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn resize_image(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    let src_image = Image::from_vec_u8(src_width, src_height, img.as_raw().clone(), PixelType::U8x3)?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    resizer.resize(&src_image, &mut dst_image, Some(&ResizeOptions::default()))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| anyhow::anyhow!("Resized buffer does not match {}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(xmin: u32, xmax: u32, height: u32) -> CropWindow {
        CropWindow {
            xmin,
            xmax,
            ymin: 0,
            ymax: height,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_overlay_draws_window_and_boxes() {
        let img = RgbImage::new(200, 100);
        let boxes = [DetectionBox::new(80, 20, 120, 60, 0.9)];
        let overlay = draw_crop_overlay(&img, &window(50, 106, 100), &boxes);

        assert_eq!(overlay.dimensions(), (200, 100));
        // Window border, left edge and two pixels inward
        assert_eq!(*overlay.get_pixel(50, 50), WINDOW_COLOR);
        assert_eq!(*overlay.get_pixel(52, 50), WINDOW_COLOR);
        assert_eq!(*overlay.get_pixel(53, 50), Rgb([0, 0, 0]));
        // Detection border
        assert_eq!(*overlay.get_pixel(80, 40), DETECTION_COLOR);
        // Source untouched
        assert_eq!(*img.get_pixel(50, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_preview_scaled_to_fixed_height() {
        let img = RgbImage::new(1920, 1080);
        let preview = render_preview(&img, &window(0, 607, 1080), &[]).unwrap();
        assert_eq!(preview.dimensions(), (1280, PREVIEW_HEIGHT));
    }

    #[test]
    fn test_small_preview_not_upscaled() {
        let img = RgbImage::new(320, 180);
        let preview = render_preview(&img, &window(0, 101, 180), &[]).unwrap();
        assert_eq!(preview.dimensions(), (320, 180));
    }
}

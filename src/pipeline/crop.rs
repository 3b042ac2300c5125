//! Page cropping geometry.
//!
//! A page is cut to a fixed width:height ratio by trimming the excess
//! dimension symmetrically. The cut happens twice: once in page space, to
//! pick the region worth rasterising, and once in pixel space, because
//! rounding after scaling can leave the raster a pixel off the exact ratio.

use crate::config::CropRatio;
use image::DynamicImage;
use serde::Serialize;

/// A rectangle in page space (points, top-down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Largest centred rectangle of `ratio` that fits a `width` × `height` page.
///
/// A page wider than the ratio loses equal margins left and right; a taller
/// one loses equal margins top and bottom.
pub fn crop_rect(width: f32, height: f32, ratio: CropRatio) -> PageRect {
    let target = ratio.as_f32();
    if height <= 0.0 || width <= 0.0 {
        return PageRect {
            x0: 0.0,
            y0: 0.0,
            x1: width.max(0.0),
            y1: height.max(0.0),
        };
    }

    if width / height > target {
        let new_width = height * target;
        let x_offset = (width - new_width) / 2.0;
        PageRect {
            x0: x_offset,
            y0: 0.0,
            x1: x_offset + new_width,
            y1: height,
        }
    } else {
        let new_height = width / target;
        let y_offset = (height - new_height) / 2.0;
        PageRect {
            x0: 0.0,
            y0: y_offset,
            x1: width,
            y1: y_offset + new_height,
        }
    }
}

/// Cut `rect` (page space) out of a page raster rendered at `scale`.
///
/// The pixel box is clamped to the raster so float rounding can never
/// address pixels outside the image.
pub fn crop_scaled(raster: &DynamicImage, rect: PageRect, scale: f32) -> DynamicImage {
    let (w, h) = (raster.width(), raster.height());
    let left = ((rect.x0 * scale).round().max(0.0) as u32).min(w);
    let top = ((rect.y0 * scale).round().max(0.0) as u32).min(h);
    let right = ((rect.x1 * scale).round().max(0.0) as u32).clamp(left, w);
    let bottom = ((rect.y1 * scale).round().max(0.0) as u32).clamp(top, h);
    raster.crop_imm(left, top, right - left, bottom - top)
}

/// Trim a raster so that `width * den == height * num` holds exactly.
///
/// Returns `None` when the raster is too small to hold a single
/// `num` × `den` block.
pub fn exact_ratio_crop(img: &DynamicImage, ratio: CropRatio) -> Option<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    let k = (w / ratio.num).min(h / ratio.den);
    if k == 0 {
        return None;
    }
    let (tw, th) = (k * ratio.num, k * ratio.den);
    if (tw, th) == (w, h) {
        return Some(img.clone());
    }
    let left = (w - tw) / 2;
    let top = (h - th) / 2;
    Some(img.crop_imm(left, top, tw, th))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    #[test]
    fn wide_page_trims_sides() {
        // US Letter landscape
        let r = crop_rect(792.0, 612.0, CropRatio::default());
        assert!((r.width() - 459.0).abs() < 1e-3);
        assert_eq!(r.height(), 612.0);
        assert!((r.x0 - (792.0 - 459.0) / 2.0).abs() < 1e-3);
        assert!((r.x0 - (792.0 - r.x1)).abs() < 1e-3);
    }

    #[test]
    fn tall_page_trims_top_and_bottom() {
        // A4 portrait is taller than 3:4
        let r = crop_rect(595.0, 842.0, CropRatio::default());
        assert_eq!(r.width(), 595.0);
        assert!((r.height() - 595.0 * 4.0 / 3.0).abs() < 1e-3);
        assert!((r.y0 - (842.0 - r.y1)).abs() < 1e-3);
    }

    #[test]
    fn exact_page_is_untouched() {
        let r = crop_rect(300.0, 400.0, CropRatio::default());
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (0.0, 0.0, 300.0, 400.0));
    }

    #[test]
    fn exact_ratio_holds_after_pixel_crop() {
        for (w, h) in [(1191, 1587), (1190, 1588), (917, 1224), (601, 799)] {
            let out = exact_ratio_crop(&blank(w, h), CropRatio::default()).unwrap();
            assert_eq!(out.width() * 4, out.height() * 3, "from {w}x{h}");
            assert!(out.width() <= w && out.height() <= h);
        }
    }

    #[test]
    fn tiny_raster_has_no_crop() {
        assert!(exact_ratio_crop(&blank(2, 2), CropRatio::default()).is_none());
    }

    #[test]
    fn other_ratios() {
        let square = CropRatio::new(1, 1).unwrap();
        let out = exact_ratio_crop(&blank(50, 30), square).unwrap();
        assert_eq!((out.width(), out.height()), (30, 30));
    }

    #[test]
    fn scaled_crop_is_clamped() {
        let raster = blank(200, 260);
        let rect = PageRect {
            x0: 0.0,
            y0: 10.0,
            x1: 100.0,
            y1: 140.0,
        };
        let out = crop_scaled(&raster, rect, 2.0);
        assert_eq!((out.width(), out.height()), (200, 240));
    }
}

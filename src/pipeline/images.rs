//! Image extraction: raw page images → PNG files on disk.
//!
//! CMYK-class images (four or more colour channels) are skipped; everything
//! else is normalised to RGB and written as
//! `{images_dir}/{base}_page{page}_img{index}.png`. The index is the image's
//! position on the page, so skipped images leave gaps in the numbering.

use crate::error::ItemError;
use crate::model::{ExtractedImage, RawImage};
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::{debug, warn};

/// Result of extracting one page's images.
#[derive(Debug, Default)]
pub struct PageImages {
    pub images: Vec<ExtractedImage>,
    /// CMYK-class images that were left out.
    pub skipped: usize,
    pub failures: Vec<ItemError>,
}

/// Save every usable image of `page` into `images_dir`.
///
/// The directory must already exist. A failure to write one image is
/// recorded in [`PageImages::failures`] and does not stop the others.
pub fn extract_page_images(
    page: usize,
    raws: Vec<RawImage>,
    images_dir: &Path,
    base: &str,
) -> PageImages {
    let mut out = PageImages::default();

    for raw in raws {
        if raw.is_cmyk() {
            debug!(
                "Skipping page {} image {}: {} colour channels",
                page,
                raw.index,
                raw.color_channels()
            );
            out.skipped += 1;
            continue;
        }

        let filename = ExtractedImage::file_name_for(base, page, raw.index);
        let path = images_dir.join(&filename);
        let rgb = normalise(raw.pixels, raw.has_alpha);
        let (width, height) = (rgb.width(), rgb.height());

        match rgb.save_with_format(&path, ImageFormat::Png) {
            Ok(()) => {
                debug!("Saved {} ({}x{})", filename, width, height);
                out.images.push(ExtractedImage {
                    filename,
                    path,
                    page,
                    index: raw.index,
                    width,
                    height,
                });
            }
            Err(e) => {
                warn!("Page {} image {}: could not save: {}", page, raw.index, e);
                out.failures.push(ItemError::ImageExtraction {
                    page,
                    index: raw.index,
                    detail: e.to_string(),
                });
            }
        }
    }

    out
}

/// Drop alpha and any exotic sample type; PNG output is always 8-bit RGB.
fn normalise(pixels: DynamicImage, has_alpha: bool) -> DynamicImage {
    match pixels {
        DynamicImage::ImageRgb8(_) if !has_alpha => pixels,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

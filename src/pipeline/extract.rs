//! pdfium adapter: open a PDF and walk its pages.
//!
//! Two blocking walks live here:
//!
//! * [`extract_blocking`] turns every text object into a [`TextFragment`] and
//!   every image object into a [`RawImage`], page by page;
//! * [`rasterise_blocking`] renders each page and cuts it to the crop ratio.
//!
//! pdfium is a C++ library with thread-local state, so the async wrappers
//! move the work onto tokio's blocking pool. A panic inside the blocking task
//! surfaces as [`ConvertError::Internal`]; the `PdfDocument` is owned by the
//! closure and closed by `Drop` on every path.

use crate::config::{CropRatio, PageSelection};
use crate::error::{ConvertError, ItemError};
use crate::model::{BBox, PageContent, RawImage, StyleFlags, TextFragment};
use crate::pipeline::crop::{crop_rect, crop_scaled, exact_ratio_crop};
use crate::progress::ProgressCallback;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// What the text/image walk needs to know.
#[derive(Clone, Default)]
pub struct ExtractOptions {
    pub password: Option<String>,
    pub pages: PageSelection,
    /// Decode image objects; with `false` only text is read.
    pub with_images: bool,
    pub progress: Option<ProgressCallback>,
}

/// Everything read from one document.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Pages in the document, selected or not.
    pub total_pages: usize,
    /// Selected pages in ascending order.
    pub pages: Vec<PageContent>,
    /// Text objects whose text was blank.
    pub dropped_fragments: usize,
    pub item_errors: Vec<ItemError>,
}

impl Extraction {
    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.fragments.len()).sum()
    }

    pub fn has_content(&self) -> bool {
        self.pages
            .iter()
            .any(|p| !p.fragments.is_empty() || !p.images.is_empty())
    }
}

/// Cropped page rasters, 1-indexed page numbers.
#[derive(Debug, Default)]
pub struct Rasterised {
    pub total_pages: usize,
    pub pages: Vec<(usize, DynamicImage)>,
}

// ── Binding and loading ─────────────────────────────────────────────────

/// Bind to `PDFIUM_LIB_PATH` when it names an existing file, otherwise to
/// the system library.
pub fn bind_pdfium() -> Result<Pdfium, ConvertError> {
    let explicit = std::env::var_os(PDFIUM_LIB_PATH_ENV)
        .map(PathBuf::from)
        .filter(|p| p.is_file());

    let bindings = match explicit {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path).or_else(|e| {
                warn!(
                    "Could not bind {} ({:?}), falling back to system pdfium",
                    path.display(),
                    e
                );
                Pdfium::bind_to_system_library()
            })
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ConvertError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ConvertError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ConvertError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Resolve the selection against the real page count.
fn selected_indices(
    path: &Path,
    selection: &PageSelection,
    total_pages: usize,
) -> Result<Vec<usize>, ConvertError> {
    if total_pages == 0 {
        return Err(ConvertError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(ConvertError::PageOutOfRange {
            page: selection.first_requested().unwrap_or(0),
            total: total_pages,
        });
    }
    Ok(indices)
}

// ── Text and image walk ─────────────────────────────────────────────────

/// Async wrapper around [`extract_blocking`].
pub async fn extract(pdf_path: &Path, opts: &ExtractOptions) -> Result<Extraction, ConvertError> {
    let path = pdf_path.to_path_buf();
    let opts = opts.clone();
    tokio::task::spawn_blocking(move || extract_blocking(&path, &opts))
        .await
        .map_err(|e| ConvertError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Walk the selected pages, collecting fragments and raw images.
pub fn extract_blocking(pdf_path: &Path, opts: &ExtractOptions) -> Result<Extraction, ConvertError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, opts.password.as_deref())?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selected_indices(pdf_path, &opts.pages, total_pages)?;
    let selected = indices.len();
    if let Some(cb) = &opts.progress {
        cb.on_conversion_start(selected);
    }

    let mut out = Extraction {
        total_pages,
        ..Extraction::default()
    };
    let mut clean_pages = 0;

    for idx in indices {
        let page_num = idx + 1;
        if let Some(cb) = &opts.progress {
            cb.on_page_start(page_num, selected);
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| ConvertError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", page_num, e),
            })?;

        let errors_before = out.item_errors.len();
        let content = walk_page(&page, page_num, opts.with_images, &mut out);
        let new_errors = &out.item_errors[errors_before..];

        if let Some(cb) = &opts.progress {
            for e in new_errors {
                cb.on_page_error(page_num, selected, &e.to_string());
            }
            cb.on_page_complete(
                page_num,
                selected,
                content.fragments.len() + content.images.len(),
            );
        }
        if new_errors.is_empty() {
            clean_pages += 1;
        }

        debug!(
            "Page {}: {} fragment(s), {} image(s)",
            page_num,
            content.fragments.len(),
            content.images.len()
        );
        out.pages.push(content);
    }

    if let Some(cb) = &opts.progress {
        cb.on_conversion_complete(selected, clean_pages);
    }
    Ok(out)
}

fn walk_page(page: &PdfPage, page_num: usize, with_images: bool, out: &mut Extraction) -> PageContent {
    let page_height = page.height().value;
    let mut content = PageContent {
        page: page_num,
        ..PageContent::default()
    };
    let mut image_index = 0;

    for object in page.objects().iter() {
        if let Some(text_obj) = object.as_text_object() {
            let text = text_obj.text();
            if text.trim().is_empty() {
                out.dropped_fragments += 1;
                continue;
            }
            let font = text_obj.font();
            let bold = font.is_bold_reenforced()
                || font.weight().map(is_bold_weight).unwrap_or(false);
            let flags = StyleFlags::new(bold, font.is_italic());
            let bbox = match object.bounds() {
                Ok(b) => top_down_bbox(
                    b.left().value,
                    b.top().value,
                    b.right().value,
                    b.bottom().value,
                    page_height,
                ),
                Err(e) => {
                    debug!("Page {}: text object without bounds: {:?}", page_num, e);
                    BBox::default()
                }
            };
            content.fragments.push(TextFragment {
                text,
                font_size: text_obj.scaled_font_size().value,
                style_flags: flags,
                bbox,
                page: page_num,
            });
        } else if let Some(image_obj) = object.as_image_object() {
            image_index += 1;
            if !with_images {
                continue;
            }
            match image_obj.get_raw_image() {
                Ok(pixels) => {
                    let has_alpha = pixels.color().has_alpha();
                    let channels = image_obj.color_space().map(channels_for).unwrap_or_else(|_| {
                        pixels.color().channel_count() - u8::from(has_alpha)
                    });
                    content.images.push(RawImage {
                        index: image_index,
                        channels: channels + u8::from(has_alpha),
                        has_alpha,
                        pixels,
                    });
                }
                Err(e) => {
                    warn!("Page {} image {}: decode failed: {:?}", page_num, image_index, e);
                    out.item_errors.push(ItemError::ImageExtraction {
                        page: page_num,
                        index: image_index,
                        detail: format!("{:?}", e),
                    });
                }
            }
        }
    }

    content
}

/// pdfium reports bottom-up coordinates; fragments use top-down ones.
pub fn top_down_bbox(left: f32, top: f32, right: f32, bottom: f32, page_height: f32) -> BBox {
    BBox::new(left, page_height - top, right, page_height - bottom)
}

/// Colour channels (without alpha) implied by a PDF colour space.
pub fn channels_for(space: PdfColorSpace) -> u8 {
    match space {
        PdfColorSpace::DeviceCMYK | PdfColorSpace::DeviceN => 4,
        PdfColorSpace::DeviceGray | PdfColorSpace::CalibratedCIEGray => 1,
        _ => 3,
    }
}

fn is_bold_weight(weight: PdfFontWeight) -> bool {
    match weight {
        PdfFontWeight::Weight700Bold | PdfFontWeight::Weight800 | PdfFontWeight::Weight900 => true,
        PdfFontWeight::Custom(w) => w >= 700,
        _ => false,
    }
}

// ── Rasterisation ───────────────────────────────────────────────────────

/// Async wrapper around [`rasterise_blocking`].
pub async fn rasterise(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    scale: f32,
    ratio: CropRatio,
    progress: Option<ProgressCallback>,
) -> Result<Rasterised, ConvertError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let selection = selection.clone();
    tokio::task::spawn_blocking(move || {
        rasterise_blocking(&path, password.as_deref(), &selection, scale, ratio, progress)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
}

/// Render each selected page at `scale` and cut it to exactly `ratio`.
pub fn rasterise_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    scale: f32,
    ratio: CropRatio,
    progress: Option<ProgressCallback>,
) -> Result<Rasterised, ConvertError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded for cropping: {} pages", total_pages);

    let indices = selected_indices(pdf_path, selection, total_pages)?;
    let selected = indices.len();
    if let Some(cb) = &progress {
        cb.on_conversion_start(selected);
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut out = Rasterised {
        total_pages,
        pages: Vec::with_capacity(selected),
    };

    for idx in indices {
        let page_num = idx + 1;
        if let Some(cb) = &progress {
            cb.on_page_start(page_num, selected);
        }
        let fail = |detail: String| {
            if let Some(cb) = &progress {
                cb.on_page_error(page_num, selected, &detail);
            }
            ConvertError::RasterisationFailed {
                page: page_num,
                detail,
            }
        };

        let page = pages.get(idx as u16).map_err(|e| fail(format!("{:?}", e)))?;
        let rect = crop_rect(page.width().value, page.height().value, ratio);
        let raster = page
            .render_with_config(&render_config)
            .map_err(|e| fail(format!("{:?}", e)))?
            .as_image();

        let cropped = crop_scaled(&raster, rect, scale);
        let exact = exact_ratio_crop(&cropped, ratio).ok_or_else(|| {
            fail(format!(
                "{}x{} raster is too small for a {} crop",
                cropped.width(),
                cropped.height(),
                ratio
            ))
        })?;

        debug!(
            "Page {} → {}x{} px ({} crop)",
            page_num,
            exact.width(),
            exact.height(),
            ratio
        );
        if let Some(cb) = &progress {
            cb.on_page_complete(page_num, selected, 1);
        }
        out.pages.push((page_num, exact));
    }

    if let Some(cb) = &progress {
        cb.on_conversion_complete(selected, out.pages.len());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_is_flipped_top_down() {
        let b = top_down_bbox(72.0, 720.0, 200.0, 708.0, 792.0);
        assert_eq!(b, BBox::new(72.0, 72.0, 200.0, 84.0));
    }

    #[test]
    fn lower_on_page_means_larger_y0() {
        let upper = top_down_bbox(0.0, 700.0, 10.0, 690.0, 792.0);
        let lower = top_down_bbox(0.0, 600.0, 10.0, 590.0, 792.0);
        assert!(lower.y0 > upper.y0);
    }

    #[test]
    fn colour_space_channels() {
        assert_eq!(channels_for(PdfColorSpace::DeviceCMYK), 4);
        assert_eq!(channels_for(PdfColorSpace::DeviceN), 4);
        assert_eq!(channels_for(PdfColorSpace::DeviceGray), 1);
        assert_eq!(channels_for(PdfColorSpace::CalibratedCIEGray), 1);
        assert_eq!(channels_for(PdfColorSpace::DeviceRGB), 3);
        assert_eq!(channels_for(PdfColorSpace::CalibratedICCProfile), 3);
    }

    #[test]
    fn bold_weights() {
        assert!(is_bold_weight(PdfFontWeight::Weight700Bold));
        assert!(is_bold_weight(PdfFontWeight::Custom(750)));
        assert!(!is_bold_weight(PdfFontWeight::Weight400Normal));
        assert!(!is_bold_weight(PdfFontWeight::Custom(650)));
    }

    #[test]
    fn empty_selection_is_out_of_range() {
        let err = selected_indices(Path::new("x.pdf"), &PageSelection::Single(9), 3).unwrap_err();
        assert!(matches!(err, ConvertError::PageOutOfRange { page: 9, total: 3 }));
    }

    #[test]
    fn zero_pages_is_empty_input() {
        let err = selected_indices(Path::new("x.pdf"), &PageSelection::All, 0).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyInput { .. }));
    }

    #[test]
    fn extraction_counts() {
        let ex = Extraction {
            total_pages: 2,
            pages: vec![
                PageContent {
                    page: 1,
                    fragments: vec![TextFragment::new("a", 10.0, 1, 0.0)],
                    images: vec![],
                },
                PageContent {
                    page: 2,
                    ..PageContent::default()
                },
            ],
            ..Extraction::default()
        };
        assert_eq!(ex.fragment_count(), 1);
        assert!(ex.has_content());
        assert!(!Extraction::default().has_content());
    }
}

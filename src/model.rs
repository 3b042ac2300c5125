//! Shared data model for the layout-reconstruction pipeline.
//!
//! Everything here is plain data. Fragments and raw images come out of the
//! pdfium adapter ([`crate::pipeline::extract`]), flow through the classifier
//! and the assembler, and end up as an [`AssembledDocument`] that both
//! renderers consume. No type in this module holds a reference to pdfium.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ── Fragments ────────────────────────────────────────────────────────────

/// Style bit-flags attached to a text fragment.
///
/// Only two bits carry meaning; every other bit is preserved but ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyleFlags(pub u32);

impl StyleFlags {
    pub const ITALIC: u32 = 1 << 1;
    pub const BOLD: u32 = 1 << 4;

    pub fn new(bold: bool, italic: bool) -> Self {
        let mut bits = 0;
        if bold {
            bits |= Self::BOLD;
        }
        if italic {
            bits |= Self::ITALIC;
        }
        Self(bits)
    }

    pub fn is_bold(self) -> bool {
        self.0 & Self::BOLD != 0
    }

    pub fn is_italic(self) -> bool {
        self.0 & Self::ITALIC != 0
    }
}

/// Axis-aligned bounding box in top-down page coordinates (points).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    /// Vertical anchor used for line-break detection.
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// One styled, positioned run of text as reported by the upstream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub font_size: f32,
    pub style_flags: StyleFlags,
    pub bbox: BBox,
    /// 1-indexed page number.
    pub page: usize,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, font_size: f32, page: usize, y0: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            style_flags: StyleFlags::default(),
            bbox: BBox::new(0.0, y0, 0.0, y0 + font_size),
            page,
        }
    }

    pub fn with_flags(mut self, flags: StyleFlags) -> Self {
        self.style_flags = flags;
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = bbox;
        self
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// An embedded raster image as decoded by the upstream parser, before any
/// filtering or normalisation.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// 1-indexed position among the page's images, in order of appearance.
    pub index: usize,
    /// Colour channels including alpha, e.g. 4 for RGBA, 4 for CMYK, 5 for CMYK+alpha.
    pub channels: u8,
    pub has_alpha: bool,
    pub pixels: DynamicImage,
}

impl RawImage {
    /// Build a raw image whose channel layout is taken from the decoded pixels.
    pub fn from_pixels(index: usize, pixels: DynamicImage) -> Self {
        let color = pixels.color();
        Self {
            index,
            channels: color.channel_count(),
            has_alpha: color.has_alpha(),
            pixels,
        }
    }

    /// Colour channels excluding alpha.
    pub fn color_channels(&self) -> u8 {
        self.channels.saturating_sub(u8::from(self.has_alpha))
    }

    pub fn is_cmyk(&self) -> bool {
        self.color_channels() >= 4
    }
}

/// One image saved to the job's image directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub filename: String,
    pub path: PathBuf,
    pub page: usize,
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

impl ExtractedImage {
    /// File name contract: `{base}_page{page}_img{index}.png`.
    pub fn file_name_for(base: &str, page: usize, index: usize) -> String {
        format!("{base}_page{page}_img{index}.png")
    }
}

/// Extracted images keyed by page, each list in index order.
pub type ImagesByPage = BTreeMap<usize, Vec<ExtractedImage>>;

/// Group images by page and sort each page's list by index.
pub fn group_images_by_page(images: &[ExtractedImage]) -> ImagesByPage {
    let mut by_page = ImagesByPage::new();
    for img in images {
        by_page.entry(img.page).or_default().push(img.clone());
    }
    for list in by_page.values_mut() {
        list.sort_by_key(|img| img.index);
    }
    by_page
}

/// Everything the upstream parser yields for one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub page: usize,
    pub fragments: Vec<TextFragment>,
    pub images: Vec<RawImage>,
}

// ── Corpus statistics ───────────────────────────────────────────────────

/// Font-size aggregates over every fragment in one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorpusFontStatistics {
    pub avg_font_size: f32,
    pub max_font_size: f32,
}

impl CorpusFontStatistics {
    const TITLE_RATIO: f32 = 1.2;
    const SUBTITLE_RATIO: f32 = 1.1;

    /// Returns `None` for an empty slice.
    pub fn from_fragments(fragments: &[TextFragment]) -> Option<Self> {
        if fragments.is_empty() {
            return None;
        }
        let sum: f64 = fragments.iter().map(|f| f64::from(f.font_size)).sum();
        let max = fragments
            .iter()
            .map(|f| f.font_size)
            .fold(f32::NEG_INFINITY, f32::max);
        Some(Self {
            avg_font_size: (sum / fragments.len() as f64) as f32,
            max_font_size: max,
        })
    }

    pub fn title_threshold(&self) -> f32 {
        self.avg_font_size * Self::TITLE_RATIO
    }

    pub fn subtitle_threshold(&self) -> f32 {
        self.avg_font_size * Self::SUBTITLE_RATIO
    }
}

// ── Classification output ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Numbered,
    Bulleted,
    AlreadyFormatted,
}

/// The structural role assigned to one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralToken {
    /// Markdown heading level 1..=4.
    Heading(u8),
    Bold,
    Italic,
    ListItem(ListKind),
    Plain,
}

impl StructuralToken {
    pub fn is_heading(self) -> bool {
        matches!(self, StructuralToken::Heading(_))
    }
}

/// Heading arity used by the rich-document target, which only has two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RichHeadingTier {
    Primary,
    Secondary,
}

/// Classifier result: the token plus the cleaned fragment text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledText {
    pub token: StructuralToken,
    pub text: String,
}

// ── Assembled structure ─────────────────────────────────────────────────

/// One fragment after classification, kept with the attributes the
/// rich-document renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Classified text as it appears in Markdown (bullets rewritten to `- `).
    pub text: String,
    /// Whitespace-collapsed fragment text without list markup.
    pub source_text: String,
    pub token: StructuralToken,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Heading {
        page: usize,
        level: u8,
        rich_tier: RichHeadingTier,
        font_size: f32,
        text: String,
    },
    Paragraph {
        page: usize,
        runs: Vec<TextRun>,
    },
    Image(ExtractedImage),
}

impl Node {
    pub fn page(&self) -> usize {
        match self {
            Node::Heading { page, .. } | Node::Paragraph { page, .. } => *page,
            Node::Image(img) => img.page,
        }
    }
}

/// Ordered structure shared by both renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub nodes: Vec<Node>,
    /// Number of source pages; the job overwrites this with the real count.
    pub page_count: usize,
}

impl AssembledDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Image(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn style_flags_bits() {
        let f = StyleFlags::new(true, false);
        assert!(f.is_bold());
        assert!(!f.is_italic());
        assert!(StyleFlags(2).is_italic());
        assert!(!StyleFlags(1 | 8 | 32).is_bold());
    }

    #[test]
    fn corpus_stats_thresholds() {
        let frags = vec![
            TextFragment::new("a", 10.0, 1, 0.0),
            TextFragment::new("b", 20.0, 1, 20.0),
        ];
        let stats = CorpusFontStatistics::from_fragments(&frags).unwrap();
        assert_eq!(stats.avg_font_size, 15.0);
        assert_eq!(stats.max_font_size, 20.0);
        assert!((stats.title_threshold() - 18.0).abs() < 1e-4);
        assert!((stats.subtitle_threshold() - 16.5).abs() < 1e-4);
        assert!(CorpusFontStatistics::from_fragments(&[]).is_none());
    }

    #[test]
    fn raw_image_channels() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let raw = RawImage::from_pixels(1, rgba);
        assert_eq!(raw.channels, 4);
        assert!(raw.has_alpha);
        assert_eq!(raw.color_channels(), 3);
        assert!(!raw.is_cmyk());

        let cmyk = RawImage {
            channels: 4,
            has_alpha: false,
            ..raw.clone()
        };
        assert!(cmyk.is_cmyk());
    }

    #[test]
    fn image_file_name_contract() {
        assert_eq!(
            ExtractedImage::file_name_for("report", 3, 2),
            "report_page3_img2.png"
        );
    }

    #[test]
    fn grouping_sorts_by_index() {
        let mk = |page, index| ExtractedImage {
            filename: ExtractedImage::file_name_for("d", page, index),
            path: PathBuf::from("x"),
            page,
            index,
            width: 1,
            height: 1,
        };
        let grouped = group_images_by_page(&[mk(2, 2), mk(1, 1), mk(2, 1)]);
        assert_eq!(grouped.len(), 2);
        let p2: Vec<usize> = grouped[&2].iter().map(|i| i.index).collect();
        assert_eq!(p2, vec![1, 2]);
    }
}

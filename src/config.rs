//! Configuration types for pagecast jobs.
//!
//! All job behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. One struct carries every knob for every
//! target, so the same config can drive a Markdown, a rich-document and a
//! crop job over the same PDF.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for a conversion job.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pagecast::{ConversionConfig, PageSelection};
///
/// let config = ConversionConfig::builder()
///     .pages(PageSelection::Range(1, 5))
///     .extract_images(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 2.0);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory that receives extracted images.
    ///
    /// `None` means `{pdf_dir}/{base}_images`, created on demand.
    pub images_dir: Option<PathBuf>,

    /// Extract embedded images. Default: true.
    ///
    /// With `false` the job never touches the images directory and the
    /// output carries text only.
    pub extract_images: bool,

    /// Rasterisation scale for the crop target. Default: 2.0, never below 2.0.
    pub render_scale: f32,

    /// Width:height ratio of cropped page images. Default: 3:4.
    pub crop_ratio: CropRatio,

    /// Widest an embedded image may be in a rich document, in inches. Default: 6.0.
    pub max_image_width_in: f32,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            pages: PageSelection::default(),
            password: None,
            images_dir: None,
            extract_images: true,
            render_scale: MIN_RENDER_SCALE,
            crop_ratio: CropRatio::default(),
            max_image_width_in: 6.0,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("images_dir", &self.images_dir)
            .field("extract_images", &self.extract_images)
            .field("render_scale", &self.render_scale)
            .field("crop_ratio", &self.crop_ratio)
            .field("max_image_width_in", &self.max_image_width_in)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Lowest accepted rasterisation scale.
pub const MIN_RENDER_SCALE: f32 = 2.0;

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = Some(dir.into());
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    /// Values below 2.0 are raised to 2.0.
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.max(MIN_RENDER_SCALE);
        self
    }

    pub fn crop_ratio(mut self, ratio: CropRatio) -> Self {
        self.config.crop_ratio = ratio;
        self
    }

    pub fn max_image_width_in(mut self, inches: f32) -> Self {
        self.config.max_image_width_in = inches;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !c.render_scale.is_finite() {
            return Err(ConvertError::InvalidConfig(format!(
                "Render scale must be finite, got {}",
                c.render_scale
            )));
        }
        if !(c.max_image_width_in.is_finite() && c.max_image_width_in > 0.0) {
            return Err(ConvertError::InvalidConfig(format!(
                "Maximum image width must be positive, got {}",
                c.max_image_width_in
            )));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || end < start {
                return Err(ConvertError::InvalidConfig(format!(
                    "Invalid page range {start}-{end}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Lowest requested page, used to report an out-of-range selection.
    pub fn first_requested(&self) -> Option<usize> {
        match self {
            PageSelection::All => None,
            PageSelection::Single(p) => Some(*p),
            PageSelection::Range(s, _) => Some(*s),
            PageSelection::Set(pages) => pages.iter().copied().min(),
        }
    }
}

impl FromStr for PageSelection {
    type Err = String;

    /// Accepts `all`, `N`, `N-M` and comma lists such as `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            return Ok(PageSelection::All);
        }
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid page number: '{}'", v.trim()))
        };
        if s.contains(',') {
            let pages = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        if let Some((a, b)) = s.split_once('-') {
            let (start, end) = (parse(a)?, parse(b)?);
            if start == 0 || end < start {
                return Err(format!("Invalid page range: '{s}'"));
            }
            return Ok(PageSelection::Range(start, end));
        }
        Ok(PageSelection::Single(parse(s)?))
    }
}

// ── Crop ratio ───────────────────────────────────────────────────────────

/// Width:height ratio for cropped page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRatio {
    pub num: u32,
    pub den: u32,
}

impl Default for CropRatio {
    fn default() -> Self {
        Self { num: 3, den: 4 }
    }
}

impl CropRatio {
    /// `None` when either side is zero.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    pub fn as_f32(self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl fmt::Display for CropRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

impl FromStr for CropRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected W:H, got '{s}'"))?;
        let num = a.trim().parse().map_err(|_| format!("Invalid ratio '{s}'"))?;
        let den = b.trim().parse().map_err(|_| format!("Invalid ratio '{s}'"))?;
        CropRatio::new(num, den).ok_or_else(|| format!("Ratio sides must be non-zero: '{s}'"))
    }
}

//! # pagecast
//!
//! Rebuild a PDF's text layout as Markdown or a Word document, and cut its
//! pages into fixed-ratio images.
//!
//! ## How it works
//!
//! pdfium reports positioned, styled text fragments and embedded images per
//! page. Font sizes are compared against statistics of the whole job to pick
//! out headings; style bits and leading glyphs mark bold, italic and list
//! items; vertical gaps split paragraphs. The resulting structure is rendered
//! either as Markdown with image references or as a page-oriented `.docx`.
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path + %PDF header
//!  ├─ 2. Extract   fragments + images per page via pdfium (spawn_blocking)
//!  ├─ 3. Images    skip CMYK, flatten alpha, save PNG
//!  ├─ 4. Assemble  classify fragments, group paragraphs, place images
//!  └─ 5. Render    Markdown (+ zip package) or .docx
//! ```
//!
//! The crop target skips steps 3–5: each page is rasterised, cut to an exact
//! width:height ratio (3:4 by default) and zipped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagecast::{convert_to_markdown, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert_to_markdown("document.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} image(s) saved", output.images.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagecast` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `docx`  | on      | Enables `.docx` output; check [`RICH_DOCUMENT_AVAILABLE`] at runtime |
//!
//! pdfium itself is loaded at runtime from `PDFIUM_LIB_PATH` or the system
//! library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, CropRatio, PageSelection};
pub use convert::{
    convert_to_cropped_images, convert_to_docx, convert_to_markdown, convert_to_markdown_file,
    convert_to_markdown_sync, package_markdown, package_markdown_file, run_crop, run_docx,
    run_markdown, run_package, RICH_DOCUMENT_AVAILABLE,
};
pub use error::{ConvertError, ItemError};
pub use model::{
    AssembledDocument, CorpusFontStatistics, ExtractedImage, Node, StructuralToken, StyleFlags,
    TextFragment,
};
pub use output::{
    ConversionStats, CropOutput, DocxOutput, JobOutcome, JobStatus, MarkdownOutput, PackageOutput,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};

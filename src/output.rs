//! Output types returned by the job entry points.
//!
//! Everything here is serde-serialisable so the CLI can print it with
//! `--json` and services can hand it straight back to their callers.

use crate::error::{ConvertError, ItemError};
use crate::model::ExtractedImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Aggregate statistics for one conversion job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages the selection covered.
    pub processed_pages: usize,
    /// Text fragments fed to the classifier.
    pub fragments: usize,
    /// Fragments that produced no output (blank upstream or empty after sanitising).
    pub dropped_fragments: usize,
    pub images_extracted: usize,
    /// CMYK-class images left out.
    pub skipped_images: usize,
    /// Non-fatal per-item failures.
    pub item_errors: Vec<ItemError>,
    pub total_duration_ms: u64,
    /// Time spent in the pdfium stage.
    pub extract_duration_ms: u64,
}

/// Result of a Markdown job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownOutput {
    pub markdown: String,
    pub images: Vec<ExtractedImage>,
    /// Where the images were written; `None` when extraction was off.
    pub images_dir: Option<PathBuf>,
    pub stats: ConversionStats,
}

/// Result of a rich-document job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocxOutput {
    pub path: PathBuf,
    pub images_count: usize,
    pub pages_count: usize,
    pub stats: ConversionStats,
}

/// Result of a crop job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropOutput {
    pub path: PathBuf,
    pub images_count: usize,
    pub pages_count: usize,
}

/// Result of packaging a Markdown file with its images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOutput {
    pub path: PathBuf,
    /// Image file names stored in the archive.
    pub included: Vec<String>,
    /// Referenced image file names that were not found.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// What a job reports past its boundary: a status, a human-readable
/// message and, on success, the artefact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome<T> {
    pub status: JobStatus,
    pub message: String,
    pub artifact: Option<T>,
}

impl<T> JobOutcome<T> {
    /// Fold a job result into an outcome; `describe` writes the success message.
    pub fn from_result(
        result: Result<T, ConvertError>,
        describe: impl FnOnce(&T) -> String,
    ) -> Self {
        match result {
            Ok(artifact) => Self {
                status: JobStatus::Success,
                message: describe(&artifact),
                artifact: Some(artifact),
            },
            Err(e) => Self {
                status: JobStatus::Error,
                message: e.to_string(),
                artifact: None,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

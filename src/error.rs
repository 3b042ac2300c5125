//! Error types for the pagecast library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the job cannot produce an artefact at all
//!   (missing input, empty document, pdfium unavailable). Returned as
//!   `Err(ConvertError)` from the `convert_*` functions and turned into a
//!   [`crate::output::JobOutcome`] by the `run_*` entry points.
//!
//! * [`ItemError`] — **Non-fatal**: a single image or fragment could not be
//!   processed. Logged, collected in [`crate::output::ConversionStats`], and
//!   the job carries on with best-effort output.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagecast library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document has no pages.
    #[error("PDF '{path}' has no pages")]
    EmptyInput { path: PathBuf },

    /// Traversal found neither text nor images.
    #[error("No text or image content found in '{path}'")]
    NoContent { path: PathBuf },

    /// The page selection does not match any page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error while rasterising a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Target errors ─────────────────────────────────────────────────────
    /// Rich-document output was requested but this build has no `.docx` writer.
    #[error(
        "Rich-document rendering is not available in this build.\n\
Rebuild with the `docx` feature enabled."
    )]
    RenderTargetUnavailable,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip writer or the `.docx` packer failed.
    #[error("Failed to build archive '{path}': {detail}")]
    ArchiveFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error, including a panic in a blocking task.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image or fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// An embedded image could not be decoded or saved.
    #[error("Page {page}, image {index}: extraction failed: {detail}")]
    ImageExtraction {
        page: usize,
        index: usize,
        detail: String,
    },

    /// A fragment's text could not be represented in the output encoding.
    #[error("Page {page}: text dropped during encoding: {detail}")]
    Encoding { page: usize, detail: String },
}

impl ItemError {
    pub fn page(&self) -> usize {
        match self {
            ItemError::ImageExtraction { page, .. } | ItemError::Encoding { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_not_found_display() {
        let e = ConvertError::InputNotFound {
            path: PathBuf::from("/nope/a.pdf"),
        };
        assert!(e.to_string().contains("/nope/a.pdf"));
    }

    #[test]
    fn render_target_unavailable_mentions_feature() {
        let e = ConvertError::RenderTargetUnavailable;
        assert!(e.to_string().contains("docx"));
    }

    #[test]
    fn image_extraction_display() {
        let e = ItemError::ImageExtraction {
            page: 3,
            index: 2,
            detail: "decode".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("image 2"), "got: {msg}");
        assert_eq!(e.page(), 3);
    }

    #[test]
    fn item_error_serialises() {
        let e = ItemError::Encoding {
            page: 1,
            detail: "empty".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("Encoding"));
    }
}

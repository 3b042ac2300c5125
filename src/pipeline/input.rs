//! Input resolution: validate a user-supplied PDF path before pdfium sees it.
//!
//! pdfium reports a missing or non-PDF file as a generic load failure. The
//! checks here run first so callers get `InputNotFound`, `PermissionDenied`
//! or `NotAPdf` instead.

use crate::error::ConvertError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated local PDF.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    /// File stem, used to name every artefact of the job.
    pub base: String,
}

impl ResolvedInput {
    /// Directory holding the PDF; `.` for a bare file name.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Default image directory: `{pdf_dir}/{base}_images`.
    pub fn default_images_dir(&self) -> PathBuf {
        self.dir().join(format!("{}_images", self.base))
    }
}

/// Validate existence, readability and the `%PDF` magic bytes.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, ConvertError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(ConvertError::InputNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            // Short files keep zero padding and fail the check.
            let mut head = Vec::with_capacity(4);
            let _ = f.take(4).read_to_end(&mut head);
            let mut magic = [0u8; 4];
            magic[..head.len()].copy_from_slice(&head);
            if &magic != b"%PDF" {
                return Err(ConvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::InputNotFound { path });
        }
    }

    let base = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());

    debug!("Resolved local PDF: {} (base '{}')", path.display(), base);
    Ok(ResolvedInput { path, base })
}

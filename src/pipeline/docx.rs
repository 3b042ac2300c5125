//! `.docx` writer for a [`RichDocument`].
//!
//! Available only with the `docx` feature. The document is packed into a
//! sibling temp file and renamed into place, so a failed write never leaves
//! a truncated `.docx` behind.

use crate::error::ConvertError;
use crate::pipeline::rich::{RichBlock, RichDocument, RichRun};
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Pic, Run, Style, StyleType};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

const EMU_PER_INCH: f32 = 914_400.0;

/// Paragraph styles registered on every document: id, display name, size in half-points.
const STYLES: [(&str, &str, usize); 4] = [
    ("Title", "Title", 52),
    ("Heading1", "Heading 1", 32),
    ("Heading2", "Heading 2", 28),
    ("Heading3", "Heading 3", 24),
];

/// Serialise `doc` to `path`.
pub fn write_docx(doc: &RichDocument, path: &Path) -> Result<(), ConvertError> {
    let docx = build(doc);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    let file = File::create(&tmp_path).map_err(|e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Err(e) = docx.build().pack(file) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ConvertError::ArchiveFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        });
    }

    std::fs::rename(&tmp_path, path).map_err(|e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn build(doc: &RichDocument) -> Docx {
    let mut docx = Docx::new();
    for (id, name, size) in STYLES {
        docx = docx.add_style(
            Style::new(id, StyleType::Paragraph)
                .name(name)
                .size(size)
                .bold(),
        );
    }

    for block in &doc.blocks {
        match block {
            RichBlock::Title(text) => {
                docx = docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text.as_str()))
                        .style("Title")
                        .align(AlignmentType::Center),
                );
            }
            RichBlock::PageBreak => {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                );
            }
            RichBlock::Heading { level, text } => {
                let style = format!("Heading{}", (*level).clamp(1, 3));
                docx = docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text.as_str()))
                        .style(&style),
                );
            }
            RichBlock::Paragraph(runs) => {
                let para = runs
                    .iter()
                    .fold(Paragraph::new(), |p, r| p.add_run(styled_run(r)));
                docx = docx.add_paragraph(para);
            }
            RichBlock::Image {
                path,
                filename,
                display_width_in,
                display_height_in,
                caption,
                ..
            } => match std::fs::read(path) {
                Ok(bytes) => {
                    let pic = Pic::new(&bytes).size(
                        (display_width_in * EMU_PER_INCH) as u32,
                        (display_height_in * EMU_PER_INCH) as u32,
                    );
                    docx = docx
                        .add_paragraph(
                            Paragraph::new()
                                .add_run(Run::new().add_image(pic))
                                .align(AlignmentType::Center),
                        )
                        .add_paragraph(
                            Paragraph::new()
                                .add_run(styled_run(caption))
                                .align(AlignmentType::Center),
                        );
                }
                Err(e) => {
                    warn!("Could not read {} for embedding: {}", path.display(), e);
                    docx = docx.add_paragraph(
                        Paragraph::new()
                            .add_run(Run::new().add_text(format!("[Image: {filename}]"))),
                    );
                }
            },
            RichBlock::Placeholder(text) => {
                docx = docx
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text.as_str())));
            }
        }
    }
    docx
}

fn styled_run(run: &RichRun) -> Run {
    let mut r = Run::new()
        .add_text(run.text.as_str())
        .size((run.size_pt * 2.0).round() as usize);
    if run.bold {
        r = r.bold();
    }
    if run.italic {
        r = r.italic();
    }
    r
}

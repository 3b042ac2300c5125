//! Rich-document rendering: [`AssembledDocument`] → page-oriented [`RichDocument`].
//!
//! The rich document is an in-memory block list that mirrors what a word
//! processor shows: a title, then for each source page a page break, a
//! `Page N` heading and the page's headings, styled runs and images. Writing
//! it to disk is a separate step ([`crate::pipeline::docx`]).

use crate::error::ItemError;
use crate::model::{AssembledDocument, ExtractedImage, Node, RichHeadingTier, TextRun};
use crate::pipeline::sanitize::sanitize_text;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Smallest run size in points.
pub const MIN_RUN_SIZE_PT: f32 = 9.0;
/// Largest run size in points.
pub const MAX_RUN_SIZE_PT: f32 = 16.0;
/// Caption size in points.
pub const CAPTION_SIZE_PT: f32 = 9.0;
/// Nominal pixel density used to turn image pixels into display inches.
pub const IMAGE_DPI: f32 = 96.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub size_pt: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RichBlock {
    /// Document title, centred.
    Title(String),
    PageBreak,
    /// Level 1 is the page heading, 2 and 3 are content headings.
    Heading { level: u8, text: String },
    Paragraph(Vec<RichRun>),
    Image {
        path: PathBuf,
        filename: String,
        pixel_width: u32,
        pixel_height: u32,
        display_width_in: f32,
        display_height_in: f32,
        caption: RichRun,
    },
    /// Stand-in for an image whose file disappeared before rendering.
    Placeholder(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RichDocument {
    pub title: String,
    pub blocks: Vec<RichBlock>,
}

impl RichDocument {
    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, RichBlock::Image { .. }))
            .count()
    }
}

/// Rendering options for the rich-document target.
#[derive(Debug, Clone)]
pub struct RichOptions {
    pub title: String,
    pub max_image_width_in: f32,
    /// Pages to lay out, ascending. Empty means `1..=page_count`.
    pub pages: Vec<usize>,
}

impl Default for RichOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            max_image_width_in: 6.0,
            pages: Vec::new(),
        }
    }
}

/// Render the assembled structure into a page-oriented rich document.
///
/// Text runs are sanitised first; a run that sanitises to nothing is dropped
/// on its own and reported as an [`ItemError::Encoding`].
pub fn render(doc: &AssembledDocument, opts: &RichOptions) -> (RichDocument, Vec<ItemError>) {
    let mut blocks = Vec::new();
    let mut dropped: Vec<ItemError> = Vec::new();

    let title = sanitize_text(&opts.title).into_owned();
    if !title.trim().is_empty() {
        blocks.push(RichBlock::Title(title.clone()));
    }

    let pages: Vec<usize> = if opts.pages.is_empty() {
        let page_count = doc
            .page_count
            .max(doc.nodes.iter().map(Node::page).max().unwrap_or(0));
        (1..=page_count).collect()
    } else {
        opts.pages.clone()
    };
    let last_page = pages.last().copied().unwrap_or(0);
    let mut nodes = doc.nodes.iter().peekable();

    for (i, &page) in pages.iter().enumerate() {
        if i > 0 {
            blocks.push(RichBlock::PageBreak);
        }
        blocks.push(RichBlock::Heading {
            level: 1,
            text: format!("Page {page}"),
        });

        // Nodes of pages outside the list fold into the next listed page.
        while let Some(node) = nodes.next_if(|n| n.page() <= page || page == last_page) {
            match node {
                Node::Heading {
                    page: src_page,
                    rich_tier,
                    text,
                    ..
                } => {
                    let text = sanitize_text(text);
                    if text.trim().is_empty() {
                        dropped.push(encoding_error(*src_page, "heading"));
                        continue;
                    }
                    blocks.push(RichBlock::Heading {
                        level: heading_level(*rich_tier),
                        text: text.into_owned(),
                    });
                }
                Node::Paragraph {
                    page: src_page,
                    runs,
                } => {
                    let (rich_runs, empty) = paragraph_runs(runs);
                    dropped.extend((0..empty).map(|_| encoding_error(*src_page, "text run")));
                    if !rich_runs.is_empty() {
                        blocks.push(RichBlock::Paragraph(rich_runs));
                    }
                }
                Node::Image(img) => blocks.push(image_block(img, opts.max_image_width_in)),
            }
        }
    }

    if !dropped.is_empty() {
        debug!("{} text run(s) were empty after sanitising", dropped.len());
    }
    (RichDocument { title, blocks }, dropped)
}

fn encoding_error(page: usize, what: &str) -> ItemError {
    ItemError::Encoding {
        page,
        detail: format!("{what} empty after sanitising"),
    }
}

fn heading_level(tier: RichHeadingTier) -> u8 {
    match tier {
        RichHeadingTier::Primary => 2,
        RichHeadingTier::Secondary => 3,
    }
}

/// Display size for a run: the source size clamped into `[9, 16]` pt.
pub fn run_size(font_size: f32) -> f32 {
    font_size.clamp(MIN_RUN_SIZE_PT, MAX_RUN_SIZE_PT)
}

fn paragraph_runs(runs: &[TextRun]) -> (Vec<RichRun>, usize) {
    let mut out: Vec<RichRun> = Vec::with_capacity(runs.len());
    let mut dropped = 0;
    for run in runs {
        let text = sanitize_text(&run.source_text);
        let text = text.trim();
        if text.is_empty() {
            dropped += 1;
            continue;
        }
        let text = if out.is_empty() {
            text.to_string()
        } else {
            format!(" {text}")
        };
        out.push(RichRun {
            text,
            bold: run.bold,
            italic: run.italic,
            size_pt: run_size(run.font_size),
        });
    }
    (out, dropped)
}

/// Display size in inches, width capped at `max_width_in`, aspect preserved.
pub fn display_size(width: u32, height: u32, max_width_in: f32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (0.0, 0.0);
    }
    let natural_w = width as f32 / IMAGE_DPI;
    let natural_h = height as f32 / IMAGE_DPI;
    if natural_w <= max_width_in {
        (natural_w, natural_h)
    } else {
        let scale = max_width_in / natural_w;
        (max_width_in, natural_h * scale)
    }
}

fn image_block(img: &ExtractedImage, max_width_in: f32) -> RichBlock {
    if !img.path.is_file() {
        warn!(
            "Image file missing at render time, using placeholder: {}",
            img.path.display()
        );
        return RichBlock::Placeholder(format!("[Image: {}]", img.filename));
    }
    let (w, h) = display_size(img.width, img.height, max_width_in);
    RichBlock::Image {
        path: img.path.clone(),
        filename: img.filename.clone(),
        pixel_width: img.width,
        pixel_height: img.height,
        display_width_in: w,
        display_height_in: h,
        caption: RichRun {
            text: format!("Image {} ({}x{})", img.index, img.width, img.height),
            bold: false,
            italic: true,
            size_pt: CAPTION_SIZE_PT,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StructuralToken;

    fn run(text: &str, size: f32, bold: bool) -> TextRun {
        TextRun {
            text: text.into(),
            source_text: text.into(),
            token: if bold {
                StructuralToken::Bold
            } else {
                StructuralToken::Plain
            },
            font_size: size,
            bold,
            italic: false,
        }
    }

    fn missing_image(page: usize) -> ExtractedImage {
        ExtractedImage {
            filename: ExtractedImage::file_name_for("doc", page, 1),
            path: PathBuf::from("/definitely/not/here.png"),
            page,
            index: 1,
            width: 100,
            height: 50,
        }
    }

    #[test]
    fn pages_get_break_and_heading() {
        let doc = AssembledDocument {
            nodes: vec![
                Node::Paragraph {
                    page: 1,
                    runs: vec![run("one", 10.0, false)],
                },
                Node::Paragraph {
                    page: 3,
                    runs: vec![run("three", 10.0, false)],
                },
            ],
            page_count: 3,
        };
        let opts = RichOptions {
            title: "report".into(),
            ..RichOptions::default()
        };
        let (rich, dropped) = render(&doc, &opts);
        assert!(dropped.is_empty());
        let headings: Vec<String> = rich
            .blocks
            .iter()
            .filter_map(|b| match b {
                RichBlock::Heading { level: 1, text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(headings, vec!["Page 1", "Page 2", "Page 3"]);
        let breaks = rich
            .blocks
            .iter()
            .filter(|b| matches!(b, RichBlock::PageBreak))
            .count();
        assert_eq!(breaks, 2);
        assert_eq!(rich.title, "report");
        assert_eq!(rich.blocks[0], RichBlock::Title("report".into()));
    }

    #[test]
    fn selected_pages_only() {
        let doc = AssembledDocument {
            nodes: vec![Node::Paragraph {
                page: 4,
                runs: vec![run("four", 10.0, false)],
            }],
            page_count: 9,
        };
        let opts = RichOptions {
            pages: vec![4, 6],
            ..RichOptions::default()
        };
        let (rich, _) = render(&doc, &opts);
        assert_eq!(
            rich.blocks[0],
            RichBlock::Heading {
                level: 1,
                text: "Page 4".into()
            }
        );
        assert!(matches!(rich.blocks[1], RichBlock::Paragraph(_)));
        assert_eq!(rich.blocks[2], RichBlock::PageBreak);
        assert_eq!(rich.blocks.len(), 4);
    }

    #[test]
    fn heading_tiers_map_to_levels() {
        let doc = AssembledDocument {
            nodes: vec![
                Node::Heading {
                    page: 1,
                    level: 1,
                    rich_tier: RichHeadingTier::Primary,
                    font_size: 24.0,
                    text: "Main".into(),
                },
                Node::Heading {
                    page: 1,
                    level: 1,
                    rich_tier: RichHeadingTier::Secondary,
                    font_size: 22.0,
                    text: "Also big".into(),
                },
            ],
            page_count: 1,
        };
        let (rich, _) = render(&doc, &RichOptions::default());
        assert!(rich.blocks.contains(&RichBlock::Heading {
            level: 2,
            text: "Main".into()
        }));
        assert!(rich.blocks.contains(&RichBlock::Heading {
            level: 3,
            text: "Also big".into()
        }));
    }

    #[test]
    fn runs_keep_style_and_clamp_size() {
        let doc = AssembledDocument {
            nodes: vec![Node::Paragraph {
                page: 1,
                runs: vec![run("tiny", 6.0, false), run("loud", 30.0, true)],
            }],
            page_count: 1,
        };
        let (rich, _) = render(&doc, &RichOptions::default());
        let runs = rich
            .blocks
            .iter()
            .find_map(|b| match b {
                RichBlock::Paragraph(r) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(runs[0].size_pt, 9.0);
        assert!(!runs[0].bold);
        assert_eq!(runs[1].size_pt, 16.0);
        assert!(runs[1].bold);
        assert_eq!(runs[1].text, " loud");
    }

    #[test]
    fn control_only_run_is_dropped() {
        let doc = AssembledDocument {
            nodes: vec![Node::Paragraph {
                page: 1,
                runs: vec![run("\u{1}\u{2}", 10.0, false), run("kept", 10.0, false)],
            }],
            page_count: 1,
        };
        let (rich, dropped) = render(&doc, &RichOptions::default());
        assert_eq!(
            dropped,
            vec![ItemError::Encoding {
                page: 1,
                detail: "text run empty after sanitising".into()
            }]
        );
        assert!(rich.blocks.iter().any(|b| matches!(
            b,
            RichBlock::Paragraph(r) if r.len() == 1 && r[0].text == "kept"
        )));
    }

    #[test]
    fn missing_image_becomes_placeholder() {
        let doc = AssembledDocument {
            nodes: vec![Node::Image(missing_image(1))],
            page_count: 1,
        };
        let (rich, _) = render(&doc, &RichOptions::default());
        assert!(rich
            .blocks
            .contains(&RichBlock::Placeholder("[Image: doc_page1_img1.png]".into())));
        assert_eq!(rich.image_count(), 0);
    }

    #[test]
    fn present_image_is_embedded_with_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_page1_img1.png");
        std::fs::write(&path, b"png bytes are not inspected here").unwrap();
        let img = ExtractedImage {
            path,
            width: 1920,
            height: 960,
            ..missing_image(1)
        };
        let doc = AssembledDocument {
            nodes: vec![Node::Image(img)],
            page_count: 1,
        };
        let (rich, _) = render(&doc, &RichOptions::default());
        let block = rich
            .blocks
            .iter()
            .find(|b| matches!(b, RichBlock::Image { .. }))
            .unwrap();
        if let RichBlock::Image {
            display_width_in,
            display_height_in,
            caption,
            ..
        } = block
        {
            assert_eq!(*display_width_in, 6.0);
            assert!((display_height_in - 3.0).abs() < 1e-4);
            assert_eq!(caption.text, "Image 1 (1920x960)");
            assert!(caption.italic);
            assert_eq!(caption.size_pt, 9.0);
        }
    }

    #[test]
    fn small_images_keep_natural_size() {
        let (w, h) = display_size(96, 192, 6.0);
        assert_eq!((w, h), (1.0, 2.0));
    }
}

//! Markdown rendering of an [`AssembledDocument`].
//!
//! Every node becomes one or more blocks; the blocks are normalised by
//! [`postprocess`] and joined with a blank line.

use crate::model::{AssembledDocument, ExtractedImage, Node, StructuralToken, TextRun};
use crate::pipeline::postprocess::postprocess;

/// Render the assembled structure as Markdown text.
pub fn render(doc: &AssembledDocument) -> String {
    let blocks = render_blocks(doc);
    postprocess(&blocks).join("\n\n")
}

/// Raw blocks before post-processing.
pub fn render_blocks(doc: &AssembledDocument) -> Vec<String> {
    let mut blocks = Vec::with_capacity(doc.nodes.len() + doc.image_count());
    for node in &doc.nodes {
        match node {
            Node::Heading { level, text, .. } => {
                blocks.push(format!("{} {}", "#".repeat(usize::from(*level)), text));
            }
            Node::Paragraph { runs, .. } => {
                let text = runs.iter().map(render_run).collect::<Vec<_>>().join(" ");
                blocks.push(text.trim().to_string());
            }
            Node::Image(img) => {
                blocks.push(image_reference(img));
                blocks.push(image_caption(img));
            }
        }
    }
    blocks
}

fn render_run(run: &TextRun) -> String {
    match run.token {
        StructuralToken::Bold => format!("**{}**", run.text),
        StructuralToken::Italic => format!("*{}*", run.text),
        _ => run.text.clone(),
    }
}

/// `![Image {index}]({filename})`, or `(<{filename}>)` when the name has
/// whitespace in it.
pub fn image_reference(img: &ExtractedImage) -> String {
    if img.filename.contains(char::is_whitespace) {
        format!("![Image {}](<{}>)", img.index, img.filename)
    } else {
        format!("![Image {}]({})", img.index, img.filename)
    }
}

/// `*Page {page} - Image {index} ({width}x{height})*`
pub fn image_caption(img: &ExtractedImage) -> String {
    format!(
        "*Page {} - Image {} ({}x{})*",
        img.page, img.index, img.width, img.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListKind, RichHeadingTier};
    use std::path::PathBuf;

    fn run(text: &str, token: StructuralToken) -> TextRun {
        TextRun {
            text: text.into(),
            source_text: text.into(),
            token,
            font_size: 10.0,
            bold: false,
            italic: false,
        }
    }

    fn image(page: usize, index: usize) -> ExtractedImage {
        ExtractedImage {
            filename: ExtractedImage::file_name_for("doc", page, index),
            path: PathBuf::from("unused"),
            page,
            index,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn headings_and_emphasis() {
        let doc = AssembledDocument {
            nodes: vec![
                Node::Heading {
                    page: 1,
                    level: 2,
                    rich_tier: RichHeadingTier::Primary,
                    font_size: 20.0,
                    text: "Overview".into(),
                },
                Node::Paragraph {
                    page: 1,
                    runs: vec![
                        run("plain", StructuralToken::Plain),
                        run("strong", StructuralToken::Bold),
                        run("soft", StructuralToken::Italic),
                    ],
                },
            ],
            page_count: 1,
        };
        assert_eq!(render(&doc), "## Overview\n\nplain **strong** *soft*");
    }

    #[test]
    fn image_blocks() {
        let doc = AssembledDocument {
            nodes: vec![Node::Image(image(2, 1))],
            page_count: 2,
        };
        assert_eq!(
            render(&doc),
            "![Image 1](doc_page2_img1.png)\n\n*Page 2 - Image 1 (640x480)*"
        );
    }

    #[test]
    fn spaced_file_name_is_bracketed() {
        let mut img = image(1, 3);
        img.filename = ExtractedImage::file_name_for("annual report", 1, 3);
        assert_eq!(
            image_reference(&img),
            "![Image 3](<annual report_page1_img3.png>)"
        );
    }

    #[test]
    fn list_after_paragraph_gets_extra_gap() {
        let doc = AssembledDocument {
            nodes: vec![
                Node::Paragraph {
                    page: 1,
                    runs: vec![run("Intro", StructuralToken::Plain)],
                },
                Node::Paragraph {
                    page: 1,
                    runs: vec![run("- item", StructuralToken::ListItem(ListKind::Bulleted))],
                },
            ],
            page_count: 1,
        };
        assert_eq!(render(&doc), "Intro\n\n\n\n- item");
    }

    #[test]
    fn empty_document_renders_empty() {
        assert_eq!(render(&AssembledDocument::default()), "");
    }
}

//! Paragraph assembly: ordered fragments + page images → [`AssembledDocument`].
//!
//! The assembler is a two-state machine (`Idle`, `InParagraph`). The fragment
//! stream is translated into events and every event has a fixed set of
//! actions:
//!
//! | Event | Actions | Next state |
//! |-------|---------|------------|
//! | `NewPage(p)` | flush paragraph, emit images of every page `< p`, reset line reference | `Idle` |
//! | `LineBreak` | flush paragraph | `Idle` |
//! | `HeadingSeen` | flush paragraph, emit heading | `Idle` |
//! | `Text` | start or extend the paragraph | `InParagraph` |
//! | `StreamEnd` | flush paragraph, emit all remaining images | `Idle` |
//!
//! A line break is a vertical jump of more than 80 % of the incoming
//! fragment's font size between consecutive fragments on the same page.

use crate::model::{
    group_images_by_page, AssembledDocument, CorpusFontStatistics, ExtractedImage, ImagesByPage,
    Node, RichHeadingTier, StructuralToken, TextFragment, TextRun,
};
use crate::pipeline::classify::{classify, collapse_whitespace, rich_heading_tier};
use tracing::debug;

/// Vertical gap, as a fraction of font size, above which a new paragraph starts.
pub const LINE_BREAK_FACTOR: f32 = 0.8;

/// Input events of the assembler state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewPage(usize),
    LineBreak,
    HeadingSeen {
        level: u8,
        rich_tier: RichHeadingTier,
        font_size: f32,
        text: String,
    },
    Text(TextRun),
    StreamEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    InParagraph,
}

#[derive(Debug)]
enum State {
    Idle,
    InParagraph { page: usize, runs: Vec<TextRun> },
}

/// Single left-to-right pass over one job's fragment stream.
#[derive(Debug)]
pub struct Assembler {
    state: State,
    current_page: usize,
    last_y: Option<f32>,
    pending_images: ImagesByPage,
    nodes: Vec<Node>,
    max_page: usize,
}

impl Assembler {
    pub fn new(images: ImagesByPage) -> Self {
        let max_page = images.keys().next_back().copied().unwrap_or(0);
        Self {
            state: State::Idle,
            current_page: 1,
            last_y: None,
            pending_images: images,
            nodes: Vec::new(),
            max_page,
        }
    }

    pub fn state(&self) -> StateKind {
        match self.state {
            State::Idle => StateKind::Idle,
            State::InParagraph { .. } => StateKind::InParagraph,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Translate one fragment into events and apply them.
    pub fn feed(&mut self, fragment: &TextFragment, stats: &CorpusFontStatistics) {
        if fragment.text.trim().is_empty() {
            return;
        }

        if fragment.page != self.current_page {
            self.apply(Event::NewPage(fragment.page));
        }

        let y = fragment.bbox.y0;
        if let Some(last) = self.last_y {
            if (y - last).abs() > fragment.font_size * LINE_BREAK_FACTOR {
                self.apply(Event::LineBreak);
            }
        }

        let styled = classify(fragment, stats);
        let event = match styled.token {
            StructuralToken::Heading(level) => Event::HeadingSeen {
                level,
                rich_tier: rich_heading_tier(fragment, stats)
                    .unwrap_or(RichHeadingTier::Secondary),
                font_size: fragment.font_size,
                text: styled.text,
            },
            token => Event::Text(TextRun {
                text: styled.text,
                source_text: collapse_whitespace(&fragment.text),
                token,
                font_size: fragment.font_size,
                bold: fragment.style_flags.is_bold(),
                italic: fragment.style_flags.is_italic(),
            }),
        };
        self.apply(event);
        self.last_y = Some(y);
    }

    /// Apply one transition of the state machine.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::NewPage(page) => {
                self.flush_paragraph();
                self.emit_images_before(page);
                self.current_page = page;
                self.max_page = self.max_page.max(page);
                self.last_y = None;
            }
            Event::LineBreak => self.flush_paragraph(),
            Event::HeadingSeen {
                level,
                rich_tier,
                font_size,
                text,
            } => {
                self.flush_paragraph();
                self.nodes.push(Node::Heading {
                    page: self.current_page,
                    level,
                    rich_tier,
                    font_size,
                    text,
                });
            }
            Event::Text(run) => match &mut self.state {
                State::InParagraph { runs, .. } => runs.push(run),
                State::Idle => {
                    self.state = State::InParagraph {
                        page: self.current_page,
                        runs: vec![run],
                    };
                }
            },
            Event::StreamEnd => {
                self.flush_paragraph();
                let remaining = std::mem::take(&mut self.pending_images);
                self.emit_images(remaining);
            }
        }
    }

    /// Close the stream and return the assembled structure.
    pub fn finish(mut self) -> AssembledDocument {
        self.apply(Event::StreamEnd);
        AssembledDocument {
            nodes: self.nodes,
            page_count: self.max_page.max(self.current_page),
        }
    }

    fn flush_paragraph(&mut self) {
        if let State::InParagraph { page, runs } = std::mem::replace(&mut self.state, State::Idle)
        {
            let runs: Vec<TextRun> = runs.into_iter().filter(|r| !r.text.is_empty()).collect();
            if !runs.is_empty() {
                self.nodes.push(Node::Paragraph { page, runs });
            }
        }
    }

    fn emit_images_before(&mut self, page: usize) {
        let later = self.pending_images.split_off(&page);
        let earlier = std::mem::replace(&mut self.pending_images, later);
        self.emit_images(earlier);
    }

    fn emit_images(&mut self, images: ImagesByPage) {
        for (page, list) in images {
            debug!("Placing {} image(s) from page {}", list.len(), page);
            self.nodes.extend(list.into_iter().map(Node::Image));
        }
    }
}

/// Assemble a whole job: classify every fragment against the corpus
/// statistics and interleave page images in reading order.
pub fn assemble(fragments: &[TextFragment], images: &[ExtractedImage]) -> AssembledDocument {
    let by_page = group_images_by_page(images);
    let mut assembler = Assembler::new(by_page);

    if let Some(stats) = CorpusFontStatistics::from_fragments(fragments) {
        debug!(
            "Corpus font stats: avg={:.2} max={:.2}",
            stats.avg_font_size, stats.max_font_size
        );
        for fragment in fragments {
            assembler.feed(fragment, &stats);
        }
    }

    assembler.finish()
}

//! Post-processing: deterministic normalisation of rendered Markdown blocks.
//!
//! The renderer emits one block per heading, paragraph and image line. Before
//! the blocks are joined, three cheap rules run in a fixed order:
//!
//! 1. Drop blocks that are blank (only whitespace).
//! 2. Insert one blank separator before a list item unless the previous
//!    emitted block is itself a list item or a heading.
//! 3. Collapse runs of consecutive blank blocks down to one.
//!
//! Each rule is a pure `Vec<String> → Vec<String>` pass. Rule 1 removes the
//! separators rule 2 adds, so running the whole pass twice gives the same
//! output as running it once.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every post-processing rule to a rendered block sequence.
pub fn postprocess<S: AsRef<str>>(blocks: &[S]) -> Vec<String> {
    let kept = drop_blank_blocks(blocks);
    let spaced = separate_lists(kept);
    collapse_blank_blocks(spaced)
}

// ── Block predicates ────────────────────────────────────────────────────────

static RE_NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());

/// `1.`-style or `- `-style list item.
pub fn is_list_item(block: &str) -> bool {
    RE_NUMBERED_ITEM.is_match(block) || block.starts_with("- ")
}

pub fn is_heading(block: &str) -> bool {
    block.starts_with('#')
}

// ── Rule 1: Drop blank blocks ───────────────────────────────────────────────

fn drop_blank_blocks<S: AsRef<str>>(blocks: &[S]) -> Vec<String> {
    blocks
        .iter()
        .map(AsRef::as_ref)
        .filter(|b| !b.trim().is_empty())
        .map(str::to_string)
        .collect()
}

// ── Rule 2: Separate lists from preceding prose ─────────────────────────────

fn separate_lists(blocks: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(blocks.len() + 4);
    for block in blocks {
        if is_list_item(&block) {
            if let Some(prev) = out.last() {
                if !is_list_item(prev) && !is_heading(prev) {
                    out.push(String::new());
                }
            }
        }
        out.push(block);
    }
    out
}

// ── Rule 3: Collapse consecutive blank blocks ───────────────────────────────

fn collapse_blank_blocks(blocks: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.is_empty() && out.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        out.push(block);
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_drop_blank_blocks() {
        assert_eq!(drop_blank_blocks(&["a", "", "  ", "b"]), v(&["a", "b"]));
    }

    #[test]
    fn test_list_after_prose_gets_separator() {
        let out = postprocess(&["Intro", "- one", "- two"]);
        assert_eq!(out, v(&["Intro", "", "- one", "- two"]));
    }

    #[test]
    fn test_list_after_heading_has_no_separator() {
        let out = postprocess(&["## Steps", "1. first", "2. second"]);
        assert_eq!(out, v(&["## Steps", "1. first", "2. second"]));
    }

    #[test]
    fn test_first_block_list_item() {
        assert_eq!(postprocess(&["- only"]), v(&["- only"]));
    }

    #[test]
    fn test_multi_digit_numbered_item_is_list() {
        assert!(is_list_item("12. twelve"));
        assert!(!is_list_item("*italic*"));
        assert!(!is_list_item("-dash"));
    }

    #[test]
    fn test_collapse_blank_blocks() {
        assert_eq!(
            collapse_blank_blocks(v(&["a", "", "", "", "b"])),
            v(&["a", "", "b"])
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs: Vec<Vec<&str>> = vec![
            vec!["# T", "text", "- a", "", "", "- b", "more", "1. x"],
            vec!["", "", ""],
            vec!["- a", "  ", "p", "2. b", "## h", "- c"],
            vec![],
        ];
        for input in inputs {
            let once = postprocess(&input);
            let twice = postprocess(&once);
            assert_eq!(once, twice, "input: {input:?}");
        }
    }
}

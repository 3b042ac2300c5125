//! Role classification: font metrics + style bits → structural token.
//!
//! Thresholds are relative to the job's [`CorpusFontStatistics`], so the same
//! glyph size can be a heading in one document and body text in another.
//! The ladder is evaluated top to bottom and the first match wins:
//!
//! | Condition | Token |
//! |-----------|-------|
//! | `size ≥ title × 1.3` | `Heading(1)` |
//! | `size ≥ title × 1.1` | `Heading(2)` |
//! | `size ≥ title` | `Heading(3)` |
//! | `size ≥ subtitle` | `Heading(4)` |
//! | bold bit | `Bold` |
//! | italic bit | `Italic` |
//! | `^\d+\.` | `ListItem(Numbered)` |
//! | bullet glyph | `ListItem(Bulleted)`, glyph → `- ` |
//! | `^[-*+]\s` | `ListItem(AlreadyFormatted)` |
//! | otherwise | `Plain` |

use crate::model::{
    CorpusFontStatistics, ListKind, RichHeadingTier, StructuralToken, StyledText, TextFragment,
};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[•·▪▫‣⁃]\s*").unwrap());
static RE_MARKUP_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+").unwrap());

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Markdown heading level for a font size, or `None` for body text.
pub fn heading_level(font_size: f32, stats: &CorpusFontStatistics) -> Option<u8> {
    let title = stats.title_threshold();
    if font_size >= title {
        if font_size >= title * 1.3 {
            Some(1)
        } else if font_size >= title * 1.1 {
            Some(2)
        } else {
            Some(3)
        }
    } else if font_size >= stats.subtitle_threshold() {
        Some(4)
    } else {
        None
    }
}

/// Classify one fragment. Pure: the same input always yields the same token.
pub fn classify(fragment: &TextFragment, stats: &CorpusFontStatistics) -> StyledText {
    let text = collapse_whitespace(&fragment.text);

    if let Some(level) = heading_level(fragment.font_size, stats) {
        return StyledText {
            token: StructuralToken::Heading(level),
            text,
        };
    }

    let flags = fragment.style_flags;
    if flags.is_bold() {
        return StyledText {
            token: StructuralToken::Bold,
            text,
        };
    }
    if flags.is_italic() {
        return StyledText {
            token: StructuralToken::Italic,
            text,
        };
    }

    classify_list(text)
}

fn classify_list(text: String) -> StyledText {
    if RE_NUMBERED.is_match(&text) {
        return StyledText {
            token: StructuralToken::ListItem(ListKind::Numbered),
            text,
        };
    }
    if RE_BULLET.is_match(&text) {
        let text = RE_BULLET.replace(&text, "- ").into_owned();
        return StyledText {
            token: StructuralToken::ListItem(ListKind::Bulleted),
            text,
        };
    }
    if RE_MARKUP_LIST.is_match(&text) {
        return StyledText {
            token: StructuralToken::ListItem(ListKind::AlreadyFormatted),
            text,
        };
    }
    StyledText {
        token: StructuralToken::Plain,
        text,
    }
}

/// Heading tier for the rich-document target.
///
/// Unlike the Markdown ladder, the top tier requires the fragment to carry
/// the corpus maximum size; every other fragment above the subtitle threshold
/// lands in the secondary tier.
pub fn rich_heading_tier(
    fragment: &TextFragment,
    stats: &CorpusFontStatistics,
) -> Option<RichHeadingTier> {
    let size = fragment.font_size;
    if size >= stats.title_threshold() && size == stats.max_font_size {
        Some(RichHeadingTier::Primary)
    } else if size >= stats.subtitle_threshold() {
        Some(RichHeadingTier::Secondary)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StyleFlags;

    fn stats(avg: f32, max: f32) -> CorpusFontStatistics {
        CorpusFontStatistics {
            avg_font_size: avg,
            max_font_size: max,
        }
    }

    fn frag(text: &str, size: f32) -> TextFragment {
        TextFragment::new(text, size, 1, 0.0)
    }

    #[test]
    fn heading_ladder() {
        // avg 10 → title 12, subtitle 11
        let s = stats(10.0, 30.0);
        assert_eq!(classify(&frag("T", 16.0), &s).token, StructuralToken::Heading(1));
        assert_eq!(classify(&frag("T", 13.5), &s).token, StructuralToken::Heading(2));
        assert_eq!(classify(&frag("T", 12.5), &s).token, StructuralToken::Heading(3));
        assert_eq!(classify(&frag("T", 11.5), &s).token, StructuralToken::Heading(4));
        assert_eq!(classify(&frag("T", 10.0), &s).token, StructuralToken::Plain);
    }

    #[test]
    fn heading_wins_over_bold() {
        let s = stats(10.0, 20.0);
        let f = frag("Big", 20.0).with_flags(StyleFlags::new(true, true));
        assert_eq!(classify(&f, &s).token, StructuralToken::Heading(1));
    }

    #[test]
    fn bold_before_italic_before_lists() {
        let s = stats(10.0, 10.0);
        let bold = frag("1. item", 10.0).with_flags(StyleFlags::new(true, true));
        assert_eq!(classify(&bold, &s).token, StructuralToken::Bold);
        let italic = frag("1. item", 10.0).with_flags(StyleFlags::new(false, true));
        assert_eq!(classify(&italic, &s).token, StructuralToken::Italic);
    }

    #[test]
    fn list_kinds() {
        let s = stats(10.0, 10.0);

        let numbered = classify(&frag("12. Twelfth", 10.0), &s);
        assert_eq!(numbered.token, StructuralToken::ListItem(ListKind::Numbered));
        assert_eq!(numbered.text, "12. Twelfth");

        let bullet = classify(&frag("•   First point", 10.0), &s);
        assert_eq!(bullet.token, StructuralToken::ListItem(ListKind::Bulleted));
        assert_eq!(bullet.text, "- First point");

        let dot = classify(&frag("▪item", 10.0), &s);
        assert_eq!(dot.text, "- item");

        let md = classify(&frag("* already", 10.0), &s);
        assert_eq!(md.token, StructuralToken::ListItem(ListKind::AlreadyFormatted));
        assert_eq!(md.text, "* already");

        // no whitespace after the marker → plain
        assert_eq!(classify(&frag("-5 degrees", 10.0), &s).token, StructuralToken::Plain);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let s = stats(10.0, 10.0);
        let out = classify(&frag("  a \t b\n\nc  ", 10.0), &s);
        assert_eq!(out.text, "a b c");
    }

    #[test]
    fn classification_is_deterministic() {
        let s = stats(11.0, 24.0);
        let f = frag("• repeated", 11.0);
        assert_eq!(classify(&f, &s), classify(&f, &s));
    }

    #[test]
    fn larger_font_never_gets_a_deeper_heading() {
        let s = stats(10.0, 40.0);
        let title = s.title_threshold();
        let a = frag("A", title * 1.3 + 0.5);
        for b_size in [title * 1.3, title * 1.2, title, s.subtitle_threshold(), 9.0] {
            let la = heading_level(a.font_size, &s).unwrap();
            if let Some(lb) = heading_level(b_size, &s) {
                assert!(la <= lb, "{la} vs {lb} at {b_size}");
            }
        }
    }

    #[test]
    fn rich_tier_requires_corpus_max() {
        let s = stats(10.0, 24.0);
        assert_eq!(
            rich_heading_tier(&frag("Top", 24.0), &s),
            Some(RichHeadingTier::Primary)
        );
        // above the title threshold but not the maximum
        assert_eq!(
            rich_heading_tier(&frag("Second", 18.0), &s),
            Some(RichHeadingTier::Secondary)
        );
        assert_eq!(
            rich_heading_tier(&frag("Sub", 11.2), &s),
            Some(RichHeadingTier::Secondary)
        );
        assert_eq!(rich_heading_tier(&frag("Body", 10.0), &s), None);
    }
}

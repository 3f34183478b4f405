//! # Label Text
//!
//! Phrases are printed on a fixed canvas in at most two lines of at most
//! twenty characters. Wrapping is greedy and never splits a word across the
//! line boundary; anything that does not fit is dropped.
//!
//! ```text
//! ┌──────────────────────────────┐  300 x 100 canvas
//! │                              │
//! │  Brave little teapot         │  line 1 at y = 25
//! │  rules the shelf             │  line 2 at y = 60 (35 px pitch)
//! │                              │
//! └──────────────────────────────┘
//! ```
//!
//! ```
//! use labelbot::render::text::LabelPhrase;
//!
//! let phrase = LabelPhrase::new("Brave little teapot rules the whole kitchen shelf");
//! assert_eq!(phrase.lines(), &["Brave little teapot", "rules the whole"]);
//! ```

use image::{GrayImage, Luma};
use serde::Serialize;
use spleen_font::{FONT_12X24, PSF2Font};

use crate::error::{LabelbotError, Result};

/// Hard limit on printed characters.
pub const MAX_PHRASE_CHARS: usize = 40;

/// Characters per printed line.
pub const LINE_CHARS: usize = 20;

/// Printed lines per label.
pub const MAX_LINES: usize = 2;

/// Label canvas size in pixels.
pub const CANVAS_WIDTH: u32 = 300;
pub const CANVAS_HEIGHT: u32 = 100;

const MARGIN_X: u32 = 10;
const FIRST_LINE_Y: u32 = 25;
const LINE_PITCH: u32 = 35;
const GLYPH_WIDTH: u32 = 12;
const GLYPH_HEIGHT: u32 = 24;

/// A phrase that is guaranteed to fit on a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelPhrase {
    text: String,
    lines: Vec<String>,
}

impl LabelPhrase {
    /// Fit arbitrary text to the label limits.
    pub fn new(text: &str) -> Self {
        let fitted = fit_chars(text, MAX_PHRASE_CHARS);
        let lines = wrap(&fitted, LINE_CHARS, MAX_LINES);
        Self {
            text: lines.join(" "),
            lines,
        }
    }

    /// The printed text, lines joined with a space.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl std::fmt::Display for LabelPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Keep whole words while the running length stays within `max_chars`.
fn fit_chars(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for word in text.split_whitespace() {
        let len = out.chars().count();
        let extra = word.chars().count() + usize::from(len > 0);
        if len + extra > max_chars {
            if len == 0 {
                // a single overlong word: keep its head
                out = truncate_chars(word, max_chars);
            }
            break;
        }
        if len > 0 {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn truncate_chars(word: &str, max_chars: usize) -> String {
    word.chars().take(max_chars).collect()
}

/// Greedy word wrap.
///
/// Words longer than `width` are cut to `width` on their own line; the rest
/// of such a word is dropped rather than continued on the next line.
pub fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word = truncate_chars(word, width);
        let current_len = current.chars().count();

        if current.is_empty() {
            current = word;
        } else if current_len + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::take(&mut current));
            if lines.len() == max_lines {
                return lines;
            }
            current = word;
        }
    }

    if !current.is_empty() && lines.len() < max_lines {
        lines.push(current);
    }
    lines
}

/// Render a phrase onto the fixed label canvas (white background, black text).
pub fn render_label(phrase: &LabelPhrase) -> Result<GrayImage> {
    let mut canvas = GrayImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Luma([255]));
    let mut font = PSF2Font::new(FONT_12X24)
        .map_err(|_| LabelbotError::Render("Failed to load label font".to_string()))?;

    for (i, line) in phrase.lines().iter().enumerate() {
        let top = FIRST_LINE_Y + i as u32 * LINE_PITCH;
        for (col, ch) in line.chars().enumerate() {
            let left = MARGIN_X + col as u32 * GLYPH_WIDTH;
            let mut utf8 = ch.to_string();
            if font.glyph_for_utf8(utf8.as_bytes()).is_none() {
                utf8 = "?".to_string();
            }
            let Some(glyph) = font.glyph_for_utf8(utf8.as_bytes()) else {
                continue;
            };
            for (row_y, row) in glyph.enumerate() {
                for (col_x, on) in row.enumerate() {
                    let x = left + col_x as u32;
                    let y = top + row_y as u32;
                    if on && x < CANVAS_WIDTH && y < CANVAS_HEIGHT && (row_y as u32) < GLYPH_HEIGHT {
                        canvas.put_pixel(x, y, Luma([0]));
                    }
                }
            }
        }
    }

    Ok(canvas)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_phrase_single_line() {
        let phrase = LabelPhrase::new("hello world");
        assert_eq!(phrase.lines(), &["hello world".to_string()]);
        assert_eq!(phrase.text(), "hello world");
    }

    #[test]
    fn test_wrap_never_splits_words() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 20, 2);
        assert_eq!(lines, vec!["the quick brown fox", "jumps over the lazy"]);
    }

    #[test]
    fn test_overlong_word_is_cut_not_continued() {
        let lines = wrap("supercalifragilisticexpialidocious fun", 20, 2);
        assert_eq!(lines, vec!["supercalifragilistic", "fun"]);
    }

    #[test]
    fn test_whitespace_collapses() {
        let phrase = LabelPhrase::new("  many\n\tspaces   here ");
        assert_eq!(phrase.text(), "many spaces here");
    }

    #[test]
    fn test_limits_hold_for_many_inputs() {
        let words = [
            "a", "tiny", "dragon", "hoards", "teaspoons", "beneath", "the", "kitchen",
            "sink", "extraordinarily", "unbelievably", "magnificent", "x",
        ];
        // sliding windows over the vocabulary give a spread of lengths
        for start in 0..words.len() {
            for len in 1..=words.len() - start {
                let input = words[start..start + len].join(" ");
                let phrase = LabelPhrase::new(&input);
                assert!(phrase.lines().len() <= MAX_LINES, "{}", input);
                assert!(phrase.text().chars().count() <= MAX_PHRASE_CHARS, "{}", input);
                for line in phrase.lines() {
                    assert!(line.chars().count() <= LINE_CHARS, "{}", input);
                    for word in line.split(' ') {
                        assert!(
                            input.split(' ').any(|w| w == word),
                            "word '{}' was split in '{}'",
                            word,
                            input
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(LabelPhrase::new("   ").is_empty());
    }

    #[test]
    fn test_render_label_draws_ink() {
        let canvas = render_label(&LabelPhrase::new("HI")).unwrap();
        assert_eq!(canvas.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        let ink = canvas.pixels().filter(|p| p.0[0] == 0).count();
        assert!(ink > 0);
        // nothing drawn below the second line's baseline area
        for x in 0..CANVAS_WIDTH {
            assert_eq!(canvas.get_pixel(x, CANVAS_HEIGHT - 1)[0], 255);
        }
    }
}

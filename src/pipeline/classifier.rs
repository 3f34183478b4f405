//! # Complexity Classifier
//!
//! Tags a text request Simple, Medium or Complex. The tag is computed once per
//! request and prefixed to downstream prompts as `[COMPLEXITY:X]` so a routing
//! gateway can pick a model tier.
//!
//! | Outcome | Tag |
//! |---------|-----|
//! | answer has a recognizable marker | that marker |
//! | answer without a marker | word-count heuristic |
//! | call failed or timed out | Medium |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::deadline;
use crate::llm::{ChatModel, ChatRequest};

/// Queries with more words than this are Medium when the model gives no marker.
pub const WORD_THRESHOLD: usize = 10;

pub const SYSTEM_PROMPT: &str = "Analyze query complexity. Return ONLY one character: \
'S' (simple/greeting), 'M' (medium), or 'C' (complex/reasoning).";

/// Workload tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassificationTag {
    Simple,
    Medium,
    Complex,
}

impl ClassificationTag {
    pub fn marker(&self) -> char {
        match self {
            Self::Simple => 'S',
            Self::Medium => 'M',
            Self::Complex => 'C',
        }
    }

    /// Routing prefix, e.g. `[COMPLEXITY:C]`.
    pub fn prefix(&self) -> String {
        format!("[COMPLEXITY:{}]", self.marker())
    }
}

impl fmt::Display for ClassificationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

/// Word-count fallback.
pub fn heuristic(text: &str) -> ClassificationTag {
    if text.split_whitespace().count() > WORD_THRESHOLD {
        ClassificationTag::Medium
    } else {
        ClassificationTag::Simple
    }
}

/// First recognizable marker in a model answer, case-insensitive.
///
/// Tokens are whitespace-separated words with surrounding punctuation
/// trimmed, so the `S` in "It's" is not a marker.
pub fn parse_answer(answer: &str) -> Option<ClassificationTag> {
    let upper = answer.to_uppercase().replace("COMPLEXITY", " ");
    upper
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|token| !token.is_empty())
        .find_map(|token| match token {
            "C" => Some(ClassificationTag::Complex),
            "M" => Some(ClassificationTag::Medium),
            "S" => Some(ClassificationTag::Simple),
            t if t.contains("COMPLEX") => Some(ClassificationTag::Complex),
            t if t.contains("MEDIUM") => Some(ClassificationTag::Medium),
            t if t.contains("SIMPLE") => Some(ClassificationTag::Simple),
            _ => None,
        })
}

/// # Complexity Classifier
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Never fails: an unavailable classifier means Medium.
    pub async fn classify(&self, text: &str) -> ClassificationTag {
        let request = ChatRequest::new(text)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(5)
            .with_temperature(0.1);

        match deadline("classifier", self.timeout, self.model.complete(request)).await {
            Ok(answer) => match parse_answer(&answer) {
                Some(tag) => {
                    debug!(%tag, "classified");
                    tag
                }
                None => {
                    let tag = heuristic(text);
                    debug!(%tag, answer = %answer, "no marker in answer, using word count");
                    tag
                }
            },
            Err(e) => {
                warn!("classifier unavailable, defaulting to Medium: {}", e);
                ClassificationTag::Medium
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markers() {
        assert_eq!(parse_answer("C"), Some(ClassificationTag::Complex));
        assert_eq!(parse_answer(" m\n"), Some(ClassificationTag::Medium));
        assert_eq!(parse_answer("s."), Some(ClassificationTag::Simple));
        assert_eq!(parse_answer("[COMPLEXITY:S]"), Some(ClassificationTag::Simple));
        assert_eq!(parse_answer("This is complex"), Some(ClassificationTag::Complex));
        assert_eq!(parse_answer("medium, probably"), Some(ClassificationTag::Medium));
        assert_eq!(parse_answer("Hmm, no idea"), None);
    }

    #[test]
    fn test_markers_inside_sentences() {
        let cases = [
            ("It's complex", Some(ClassificationTag::Complex)),
            ("That's medium", Some(ClassificationTag::Medium)),
            ("Let's say C", Some(ClassificationTag::Complex)),
            ("It's C.", Some(ClassificationTag::Complex)),
            ("Complexity: medium", Some(ClassificationTag::Medium)),
            ("I'd say simple", Some(ClassificationTag::Simple)),
            ("COMPLEXITY:C", Some(ClassificationTag::Complex)),
            ("(m)", Some(ClassificationTag::Medium)),
            ("'S'", Some(ClassificationTag::Simple)),
            ("It's hard to say", None),
            ("What's that?", None),
        ];
        for (answer, expected) in cases {
            assert_eq!(parse_answer(answer), expected, "answer: {:?}", answer);
        }
    }

    #[test]
    fn test_first_token_wins() {
        assert_eq!(parse_answer("M or C"), Some(ClassificationTag::Medium));
    }

    #[test]
    fn test_heuristic_threshold() {
        assert_eq!(heuristic("hello there"), ClassificationTag::Simple);
        let ten = "one two three four five six seven eight nine ten";
        assert_eq!(heuristic(ten), ClassificationTag::Simple);
        assert_eq!(heuristic(&format!("{} eleven", ten)), ClassificationTag::Medium);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(ClassificationTag::Complex.prefix(), "[COMPLEXITY:C]");
    }
}

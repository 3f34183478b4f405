//! Label synthesizer: two interpretations in, one short phrase out.
//!
//! The 40 character limit is asked for in the prompt but enforced by
//! [`LabelPhrase::new`], never by the model's cooperation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::classifier::ClassificationTag;
use super::deadline;
use crate::error::{LabelbotError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::render::text::MAX_PHRASE_CHARS;
use crate::render::LabelPhrase;

const SYSTEM_PROMPT: &str = "You write the text for a small printed label. \
Combine the creative take and the fun take into ONE short motivational phrase of at \
most 40 characters, short enough to fit on 2 lines. Reply with the phrase only.";

/// Used when neither the model nor the interpretations give usable text.
const LAST_RESORT: &str = "Stay curious";

#[derive(Clone)]
pub struct Synthesizer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Combine the available takes. At least one must be present.
    pub async fn synthesize(
        &self,
        tag: ClassificationTag,
        creative: Option<&str>,
        fun: Option<&str>,
    ) -> Result<LabelPhrase> {
        if creative.is_none() && fun.is_none() {
            return Err(LabelbotError::InterpreterUnavailable {
                kind: None,
                message: "nothing to synthesize from".to_string(),
            });
        }

        let mut prompt = tag.prefix();
        if let Some(text) = creative {
            prompt.push_str(&format!("\nCreative take:\n{}\n", text));
        }
        if let Some(text) = fun {
            prompt.push_str(&format!("\nFun take:\n{}\n", text));
        }
        let request = ChatRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(30);

        let generated = deadline("synthesizer", self.timeout, self.model.complete(request))
            .await
            .map(|answer| clean_answer(&answer));
        let phrase = match generated {
            Ok(text) if !text.is_empty() => LabelPhrase::new(&text),
            Ok(_) => {
                warn!("synthesizer returned nothing usable, deriving phrase locally");
                local_phrase(creative.into_iter().chain(fun))
            }
            Err(e) => {
                warn!("synthesizer unavailable, deriving phrase locally: {}", e);
                local_phrase(creative.into_iter().chain(fun))
            }
        };
        debug!(phrase = %phrase, "phrase ready");
        Ok(phrase)
    }
}

/// Strip wrapping quotes and keep the first non-empty line.
fn clean_answer(answer: &str) -> String {
    answer
        .lines()
        .map(|line| line.trim().trim_matches(|c| c == '"' || c == '\'' || c == '*').trim())
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// First content line of the surviving interpretations, minus headings and
/// list markers.
pub fn local_phrase<'a>(texts: impl IntoIterator<Item = &'a str>) -> LabelPhrase {
    let line = texts
        .into_iter()
        .flat_map(str::lines)
        .map(strip_markup)
        .find(|line| !line.is_empty() && !line.ends_with(':'))
        .unwrap_or_else(|| LAST_RESORT.to_string());
    let phrase = LabelPhrase::new(&line);
    if phrase.is_empty() {
        LabelPhrase::new(LAST_RESORT)
    } else {
        phrase
    }
}

fn strip_markup(line: &str) -> String {
    let line = line.trim().trim_start_matches(['#', '-', '*', '•', ' ']);
    let line = match line.split_once(['.', ')']) {
        Some((number, rest)) if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => line,
    };
    let cleaned = line.replace("**", "");
    let cleaned = cleaned.trim();
    // keep it short enough that the 40 char fit has whole words to work with
    cleaned
        .split_whitespace()
        .scan(0usize, |len, word| {
            *len += word.chars().count() + 1;
            (*len <= MAX_PHRASE_CHARS * 2).then_some(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("\"Dream big, mug!\"\n"), "Dream big, mug!");
        assert_eq!(clean_answer("\n\n  **Go on**"), "Go on");
        assert_eq!(clean_answer("  "), "");
    }

    #[test]
    fn test_local_phrase_skips_headings_and_markers() {
        let fun = "Fun Ideas:\n1. **This mug** has seen more Mondays than you\n2. Coffee's throne";
        let phrase = local_phrase([fun]);
        assert_eq!(phrase.lines(), ["This mug has seen", "more Mondays than"]);
        assert!(phrase.lines().iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn test_local_phrase_never_empty() {
        assert_eq!(local_phrase(["Fantasy Interpretations:", "  "]).text(), LAST_RESORT);
        assert_eq!(local_phrase(std::iter::empty()).text(), LAST_RESORT);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("- a dragon's egg"), "a dragon's egg");
        assert_eq!(strip_markup("3) a cursed cup"), "a cursed cup");
        assert_eq!(strip_markup("## Fun Ideas:"), "Fun Ideas:");
    }
}

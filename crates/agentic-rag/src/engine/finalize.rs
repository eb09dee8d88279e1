//! Final answer cleanup: answers never end on a question.
//!
//! Deterministic and purely textual; no external calls. The generator is
//! already instructed not to end with a question, this stage enforces the
//! rule when the model slips.
use regex::Regex;
use std::sync::OnceLock;

/// Returned instead of an empty string when stripping trailing questions
/// consumed the whole answer. Declarative, so `finalize` stays idempotent.
pub const EMPTY_ANSWER_FALLBACK: &str = "There is nothing further to add on this topic.";

fn interrogative_opening() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(any (other )?questions|would you like|do you (want|need|have)|is there anything else|can i help|shall i|what else can i)",
        )
        .expect("interrogative pattern is valid")
    })
}

/// Removes trailing interrogative sentences, leaving the preceding
/// declarative content intact. Idempotent: finalizing its own output is a
/// no-op.
pub fn finalize(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    loop {
        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            text.clear();
            break;
        }

        let start = last_sentence_start(trimmed);
        let last_sentence = trimmed[start..].trim_start();
        if last_sentence.ends_with('?') || interrogative_opening().is_match(last_sentence) {
            text = trimmed[..start].trim_end().to_string();
        } else {
            text = trimmed.to_string();
            break;
        }
    }

    if text.is_empty() {
        EMPTY_ANSWER_FALLBACK.to_string()
    } else {
        text
    }
}

/// Byte offset where the final sentence begins. The terminal punctuation
/// run of the final sentence itself is ignored so "Done. Any questions?"
/// splits before "Any", not before "?".
fn last_sentence_start(text: &str) -> usize {
    let mut end = text.len();
    for (idx, ch) in text.char_indices().rev() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            end = idx;
        } else {
            break;
        }
    }

    match text[..end].rfind(|c: char| matches!(c, '.' | '!' | '?' | '\n')) {
        Some(idx) => idx + 1,
        None => 0,
    }
}

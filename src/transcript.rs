//! Transcript documents produced by the transcription stage.
//!
//! Two shapes are written to disk: a keyed object carrying the utterance list
//! plus language metadata, or a bare list of utterances. Both are resolved
//! into [`TranscriptDocument`] once, and [`normalize`] turns either into a
//! single flat text blob with an embed/skip decision.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Language assumed when a transcript does not declare one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A single utterance from a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Utterance {
    /// Speaker label, if diarization produced one.
    pub speaker: Option<String>,
    /// Spoken text.
    pub text: Option<String>,
    /// Start time in seconds.
    pub start: Option<f64>,
    /// End time in seconds.
    pub end: Option<f64>,
}

/// A transcript file resolved into one of its two recognized shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptDocument {
    /// `{"transcript" | "utterances": [...], "original_language"?, "translated"?}`
    Keyed {
        utterances: Vec<Utterance>,
        original_language: String,
        translated: bool,
    },
    /// A bare list of utterances, implicitly in the target language.
    Bare(Vec<Utterance>),
}

impl TranscriptDocument {
    /// Resolve a parsed JSON value into a transcript document.
    ///
    /// Returns `None` for anything that is not one of the two recognized
    /// shapes. A bare list must contain at least one object with a `text`
    /// field; an empty list is treated as not (yet) a transcript.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let list = map.get("transcript").or_else(|| map.get("utterances"))?;
                let utterances = utterances_from(list.as_array()?);
                let original_language = map
                    .get("original_language")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_LANGUAGE)
                    .to_string();
                let translated = map
                    .get("translated")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                Some(Self::Keyed {
                    utterances,
                    original_language,
                    translated,
                })
            }
            Value::Array(items) => {
                let has_text = items
                    .iter()
                    .any(|item| item.as_object().is_some_and(|o| o.contains_key("text")));
                if !has_text {
                    return None;
                }
                Some(Self::Bare(utterances_from(items)))
            }
            _ => None,
        }
    }

    /// The utterances of this document, in original order.
    pub fn utterances(&self) -> &[Utterance] {
        match self {
            Self::Keyed { utterances, .. } => utterances,
            Self::Bare(utterances) => utterances,
        }
    }

    /// Word, speaker and utterance counts for display.
    pub fn stats(&self) -> TranscriptStats {
        let utterances = self.utterances();
        let words = utterances
            .iter()
            .filter_map(|u| u.text.as_deref())
            .map(|t| t.split_whitespace().count())
            .sum();
        let speakers: HashSet<&str> = utterances
            .iter()
            .filter_map(|u| u.speaker.as_deref())
            .collect();

        TranscriptStats {
            utterances: utterances.len(),
            words,
            speakers: speakers.len(),
        }
    }
}

// Fields are read one by one: a mistyped field drops only that field, and a
// non-object entry becomes an empty utterance.
fn utterances_from(items: &[Value]) -> Vec<Utterance> {
    items
        .iter()
        .map(|item| {
            let field = |name: &str| item.get(name);
            Utterance {
                speaker: field("speaker").and_then(Value::as_str).map(str::to_string),
                text: field("text").and_then(Value::as_str).map(str::to_string),
                start: field("start").and_then(Value::as_f64),
                end: field("end").and_then(Value::as_f64),
            }
        })
        .collect()
}

/// Summary counts for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptStats {
    pub utterances: usize,
    pub words: usize,
    pub speakers: usize,
}

/// Why a document was excluded from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Declared language differs from the target and no translation is marked.
    Untranslated { language: String },
    /// No utterance text after concatenation.
    EmptyText,
    /// Neither recognized transcript shape.
    UnrecognizedShape,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Untranslated { language } => {
                write!(f, "untranslated transcript in '{}'", language)
            }
            SkipReason::EmptyText => write!(f, "no text content"),
            SkipReason::UnrecognizedShape => write!(f, "unrecognized transcript format"),
        }
    }
}

/// A transcript flattened into embeddable text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTranscript {
    /// Utterance texts joined by single spaces.
    pub text: String,
    /// Declared (or implied) language of the transcript.
    pub language: String,
    /// Whether the transcript is marked as translated.
    pub translated: bool,
    /// Set when the document must not be embedded.
    pub skip: Option<SkipReason>,
}

impl NormalizedTranscript {
    pub fn should_embed(&self) -> bool {
        self.skip.is_none()
    }

    fn skipped(language: String, translated: bool, reason: SkipReason) -> Self {
        Self {
            text: String::new(),
            language,
            translated,
            skip: Some(reason),
        }
    }
}

/// Flatten a transcript document and decide whether it should be embedded.
pub fn normalize(document: &TranscriptDocument, target_language: &str) -> NormalizedTranscript {
    let (language, translated) = match document {
        TranscriptDocument::Keyed {
            original_language,
            translated,
            ..
        } => {
            if original_language != target_language && !translated {
                return NormalizedTranscript::skipped(
                    original_language.clone(),
                    *translated,
                    SkipReason::Untranslated {
                        language: original_language.clone(),
                    },
                );
            }
            (original_language.clone(), *translated)
        }
        TranscriptDocument::Bare(_) => (target_language.to_string(), false),
    };

    let text = document
        .utterances()
        .iter()
        .filter_map(|u| u.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ");

    if text.trim().is_empty() {
        return NormalizedTranscript::skipped(language, translated, SkipReason::EmptyText);
    }

    NormalizedTranscript {
        text,
        language,
        translated,
        skip: None,
    }
}

/// Classify and normalize a raw JSON value in one step.
pub fn normalize_value(value: &Value, target_language: &str) -> NormalizedTranscript {
    match TranscriptDocument::from_value(value) {
        Some(document) => normalize(&document, target_language),
        None => NormalizedTranscript::skipped(
            target_language.to_string(),
            false,
            SkipReason::UnrecognizedShape,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyed_transcript_is_joined_in_order() {
        let value = json!({
            "transcript": [
                {"speaker": "A", "text": "Budget is approved.", "start": 0.0, "end": 2.5},
                {"speaker": "B", "text": "Great, ship it.", "start": 2.5, "end": 4.0}
            ],
            "original_language": "en"
        });

        let normalized = normalize_value(&value, "en");
        assert!(normalized.should_embed());
        assert_eq!(normalized.text, "Budget is approved. Great, ship it.");
        assert_eq!(normalized.language, "en");
    }

    #[test]
    fn test_utterances_key_is_accepted() {
        let value = json!({"utterances": [{"text": "hello"}]});
        let normalized = normalize_value(&value, "en");
        assert_eq!(normalized.text, "hello");
    }

    #[test]
    fn test_untranslated_foreign_transcript_is_skipped() {
        let value = json!({
            "transcript": [{"speaker": "A", "text": "gamarjoba"}],
            "original_language": "ka"
        });

        let normalized = normalize_value(&value, "en");
        assert!(!normalized.should_embed());
        assert_eq!(
            normalized.skip,
            Some(SkipReason::Untranslated {
                language: "ka".to_string()
            })
        );
    }

    #[test]
    fn test_translated_foreign_transcript_is_embedded() {
        let value = json!({
            "transcript": [{"speaker": "A", "text": "hello"}],
            "original_language": "ka",
            "translated": true
        });

        let normalized = normalize_value(&value, "en");
        assert!(normalized.should_embed());
        assert_eq!(normalized.language, "ka");
        assert!(normalized.translated);
    }

    #[test]
    fn test_bare_list_is_target_language() {
        let value = json!([
            {"speaker": "A", "text": "first"},
            {"speaker": "B"},
            {"speaker": "A", "text": "second"}
        ]);

        let normalized = normalize_value(&value, "en");
        assert!(normalized.should_embed());
        assert_eq!(normalized.text, "first second");
    }

    #[test]
    fn test_whitespace_only_text_is_skipped() {
        let value = json!({"transcript": [{"text": "  "}, {"text": ""}]});
        let normalized = normalize_value(&value, "en");
        assert_eq!(normalized.skip, Some(SkipReason::EmptyText));
    }

    #[test]
    fn test_unrecognized_shapes() {
        for value in [
            json!({"summary": "nope"}),
            json!({"transcript": "not a list"}),
            json!([]),
            json!([{"speaker": "A"}]),
            json!("text"),
            json!(42),
        ] {
            assert!(TranscriptDocument::from_value(&value).is_none(), "{value}");
            assert_eq!(
                normalize_value(&value, "en").skip,
                Some(SkipReason::UnrecognizedShape)
            );
        }
    }

    #[test]
    fn test_odd_elements_do_not_disqualify_list() {
        let value = json!(["stray", {"text": "kept", "start": "bad"}, {"text": "also"}]);
        let document = TranscriptDocument::from_value(&value).unwrap();
        assert_eq!(normalize(&document, "en").text, "kept also");
        assert_eq!(document.utterances()[0], Utterance::default());
        assert_eq!(document.utterances()[1].start, None);
    }

    #[test]
    fn test_stats() {
        let value = json!([
            {"speaker": "A", "text": "one two three"},
            {"speaker": "B", "text": "four"},
            {"speaker": "A", "text": "five six"}
        ]);
        let stats = TranscriptDocument::from_value(&value).unwrap().stats();
        assert_eq!(
            stats,
            TranscriptStats {
                utterances: 3,
                words: 6,
                speakers: 2
            }
        );
    }
}

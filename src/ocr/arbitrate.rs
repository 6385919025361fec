// src/ocr/arbitrate.rs
//! Pure selection between the Latin and Malayalic recognition passes.
//!
//! Policy, in order:
//! 1. Malayalic pass contains Malayalam code points and confidence > 35 → Malayalic.
//! 2. Latin confidence > 50 → Latin.
//! 3. Strictly higher raw confidence wins; ties go to Latin.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::ocr::engine::{RecognitionResult, Script};

pub const MALAYALIC_MIN_CONFIDENCE: f32 = 35.0;
pub const LATIN_MIN_CONFIDENCE: f32 = 50.0;

/// Final answer returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrationOutcome {
    pub text: String,
    pub confidence: f32,
    pub chosen_script: Script,
}

impl ArbitrationOutcome {
    /// Zero-confidence empty result used whenever detection cannot run.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            chosen_script: Script::Latin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.confidence == 0.0
    }
}

impl From<RecognitionResult> for ArbitrationOutcome {
    fn from(r: RecognitionResult) -> Self {
        Self {
            text: r.text,
            confidence: r.confidence,
            chosen_script: r.script,
        }
    }
}

/// Collapse line breaks and whitespace runs into single spaces, then trim.
pub fn normalize_transcription(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// True if any char falls in the Malayalam block (U+0D00–U+0D7F).
pub fn contains_malayalam(s: &str) -> bool {
    s.chars().any(|c| ('\u{0D00}'..='\u{0D7F}').contains(&c))
}

/// Pick the better of the two passes.
pub fn arbitrate(latin: RecognitionResult, malayalic: RecognitionResult) -> ArbitrationOutcome {
    let latin = RecognitionResult {
        text: normalize_transcription(&latin.text),
        ..latin
    };
    let malayalic = RecognitionResult {
        text: normalize_transcription(&malayalic.text),
        ..malayalic
    };

    let script_confirmed = contains_malayalam(&malayalic.text);

    if script_confirmed && malayalic.confidence > MALAYALIC_MIN_CONFIDENCE {
        return malayalic.into();
    }
    if latin.confidence > LATIN_MIN_CONFIDENCE {
        return latin.into();
    }
    if malayalic.confidence > latin.confidence {
        malayalic.into()
    } else {
        latin.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(text: &str, confidence: f32, script: Script) -> RecognitionResult {
        RecognitionResult {
            text: text.to_string(),
            confidence,
            script,
        }
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(
            normalize_transcription("  Breaking\nnews:\r\n\tmarkets   rally \n"),
            "Breaking news: markets rally"
        );
        assert_eq!(normalize_transcription("\n\n"), "");
    }

    #[test]
    fn detects_malayalam_block() {
        assert!(contains_malayalam("വാർത്ത"));
        assert!(contains_malayalam("news ക"));
        assert!(!contains_malayalam("plain ascii"));
        assert!(!contains_malayalam("हिन्दी"));
    }

    #[test]
    fn confirmed_malayalam_beats_confident_latin() {
        let out = arbitrate(
            pass("l1ke n0ise", 90.0, Script::Latin),
            pass("ഇത് ഒരു വാർത്തയാണ്", 40.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Malayalic);
        assert_eq!(out.confidence, 40.0);
    }

    #[test]
    fn confirmed_malayalam_needs_more_than_35() {
        let out = arbitrate(
            pass("text", 30.0, Script::Latin),
            pass("വാർത്ത", 35.0, Script::Malayalic),
        );
        // falls through to raw comparison: 35 > 30
        assert_eq!(out.chosen_script, Script::Malayalic);

        let out = arbitrate(
            pass("text", 51.0, Script::Latin),
            pass("വാർത്ത", 35.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Latin);
    }

    #[test]
    fn latin_over_threshold_wins() {
        let out = arbitrate(
            pass("Hello\nworld", 51.0, Script::Latin),
            pass("garbage", 99.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Latin);
        assert_eq!(out.text, "Hello world");
    }

    #[test]
    fn below_thresholds_compare_raw_confidence() {
        let out = arbitrate(
            pass("latin", 30.0, Script::Latin),
            pass("not malayalam", 20.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Latin);

        let out = arbitrate(
            pass("latin", 20.0, Script::Latin),
            pass("still ascii", 30.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Malayalic);
    }

    #[test]
    fn ties_go_to_latin() {
        let out = arbitrate(
            pass("a", 25.0, Script::Latin),
            pass("b", 25.0, Script::Malayalic),
        );
        assert_eq!(out.chosen_script, Script::Latin);
        assert_eq!(out.text, "a");
    }

    #[test]
    fn empty_outcome_shape() {
        let e = ArbitrationOutcome::empty();
        assert!(e.is_empty());
        assert_eq!(e.chosen_script, Script::Latin);
    }
}

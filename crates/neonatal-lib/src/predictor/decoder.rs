//! Response decoding
//!
//! Recovers a structured prediction from free-form model output. The decoder
//! runs an ordered list of pure strategies over a [`ResponseText`] and keeps
//! the first one that yields a prediction:
//!
//! 1. `direct` - the cleaned text is a single JSON object
//! 2. `embedded` - a JSON object spans the first `{` to the last `}` of the
//!    cleaned text
//! 3. `raw-embedded` - an object starting with `"predicted_weight_grams"`
//!    appears anywhere in the raw text, reasoning included
//! 4. `numeric-fallback` - the last plausible gram value in the raw text
//!
//! The cleaned text is the raw text with `<think>` reasoning segments removed.

use crate::error::DecodeFailure;
use crate::models::{ExtractionStrategy, PredictionResult, RiskLevel};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Lower bound of the plausible birth-weight range in grams
pub const MIN_PLAUSIBLE_GRAMS: u32 = 1000;

/// Upper bound of the plausible birth-weight range in grams
pub const MAX_PLAUSIBLE_GRAMS: u32 = 6000;

/// Note attached to predictions scraped by the numeric fallback
pub const NUMERIC_FALLBACK_NOTE: &str = "Extracted from reasoning";

const WEIGHT_KEY: &str = "predicted_weight_grams";
const RISK_KEY: &str = "risk_level";
const NOTE_KEY: &str = "clinical_note";

/// Words that mark the following number as a date or reference
const NON_MEASUREMENT_PREFIXES: &[&str] = &["year", "page", "#"];

static CLOSED_THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static OPEN_THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*").expect("valid regex"));

static RAW_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"predicted_weight_grams"\s*:\s*\d[\s\S]*?\}"#).expect("valid regex")
});

/// ASCII, Arabic-Indic and Extended Arabic-Indic digit runs
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9\x{0660}-\x{0669}\x{06F0}-\x{06F9}]{3,4})\b").expect("valid regex")
});

/// Raw model output together with its reasoning-free form
#[derive(Debug, Clone)]
pub struct ResponseText<'a> {
    raw: &'a str,
    cleaned: String,
}

impl<'a> ResponseText<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            cleaned: strip_reasoning(raw),
        }
    }

    /// The unprocessed response, reasoning segments included
    pub fn raw(&self) -> &str {
        self.raw
    }

    /// The response with reasoning segments removed and whitespace trimmed
    pub fn cleaned(&self) -> &str {
        &self.cleaned
    }
}

/// A single decode strategy
pub type DecodeStrategy = fn(&ResponseText<'_>) -> Option<PredictionResult>;

/// Remove `<think>` reasoning segments, closed or running to end of text
pub fn strip_reasoning(raw: &str) -> String {
    let without_closed = CLOSED_THINK_RE.replace_all(raw, "");
    let without_open = OPEN_THINK_RE.replace(&without_closed, "");
    without_open.trim().to_string()
}

/// Parse the whole cleaned text as one JSON object
pub fn direct_json(text: &ResponseText<'_>) -> Option<PredictionResult> {
    parse_prediction_object(text.cleaned(), ExtractionStrategy::Direct)
}

/// Parse the outermost `{ ... }` span of the cleaned text
pub fn embedded_object(text: &ResponseText<'_>) -> Option<PredictionResult> {
    let cleaned = text.cleaned();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if start >= end {
        return None;
    }
    parse_prediction_object(&cleaned[start..=end], ExtractionStrategy::Embedded)
}

/// Find a prediction object anywhere in the raw text, reasoning included.
/// Some models state the answer while thinking and never repeat it.
pub fn raw_targeted_object(text: &ResponseText<'_>) -> Option<PredictionResult> {
    let found = RAW_OBJECT_RE.find(text.raw())?;
    parse_prediction_object(found.as_str(), ExtractionStrategy::RawEmbedded)
}

/// Take the last plausible gram value mentioned in the raw text
pub fn numeric_fallback(text: &ResponseText<'_>) -> Option<PredictionResult> {
    let raw = text.raw();
    let weight = NUMBER_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            if follows_non_measurement_word(&raw[..m.start()]) {
                return None;
            }
            parse_digits(m.as_str())
        })
        .filter(|value| (MIN_PLAUSIBLE_GRAMS..=MAX_PLAUSIBLE_GRAMS).contains(value))
        .last()?;

    Some(PredictionResult::new(
        f64::from(weight),
        RiskLevel::Unknown,
        NUMERIC_FALLBACK_NOTE,
        ExtractionStrategy::NumericFallback,
    ))
}

/// Decimal value of a digit run matched by `NUMBER_RE`
fn parse_digits(digits: &str) -> Option<u32> {
    digits.chars().try_fold(0u32, |acc, c| {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
            '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
            _ => return None,
        };
        acc.checked_mul(10)?.checked_add(digit)
    })
}

fn follows_non_measurement_word(before: &str) -> bool {
    let preceding = before
        .trim_end()
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_end_matches([':', '.'])
        .to_ascii_lowercase();
    NON_MEASUREMENT_PREFIXES
        .iter()
        .any(|word| preceding == *word || (*word == "#" && preceding.ends_with('#')))
}

/// Parse `candidate` as a JSON object carrying a valid weight
fn parse_prediction_object(candidate: &str, strategy: ExtractionStrategy) -> Option<PredictionResult> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    prediction_from_object(object, strategy)
}

fn prediction_from_object(
    object: &Map<String, Value>,
    strategy: ExtractionStrategy,
) -> Option<PredictionResult> {
    let weight = match object.get(WEIGHT_KEY)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !weight.is_finite() || weight <= 0.0 {
        return None;
    }

    let risk = object
        .get(RISK_KEY)
        .and_then(Value::as_str)
        .map(RiskLevel::from_label)
        .unwrap_or(RiskLevel::Unknown);

    let note = object
        .get(NOTE_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(PredictionResult::new(weight, risk, note, strategy))
}

/// Ordered strategy chain; first success wins
#[derive(Clone)]
pub struct ResponseDecoder {
    strategies: Vec<DecodeStrategy>,
}

impl std::fmt::Debug for ResponseDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDecoder")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl ResponseDecoder {
    /// Decoder with the standard strategy order
    pub fn new() -> Self {
        Self::with_strategies(vec![
            direct_json,
            embedded_object,
            raw_targeted_object,
            numeric_fallback,
        ])
    }

    /// Decoder with a custom strategy order
    pub fn with_strategies(strategies: Vec<DecodeStrategy>) -> Self {
        Self { strategies }
    }

    /// Decode one raw response
    pub fn decode(&self, raw: &str) -> Result<PredictionResult, DecodeFailure> {
        let text = ResponseText::new(raw);
        self.strategies
            .iter()
            .find_map(|strategy| strategy(&text))
            .ok_or(DecodeFailure {
                response_len: raw.chars().count(),
            })
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

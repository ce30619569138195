//! Typed token extraction from recognized text.
//!
//! Substrings are classified as currency amounts, percentages, dates and bare
//! numbers. Matching runs in that order and a later match overlapping an
//! already accepted token is discarded, so `"$1,000"` yields one currency token
//! and no bare number.
//!
//! Normalization:
//! - currency: marker and thousands separators stripped (`"Rs. 5,00,000"` -> `"500000"`)
//! - percentage: `%` stripped
//! - number: thousands separators stripped, decimal point kept
//! - date: kept as written

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::types::{ContentKind, ContentToken, MixedContent, StructuredContent};

/// Currency used when an amount's marker cannot be identified.
pub const DEFAULT_CURRENCY: &str = "INR";

static CURRENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<marker>Rs\.?|INR|USD|EUR|₹|₨|\$|€|£|¥)\s*(?P<amount>[0-9][0-9,]*(?:\.[0-9]{2})?)")
        .expect("Currency regex pattern is valid and should compile")
});
static PERCENTAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?%").expect("Percentage regex pattern is valid and should compile"));
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{1,2}[/-][0-9]{1,2}[/-][0-9]{2,4}").expect("Date regex pattern is valid and should compile")
});
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]+(?:,[0-9]{3})*(?:\.[0-9]+)?").expect("Number regex pattern is valid and should compile")
});

/// Classifies substrings of recognized text into [`ContentToken`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedContentExtractor;

impl MixedContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract typed tokens, ordered by position, plus their structured summary.
    pub fn extract(&self, text: &str) -> MixedContent {
        let mut tokens: Vec<ContentToken> = Vec::new();

        for m in CURRENCY_PATTERN.captures_iter(text) {
            let (Some(whole), Some(amount)) = (m.get(0), m.name("amount")) else {
                continue;
            };
            push_unless_overlapping(
                &mut tokens,
                ContentKind::Currency,
                whole.range(),
                whole.as_str(),
                strip_separators(amount.as_str()),
            );
        }

        for m in PERCENTAGE_PATTERN.find_iter(text) {
            let value = m.as_str().trim_end_matches('%').to_string();
            push_unless_overlapping(&mut tokens, ContentKind::Percentage, m.range(), m.as_str(), value);
        }

        for m in DATE_PATTERN.find_iter(text) {
            push_unless_overlapping(&mut tokens, ContentKind::Date, m.range(), m.as_str(), m.as_str().to_string());
        }

        for m in NUMBER_PATTERN.find_iter(text) {
            push_unless_overlapping(
                &mut tokens,
                ContentKind::Number,
                m.range(),
                m.as_str(),
                strip_separators(m.as_str()),
            );
        }

        tokens.sort_by_key(|t| t.position);
        let structured = structure(&tokens);
        MixedContent { tokens, structured }
    }

    /// Raw text around every currency, percentage and number token, keyed by
    /// `"<kind>:<normalized value>"`.
    ///
    /// `window` counts characters on each side of the token; slices are clipped
    /// to the text.
    pub fn preserve_context(&self, text: &str, window: usize) -> BTreeMap<String, Vec<String>> {
        let mut context: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for token in self.extract(text).tokens {
            if token.kind == ContentKind::Date {
                continue;
            }
            let start = chars_back(text, token.position, window);
            let end = chars_forward(text, token.end(), window);
            context
                .entry(format!("{}:{}", token.kind, token.normalized_value))
                .or_default()
                .push(text[start..end].to_string());
        }

        context
    }

    /// Every number in the text as `f64`, with thousands separators removed.
    pub fn extract_numbers(&self, text: &str) -> Vec<f64> {
        NUMBER_PATTERN
            .find_iter(text)
            .filter_map(|m| strip_separators(m.as_str()).parse::<f64>().ok())
            .collect()
    }

    /// Every currency amount as `(marker, amount)`.
    ///
    /// The marker is reported as written, minus a trailing dot (`"Rs."` -> `"Rs"`),
    /// falling back to [`DEFAULT_CURRENCY`].
    pub fn extract_currency_values(&self, text: &str) -> Vec<(String, f64)> {
        CURRENCY_PATTERN
            .captures_iter(text)
            .map(|caps| {
                let symbol = caps
                    .name("marker")
                    .map(|m| m.as_str().trim_end_matches('.'))
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_CURRENCY)
                    .to_string();
                let amount = caps
                    .name("amount")
                    .and_then(|a| strip_separators(a.as_str()).parse::<f64>().ok())
                    .unwrap_or(0.0);
                (symbol, amount)
            })
            .collect()
    }

    /// Distinct characters that are neither alphanumeric nor whitespace, sorted.
    pub fn extract_special_characters(&self, text: &str) -> Vec<char> {
        let mut chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .collect();
        chars.sort_unstable();
        chars.dedup();
        chars
    }
}

fn push_unless_overlapping(
    tokens: &mut Vec<ContentToken>,
    kind: ContentKind,
    span: Range<usize>,
    raw: &str,
    normalized_value: String,
) {
    if tokens.iter().any(|t| span.start < t.end() && t.position < span.end) {
        return;
    }
    tokens.push(ContentToken {
        kind,
        normalized_value,
        raw_text: raw.to_string(),
        position: span.start,
    });
}

fn strip_separators(value: &str) -> String {
    value.replace(',', "")
}

fn structure(tokens: &[ContentToken]) -> StructuredContent {
    let mut structured = StructuredContent::default();
    for token in tokens {
        let bucket = match token.kind {
            ContentKind::Currency => &mut structured.currencies,
            ContentKind::Percentage => &mut structured.percentages,
            ContentKind::Number => &mut structured.numbers,
            ContentKind::Date => &mut structured.dates,
        };
        bucket.push(token.normalized_value.clone());
    }
    structured
}

/// Byte offset `n` characters before `pos` (or 0).
fn chars_back(text: &str, pos: usize, n: usize) -> usize {
    text[..pos]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos)
}

/// Byte offset `n` characters after `end` (or the end of the text).
fn chars_forward(text: &str, end: usize, n: usize) -> usize {
    text[end..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len())
}

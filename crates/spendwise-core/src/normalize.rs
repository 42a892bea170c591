//! Text normalization for descriptions and merchant names
//!
//! Two levels are provided:
//! - [`Normalizer::clean`] lowercases, removes punctuation and collapses
//!   whitespace. Used by the classifier on both transaction text and
//!   taxonomy keywords, so the two sides always compare like for like.
//! - [`Normalizer::recurrence_key`] additionally drops billing boilerplate
//!   ("payment", "auto", "recurring", ...) and short tokens, producing the
//!   key recurring charges are grouped under.

use regex::Regex;

/// Phrases removed before tokenizing a recurrence key
const BOILERPLATE_PREFIXES: &[&str] = &["payment to", "charge from", "debit from", "credit to"];

/// Tokens that never identify a merchant
const NOISE_WORDS: &[&str] = &["payment", "charge", "debit", "credit", "auto", "recurring"];

/// Tokens this short are store numbers, state codes and the like
const MIN_KEY_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct Normalizer {
    apostrophes: Regex,
    punctuation: Regex,
    whitespace: Regex,
}

impl Normalizer {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            apostrophes: Regex::new(r"['’`]")?,
            punctuation: Regex::new(r"[^\w\s]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Lowercase, drop apostrophes, turn other punctuation into spaces, collapse whitespace
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let lower = text.to_lowercase();
        let no_apostrophes = self.apostrophes.replace_all(&lower, "");
        let spaced = self.punctuation.replace_all(&no_apostrophes, " ");
        self.whitespace.replace_all(&spaced, " ").trim().to_string()
    }

    /// Clean an optional field, treating `None` as empty
    pub fn clean_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.clean(t)).unwrap_or_default()
    }

    /// Grouping key for recurring charge detection
    pub fn recurrence_key(&self, description: &str) -> String {
        let mut cleaned = self.clean(description);
        for prefix in BOILERPLATE_PREFIXES {
            cleaned = cleaned.replace(prefix, " ");
        }

        cleaned
            .split_whitespace()
            .filter(|word| word.chars().count() >= MIN_KEY_TOKEN_LEN)
            .filter(|word| !NOISE_WORDS.contains(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new().unwrap()
    }

    #[test]
    fn test_clean_lowercases_and_strips_punctuation() {
        let n = normalizer();
        assert_eq!(n.clean("Lunch at McDonald's!"), "lunch at mcdonalds");
        assert_eq!(n.clean("NETFLIX.COM*12345"), "netflix com 12345");
        assert_eq!(n.clean("  Whole   Foods\tMarket "), "whole foods market");
        assert_eq!(n.clean(""), "");
    }

    #[test]
    fn test_clean_opt_handles_missing() {
        let n = normalizer();
        assert_eq!(n.clean_opt(None), "");
        assert_eq!(n.clean_opt(Some("Shell #42")), "shell 42");
    }

    #[test]
    fn test_recurrence_key_drops_boilerplate() {
        let n = normalizer();
        assert_eq!(n.recurrence_key("SPOTIFY USA Recurring Payment"), "spotify usa");
        assert_eq!(n.recurrence_key("Payment to Netflix.com"), "netflix com");
        assert_eq!(n.recurrence_key("AUTO CHARGE - Planet Fitness #12"), "planet fitness");
    }

    #[test]
    fn test_recurrence_key_is_stable_across_ids() {
        let n = normalizer();
        assert_eq!(
            n.recurrence_key("HULU 12 LA"),
            n.recurrence_key("Hulu *99 CA")
        );
    }
}

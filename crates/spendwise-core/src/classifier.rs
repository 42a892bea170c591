//! Expense category classifier
//!
//! Every taxonomy tag is scored with four weighted signals:
//!
//! | Signal   | Weight | Source |
//! |----------|--------|--------|
//! | text     | 0.4    | keyword hits in the cleaned description |
//! | merchant | 0.3    | known merchant names |
//! | amount   | 0.2    | typical amount ranges |
//! | learning | 0.1    | the user's correction history |
//!
//! The highest combined score wins. A winner below the fallback threshold is
//! replaced by the taxonomy's fallback tag at a fixed confidence.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ClassifierConfig, LearningConfig};
use crate::error::{Error, Result};
use crate::learning::LearningProfile;
use crate::models::{CategorySuggestion, ClassificationResult, Correction};
use crate::normalize::Normalizer;
use crate::taxonomy::{CategorySignature, Taxonomy};

/// Number of matched keywords quoted in the reasoning text
const REASONING_KEYWORDS: usize = 3;

/// Number of keywords attached to a suggestion
const SAMPLE_KEYWORDS: usize = 5;

pub struct CategoryClassifier {
    taxonomy: Taxonomy,
    normalizer: Normalizer,
    config: ClassifierConfig,
    learning: LearningConfig,
}

impl CategoryClassifier {
    pub fn new(
        taxonomy: Taxonomy,
        normalizer: Normalizer,
        config: ClassifierConfig,
        learning: LearningConfig,
    ) -> Self {
        Self {
            taxonomy,
            normalizer,
            config,
            learning,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Categorize one transaction
    ///
    /// `profile` is the user's learning profile, if the caller has one.
    /// Missing text fields only zero the text and merchant signals; a
    /// non-finite amount is the one input that is rejected.
    pub fn categorize(
        &self,
        description: &str,
        amount: f64,
        merchant: Option<&str>,
        profile: Option<&LearningProfile>,
    ) -> Result<ClassificationResult> {
        if !amount.is_finite() {
            return Err(Error::MalformedInput(format!(
                "amount is not a finite number: {}",
                amount
            )));
        }

        let description = self.normalizer.clean(description);
        let merchant = self.normalizer.clean_opt(merchant);

        let mut all_scores = BTreeMap::new();
        let mut best: Option<(&CategorySignature, f64)> = None;

        for signature in self.taxonomy.iter() {
            let score = self.combined_score(signature, &description, &merchant, amount, profile);
            all_scores.insert(signature.name.clone(), round2(score));

            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    score > current_score
                        || (score == current_score && signature.weight > current.weight)
                }
            };
            if better {
                best = Some((signature, score));
            }
        }

        let (mut category, mut confidence) = match best {
            Some((signature, score)) => (signature.name.as_str(), score),
            None => (self.taxonomy.fallback(), self.config.fallback_confidence),
        };

        if confidence < self.config.fallback_threshold {
            debug!(
                best = category,
                score = confidence,
                "Best score below threshold, using fallback"
            );
            category = self.taxonomy.fallback();
            confidence = self.config.fallback_confidence;
        }

        let confidence = round2(confidence.clamp(0.0, 1.0));

        Ok(ClassificationResult {
            category: category.to_string(),
            confidence,
            reasoning: self.reasoning(category, &description, &merchant, amount),
            needs_confirmation: confidence < self.config.confirmation_threshold,
            all_scores,
            error: None,
        })
    }

    /// Tags whose keywords match partially typed text, best first
    pub fn suggestions(&self, partial_text: &str) -> Vec<CategorySuggestion> {
        let cleaned = self.normalizer.clean(partial_text);

        let mut suggestions: Vec<CategorySuggestion> = self
            .taxonomy
            .iter()
            .filter_map(|signature| {
                let relevance = text_score(&cleaned, &signature.keywords);
                (relevance > self.config.suggestion_min_relevance).then(|| CategorySuggestion {
                    category: signature.name.clone(),
                    relevance: round2(relevance),
                    sample_keywords: signature
                        .keywords
                        .iter()
                        .take(SAMPLE_KEYWORDS)
                        .cloned()
                        .collect(),
                })
            })
            .collect();

        suggestions.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        suggestions.truncate(self.config.suggestion_limit);
        suggestions
    }

    /// Check a correction before it is applied to a learning profile
    pub fn validate_correction(&self, correction: &Correction) -> Result<()> {
        if !self.taxonomy.contains(&correction.correct_category) {
            return Err(Error::MalformedInput(format!(
                "unknown category: {}",
                correction.correct_category
            )));
        }
        if !correction.amount.is_finite() {
            return Err(Error::MalformedInput(format!(
                "amount is not a finite number: {}",
                correction.amount
            )));
        }
        Ok(())
    }

    fn combined_score(
        &self,
        signature: &CategorySignature,
        description: &str,
        merchant: &str,
        amount: f64,
        profile: Option<&LearningProfile>,
    ) -> f64 {
        let c = &self.config;
        text_score(description, &signature.keywords) * c.text_weight
            + self.merchant_score(merchant, &signature.merchants) * c.merchant_weight
            + self.amount_score(amount, &signature.amount_ranges) * c.amount_weight
            + self.learning_score(&signature.name, profile) * c.learning_weight
    }

    fn merchant_score(&self, merchant: &str, known: &[String]) -> f64 {
        if merchant.is_empty() || known.is_empty() {
            return 0.0;
        }

        if known
            .iter()
            .any(|k| merchant.contains(k.as_str()) || k.contains(merchant))
        {
            return 1.0;
        }

        let tokens: Vec<&str> = merchant.split_whitespace().collect();
        let word_hit = known.iter().any(|k| {
            k.split_whitespace()
                .filter(|word| word.len() >= 3)
                .any(|word| tokens.contains(&word))
        });

        if word_hit {
            self.config.merchant_partial_score
        } else {
            0.0
        }
    }

    fn amount_score(&self, amount: f64, ranges: &[(f64, f64)]) -> f64 {
        let c = &self.config;
        if ranges.is_empty() {
            return c.amount_neutral_score;
        }

        if ranges
            .iter()
            .any(|&(min, max)| amount >= min && amount <= max)
        {
            return 1.0;
        }

        let near = |boundary: f64| (amount - boundary).abs() <= c.amount_near_tolerance * boundary;
        if ranges.iter().any(|&(min, max)| near(min) || near(max)) {
            c.amount_near_score
        } else {
            c.amount_far_score
        }
    }

    fn learning_score(&self, category: &str, profile: Option<&LearningProfile>) -> f64 {
        match profile.and_then(|p| p.get(category)) {
            None => self.config.learning_neutral_score,
            Some(stats) => {
                let scale = self.learning.frequency_scale.max(1.0);
                (f64::from(stats.frequency) / scale * stats.accuracy).clamp(0.0, 1.0)
            }
        }
    }

    fn reasoning(&self, category: &str, description: &str, merchant: &str, amount: f64) -> String {
        let Some(signature) = self.taxonomy.get(category) else {
            return "Based on pattern matching".to_string();
        };

        let mut reasons = Vec::new();

        let matched: Vec<&str> = signature
            .keywords
            .iter()
            .filter(|kw| description.contains(kw.as_str()))
            .take(REASONING_KEYWORDS)
            .map(String::as_str)
            .collect();
        if !matched.is_empty() {
            reasons.push(format!("Text contains: {}", matched.join(", ")));
        }

        if !merchant.is_empty() {
            if let Some(known) = signature
                .merchants
                .iter()
                .find(|m| merchant.contains(m.as_str()))
            {
                reasons.push(format!("Merchant: {}", known));
            }
        }

        if signature
            .amount_ranges
            .iter()
            .any(|&(min, max)| amount >= min && amount <= max)
        {
            reasons.push(format!("Amount ${:.2} matches typical range", amount));
        }

        if reasons.is_empty() {
            "Based on pattern matching".to_string()
        } else {
            reasons.join(" | ")
        }
    }
}

/// Keyword match ratio of a cleaned text, in [0, 1]
///
/// Exact word hits count double; a word that contains a keyword (or is
/// contained in one) counts once.
pub fn text_score(text: &str, keywords: &[String]) -> f64 {
    if text.is_empty() || keywords.is_empty() {
        return 0.0;
    }

    let mut words: Vec<&str> = text.split_whitespace().collect();
    words.sort_unstable();
    words.dedup();

    let mut keyword_set: Vec<&str> = keywords.iter().map(String::as_str).collect();
    keyword_set.sort_unstable();
    keyword_set.dedup();

    let exact = words.iter().filter(|w| keyword_set.contains(w)).count();
    let partial = words
        .iter()
        .filter(|w| keyword_set.iter().any(|k| k.contains(**w) || w.contains(k)))
        .count();

    let ratio = (exact * 2 + partial) as f64 / (keyword_set.len() * 2) as f64;
    ratio.min(1.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

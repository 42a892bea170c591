//! Financial intelligence engine
//!
//! [`FinanceEngine`] is the public surface. Each entry point runs the
//! internal `Result`-returning pipeline and, on error, logs it and returns
//! the documented safe default instead. Nothing here panics or propagates.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::classifier::CategoryClassifier;
use crate::config::EngineConfig;
use crate::detect::{diff_subscriptions, recurrence_keys, subscription_totals, SubscriptionDetector};
use crate::error::{Error, Result};
use crate::health::HealthScorer;
use crate::insights::{spending_patterns, subscription_insights};
use crate::learning::{LearningProfile, LearningStore};
use crate::models::{
    AlternativeOffer, CategorySuggestion, ClassificationResult, Correction, CorrectionEntry,
    HealthOutcome, LearnOutcome, SpendingPatterns, SubscriptionChanges, SubscriptionReport,
    TransactionRecord,
};
use crate::normalize::Normalizer;
use crate::store::FinanceStore;
use crate::taxonomy::{ServiceCatalog, Taxonomy};

const CATEGORIZE_FAILED: &str = "Categorization failed";
const DETECTION_FAILED: &str = "Subscription detection failed";
const CHANGES_FAILED: &str = "Unable to track subscription changes";
const PATTERNS_FAILED: &str = "Unable to analyze patterns";
const HEALTH_FAILED: &str = "Unable to calculate financial health score";

/// Spending pattern look-back when the caller does not pass one
pub const DEFAULT_PATTERN_DAYS: i64 = 30;

pub struct FinanceEngine {
    config: EngineConfig,
    classifier: CategoryClassifier,
    detector: SubscriptionDetector,
    scorer: HealthScorer,
    normalizer: Normalizer,
    store: Arc<dyn FinanceStore>,
    learning: Arc<dyn LearningStore>,
}

impl FinanceEngine {
    /// Load configuration, taxonomy and service signatures, then build the engine
    pub fn load(
        store: Arc<dyn FinanceStore>,
        learning: Arc<dyn LearningStore>,
        config_dir: Option<&Path>,
    ) -> Result<Self> {
        let config = EngineConfig::load(config_dir)?;
        let normalizer = Normalizer::new()?;
        let taxonomy = Taxonomy::load(&normalizer, config_dir)?;
        let catalog = ServiceCatalog::load(&normalizer, config_dir)?;

        info!(
            categories = taxonomy.len(),
            "Financial engine initialized"
        );
        Ok(Self::new(config, taxonomy, catalog, normalizer, store, learning))
    }

    /// Build the engine from the built-in configuration only
    pub fn embedded(
        store: Arc<dyn FinanceStore>,
        learning: Arc<dyn LearningStore>,
    ) -> Result<Self> {
        let normalizer = Normalizer::new()?;
        let taxonomy = Taxonomy::embedded(&normalizer)?;
        let catalog = ServiceCatalog::embedded(&normalizer)?;
        Ok(Self::new(
            EngineConfig::embedded()?,
            taxonomy,
            catalog,
            normalizer,
            store,
            learning,
        ))
    }

    pub fn new(
        config: EngineConfig,
        taxonomy: Taxonomy,
        catalog: ServiceCatalog,
        normalizer: Normalizer,
        store: Arc<dyn FinanceStore>,
        learning: Arc<dyn LearningStore>,
    ) -> Self {
        Self {
            classifier: CategoryClassifier::new(
                taxonomy,
                normalizer.clone(),
                config.classifier.clone(),
                config.learning.clone(),
            ),
            detector: SubscriptionDetector::new(
                catalog,
                normalizer.clone(),
                config.detection.clone(),
            ),
            scorer: HealthScorer::new(config.health.clone()),
            normalizer,
            config,
            store,
            learning,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.classifier.taxonomy()
    }

    // =========================================================================
    // Category classification
    // =========================================================================

    /// Categorize a transaction, applying the user's learning profile if any
    pub fn categorize(
        &self,
        description: &str,
        amount: f64,
        merchant: Option<&str>,
        user_id: Option<i64>,
    ) -> ClassificationResult {
        let profile = user_id.and_then(|id| self.profile_or_none(id));

        self.classifier
            .categorize(description, amount, merchant, profile.as_ref())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Categorization failed, using fallback");
                ClassificationResult {
                    category: self.classifier.taxonomy().fallback().to_string(),
                    confidence: self.config.classifier.fallback_confidence,
                    all_scores: Default::default(),
                    reasoning: String::new(),
                    needs_confirmation: true,
                    error: Some(CATEGORIZE_FAILED.to_string()),
                }
            })
    }

    /// Give every uncategorized transaction the classifier's best guess
    ///
    /// Returns how many transactions were assigned a category.
    pub fn assign_categories(&self, user_id: i64, transactions: &mut [TransactionRecord]) -> usize {
        let profile = self.profile_or_none(user_id);
        let mut assigned = 0;
        for tx in transactions.iter_mut().filter(|tx| tx.category.is_none()) {
            if let Some(category) = self.guess_category(tx, profile.as_ref()) {
                tx.category = Some(category);
                assigned += 1;
            }
        }
        debug!(user_id, assigned, "Assigned categories");
        assigned
    }

    fn guess_category(
        &self,
        tx: &TransactionRecord,
        profile: Option<&LearningProfile>,
    ) -> Option<String> {
        self.classifier
            .categorize(&tx.description, tx.amount, tx.merchant.as_deref(), profile)
            .map(|result| result.category)
            .ok()
    }

    pub fn get_category_suggestions(&self, partial_text: &str) -> Vec<CategorySuggestion> {
        self.classifier.suggestions(partial_text)
    }

    /// Record a user's correction of a predicted category
    pub fn learn_from_correction(&self, correction: &Correction) -> LearnOutcome {
        let result = self
            .classifier
            .validate_correction(correction)
            .and_then(|()| {
                self.learning
                    .record_correction(correction, &self.config.learning)
            });

        match result {
            Ok(_) => LearnOutcome {
                learned: true,
                message: format!(
                    "Learned: {} -> {}",
                    correction.original_category, correction.correct_category
                ),
                error: None,
            },
            Err(e) => {
                warn!(user_id = correction.user_id, error = %e, "Correction not applied");
                LearnOutcome {
                    learned: false,
                    message: "Correction was not applied".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// The user's correction log, oldest first
    pub fn corrections(&self, user_id: i64) -> Vec<CorrectionEntry> {
        self.learning.corrections(user_id).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Correction log unavailable");
            Vec::new()
        })
    }

    fn profile_or_none(&self, user_id: i64) -> Option<LearningProfile> {
        match self.learning.profile(user_id) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user_id, error = %e, "Learning profile unavailable, scoring neutral");
                None
            }
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Detect subscriptions over the last `window_days` days (default 90)
    pub fn detect_subscriptions(&self, user_id: i64, window_days: Option<i64>) -> SubscriptionReport {
        self.detect_subscriptions_as_of(user_id, window_days, today())
    }

    pub fn detect_subscriptions_as_of(
        &self,
        user_id: i64,
        window_days: Option<i64>,
        as_of: NaiveDate,
    ) -> SubscriptionReport {
        let days = window_days.unwrap_or(self.config.detection.default_window_days);
        self.try_detect(user_id, days, as_of).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Subscription detection failed");
            SubscriptionReport {
                error: Some(DETECTION_FAILED.to_string()),
                ..empty_report(days)
            }
        })
    }

    fn try_detect(&self, user_id: i64, days: i64, as_of: NaiveDate) -> Result<SubscriptionReport> {
        let since = window_start(as_of, days)?;
        let transactions = self.store.fetch_transactions_between(user_id, since, as_of)?;

        if transactions.is_empty() {
            debug!(user_id, "No expenses in detection window");
            return Ok(SubscriptionReport {
                message: Some("No expense data available for analysis".to_string()),
                ..empty_report(days)
            });
        }

        let subscriptions = self.detector.detect(&transactions);
        let (total_monthly_cost, total_annual_cost) = subscription_totals(&subscriptions);
        let insights =
            subscription_insights(&subscriptions, total_monthly_cost, &self.config.insights);

        info!(
            user_id,
            subscriptions = subscriptions.len(),
            total_monthly_cost,
            "Subscription detection complete"
        );

        Ok(SubscriptionReport {
            subscriptions,
            total_monthly_cost,
            total_annual_cost,
            insights,
            analysis_period: format!("{} days", days),
            detected_at: Utc::now(),
            message: None,
            error: None,
        })
    }

    /// Cheaper offers for a known service, optionally capped by cost
    pub fn get_alternative_services(
        &self,
        service_name: &str,
        max_cost: Option<f64>,
    ) -> Vec<AlternativeOffer> {
        self.detector.alternatives(service_name, max_cost)
    }

    /// Compare the last `days` days with the `days` days before them
    pub fn track_subscription_changes(&self, user_id: i64, days: Option<i64>) -> SubscriptionChanges {
        self.track_subscription_changes_as_of(user_id, days, today())
    }

    pub fn track_subscription_changes_as_of(
        &self,
        user_id: i64,
        days: Option<i64>,
        as_of: NaiveDate,
    ) -> SubscriptionChanges {
        let days = days.unwrap_or(self.config.detection.default_window_days);
        self.try_track_changes(user_id, days, as_of)
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Subscription change tracking failed");
                SubscriptionChanges {
                    new_subscriptions: Vec::new(),
                    cancelled_subscriptions: Vec::new(),
                    price_changes: Vec::new(),
                    analysis_period: format!("{} days", days),
                    analyzed_at: Utc::now(),
                    error: Some(CHANGES_FAILED.to_string()),
                }
            })
    }

    fn try_track_changes(
        &self,
        user_id: i64,
        days: i64,
        as_of: NaiveDate,
    ) -> Result<SubscriptionChanges> {
        let current_start = window_start(as_of, days)?;
        let previous_end = current_start - Duration::days(1);
        let previous_start = window_start(previous_end, days)?;

        let history = self.store.fetch_transactions_between(user_id, previous_start, as_of)?;
        let (previous_txs, current_txs): (Vec<_>, Vec<_>) = history
            .into_iter()
            .partition(|tx| tx.date < current_start);

        let previous = self.detector.detect(&previous_txs);
        let current = self.detector.detect(&current_txs);
        let keys = recurrence_keys(&self.normalizer, &current_txs);
        let diff = diff_subscriptions(&previous, &current, &keys);

        info!(
            user_id,
            new = diff.new_subscriptions.len(),
            cancelled = diff.cancelled_subscriptions.len(),
            price_changes = diff.price_changes.len(),
            "Subscription changes tracked"
        );

        Ok(SubscriptionChanges {
            new_subscriptions: diff.new_subscriptions,
            cancelled_subscriptions: diff.cancelled_subscriptions,
            price_changes: diff.price_changes,
            analysis_period: format!("{} days", days),
            analyzed_at: Utc::now(),
            error: None,
        })
    }

    // =========================================================================
    // Spending patterns
    // =========================================================================

    /// Per-category spending over the last `days` days (default 30)
    pub fn analyze_spending_patterns(&self, user_id: i64, days: Option<i64>) -> SpendingPatterns {
        self.analyze_spending_patterns_as_of(user_id, days, today())
    }

    pub fn analyze_spending_patterns_as_of(
        &self,
        user_id: i64,
        days: Option<i64>,
        as_of: NaiveDate,
    ) -> SpendingPatterns {
        let days = days.unwrap_or(DEFAULT_PATTERN_DAYS);
        self.try_patterns(user_id, days, as_of).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Spending pattern analysis failed");
            SpendingPatterns {
                error: Some(PATTERNS_FAILED.to_string()),
                ..Default::default()
            }
        })
    }

    fn try_patterns(&self, user_id: i64, days: i64, as_of: NaiveDate) -> Result<SpendingPatterns> {
        let since = window_start(as_of, days)?;
        let mut transactions = self.store.fetch_transactions_between(user_id, since, as_of)?;
        self.assign_categories(user_id, &mut transactions);

        Ok(spending_patterns(&transactions, &self.config.insights))
    }

    // =========================================================================
    // Financial health
    // =========================================================================

    pub fn calculate_health_score(&self, user_id: i64) -> HealthOutcome {
        self.calculate_health_score_as_of(user_id, today())
    }

    pub fn calculate_health_score_as_of(&self, user_id: i64, as_of: NaiveDate) -> HealthOutcome {
        let profile = self.profile_or_none(user_id);
        let categorize = |tx: &TransactionRecord| self.guess_category(tx, profile.as_ref());

        match self.scorer.score(self.store.as_ref(), &categorize, user_id, as_of) {
            Ok(report) => {
                info!(
                    user_id,
                    total_score = report.total_score,
                    level = %report.health_level,
                    "Financial health calculated"
                );
                HealthOutcome::Report(Box::new(report))
            }
            Err(e) => {
                warn!(user_id, error = %e, "Financial health calculation failed");
                HealthOutcome::Failed {
                    error: HEALTH_FAILED.to_string(),
                }
            }
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn window_start(as_of: NaiveDate, days: i64) -> Result<NaiveDate> {
    if days <= 0 {
        return Err(Error::MalformedInput(format!(
            "window must be at least one day (got {})",
            days
        )));
    }
    as_of
        .checked_sub_signed(Duration::days(days))
        .ok_or_else(|| Error::MalformedInput(format!("window of {} days is out of range", days)))
}

fn empty_report(days: i64) -> SubscriptionReport {
    SubscriptionReport {
        subscriptions: Vec::new(),
        total_monthly_cost: 0.0,
        total_annual_cost: 0.0,
        insights: Vec::new(),
        analysis_period: format!("{} days", days),
        detected_at: Utc::now(),
        message: None,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::MemoryLearningStore;
    use crate::models::{Budget, BudgetSpending, IncomeAggregate, TransactionRecord};

    /// Store that fails every fetch
    struct OfflineStore;

    impl FinanceStore for OfflineStore {
        fn fetch_transactions(&self, _: i64, _: NaiveDate) -> Result<Vec<TransactionRecord>> {
            Err(Error::DataUnavailable("no connection".to_string()))
        }
        fn fetch_budgets(&self, _: i64) -> Result<Vec<Budget>> {
            Err(Error::DataUnavailable("no connection".to_string()))
        }
        fn fetch_budget_spending(&self, _: i64) -> Result<BudgetSpending> {
            Err(Error::DataUnavailable("no connection".to_string()))
        }
        fn fetch_income_aggregate(&self, _: i64, _: NaiveDate, _: NaiveDate) -> Result<IncomeAggregate> {
            Err(Error::DataUnavailable("no connection".to_string()))
        }
    }

    fn engine() -> FinanceEngine {
        FinanceEngine::embedded(Arc::new(OfflineStore), Arc::new(MemoryLearningStore::new())).unwrap()
    }

    fn correction(correct: &str) -> Correction {
        Correction {
            user_id: 3,
            original_description: "Blue Bottle".to_string(),
            original_category: "Shopping".to_string(),
            correct_category: correct.to_string(),
            amount: 6.5,
            merchant: Some("Blue Bottle Coffee".to_string()),
        }
    }

    #[test]
    fn test_categorize_bad_amount_returns_default_payload() {
        let result = engine().categorize("coffee", f64::INFINITY, None, Some(1));
        assert_eq!(result.category, "Other");
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.error.as_deref(), Some("Categorization failed"));
    }

    #[test]
    fn test_learning_changes_later_predictions() {
        let engine = engine();
        let before = engine.categorize("Blue Bottle", 6.5, None, Some(3));

        for _ in 0..10 {
            assert!(engine.learn_from_correction(&correction("Food")).learned);
        }
        let after = engine.categorize("Blue Bottle", 6.5, None, Some(3));

        assert!(after.all_scores["Food"] > before.all_scores["Food"]);
        assert_eq!(engine.corrections(3).len(), 10);
        // Other users are unaffected
        assert_eq!(
            engine.categorize("Blue Bottle", 6.5, None, Some(4)).all_scores,
            before.all_scores
        );
    }

    #[test]
    fn test_learning_rejects_unknown_category() {
        let engine = engine();
        let outcome = engine.learn_from_correction(&correction("Snacks"));
        assert!(!outcome.learned);
        assert!(outcome.error.is_some());
        assert!(engine.corrections(3).is_empty());
    }

    #[test]
    fn test_offline_store_degrades_gracefully() {
        let engine = engine();
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        let report = engine.detect_subscriptions_as_of(1, None, as_of);
        assert_eq!(report.error.as_deref(), Some("Subscription detection failed"));
        assert!(report.subscriptions.is_empty());
        assert_eq!(report.analysis_period, "90 days");

        let changes = engine.track_subscription_changes_as_of(1, Some(30), as_of);
        assert_eq!(changes.error.as_deref(), Some("Unable to track subscription changes"));

        let patterns = engine.analyze_spending_patterns_as_of(1, None, as_of);
        assert_eq!(patterns.error.as_deref(), Some("Unable to analyze patterns"));

        // Every component degrades on its own; the report itself still exists
        let health = engine.calculate_health_score_as_of(1, as_of);
        let report = health.report().unwrap();
        assert_eq!(report.components.savings_rate.score, 0.0);
        assert_eq!(report.components.emergency_fund.score, 0.0);
    }

    #[test]
    fn test_invalid_window_is_reported() {
        let engine = engine();
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let report = engine.detect_subscriptions_as_of(1, Some(0), as_of);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_alternatives_unknown_service() {
        assert!(engine().get_alternative_services("nope", None).is_empty());
        assert_eq!(engine().get_alternative_services("spotify", Some(100.0)).len(), 3);
    }

    #[test]
    fn test_embedded_engine_uses_built_in_tables() {
        let engine = engine();
        assert_eq!(engine.taxonomy().len(), 8);
        assert_eq!(engine.config().classifier.fallback_threshold, 0.3);
    }

    #[test]
    fn test_assign_categories_fills_only_missing() {
        let engine = engine();
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let tx = |id: i64, description: &str, category: Option<&str>| TransactionRecord {
            id,
            user_id: 1,
            date: day,
            description: description.to_string(),
            merchant: Some(description.to_string()),
            amount: 12.5,
            category: category.map(String::from),
        };
        let mut txs = vec![tx(1, "McDonald's", None), tx(2, "McDonald's", Some("Bills"))];

        assert_eq!(engine.assign_categories(1, &mut txs), 1);
        assert_eq!(txs[0].category.as_deref(), Some("Food"));
        assert_eq!(txs[1].category.as_deref(), Some("Bills"));
    }
}

//! Per-user learning from category corrections
//!
//! A [`LearningProfile`] maps category → {frequency, accuracy}. It changes
//! only through [`LearningProfile::apply_correction`], and stores must run that
//! read-modify-write under per-user mutual exclusion:
//! - [`MemoryLearningStore`] holds one mutex per user
//! - [`crate::db::Database`] runs the update in an immediate SQLite transaction

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LearningConfig;
use crate::error::{Error, Result};
use crate::models::{Correction, CorrectionEntry};

/// What a user's corrections say about one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Times the user corrected a transaction into this category
    pub frequency: u32,
    /// How much predictions of this category can be trusted, in [0, 1]
    pub accuracy: f64,
}

/// Learned category statistics for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub categories: BTreeMap<String, CategoryStats>,
}

impl LearningProfile {
    pub fn get(&self, category: &str) -> Option<&CategoryStats> {
        self.categories.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn entry(&mut self, category: &str, config: &LearningConfig) -> &mut CategoryStats {
        self.categories
            .entry(category.to_string())
            .or_insert(CategoryStats {
                frequency: 0,
                accuracy: config.default_accuracy,
            })
    }

    /// Apply one correction
    ///
    /// The corrected category's frequency always grows by one. When the
    /// prediction was wrong, the predicted category's accuracy decays and the
    /// corrected category's accuracy is boosted (capped at 1.0).
    pub fn apply_correction(&mut self, original: &str, correct: &str, config: &LearningConfig) {
        {
            let stats = self.entry(correct, config);
            stats.frequency = stats.frequency.saturating_add(1);
        }

        if original != correct {
            let stats = self.entry(original, config);
            stats.accuracy = (stats.accuracy * config.decay).clamp(0.0, 1.0);

            let stats = self.entry(correct, config);
            stats.accuracy = (stats.accuracy * config.boost).clamp(0.0, 1.0);
        }
    }
}

/// Storage for learning profiles and the correction log
pub trait LearningStore: Send + Sync {
    /// Current profile for a user (empty if the user never corrected anything)
    fn profile(&self, user_id: i64) -> Result<LearningProfile>;

    /// Atomically apply a correction and append it to the log
    fn record_correction(
        &self,
        correction: &Correction,
        config: &LearningConfig,
    ) -> Result<LearningProfile>;

    /// Correction log for a user, oldest first
    fn corrections(&self, user_id: i64) -> Result<Vec<CorrectionEntry>>;
}

#[derive(Debug, Default)]
struct UserLearning {
    profile: LearningProfile,
    log: Vec<CorrectionEntry>,
}

/// In-process learning store with one lock per user
#[derive(Debug, Default)]
pub struct MemoryLearningStore {
    users: Mutex<HashMap<i64, Arc<Mutex<UserLearning>>>>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock for a user, created on first write
    fn user_for_write(&self, user_id: i64) -> Result<Arc<Mutex<UserLearning>>> {
        let mut users = lock(&self.users)?;
        Ok(users.entry(user_id).or_default().clone())
    }

    /// Lock for a user who has corrected something before
    fn existing_user(&self, user_id: i64) -> Result<Option<Arc<Mutex<UserLearning>>>> {
        let users = lock(&self.users)?;
        Ok(users.get(&user_id).cloned())
    }

    /// Number of users with learning state
    pub fn user_count(&self) -> Result<usize> {
        Ok(lock(&self.users)?.len())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::DataUnavailable("learning store lock poisoned".to_string()))
}

impl LearningStore for MemoryLearningStore {
    fn profile(&self, user_id: i64) -> Result<LearningProfile> {
        let Some(user) = self.existing_user(user_id)? else {
            return Ok(LearningProfile::default());
        };
        let guard = lock(&user)?;
        Ok(guard.profile.clone())
    }

    fn record_correction(
        &self,
        correction: &Correction,
        config: &LearningConfig,
    ) -> Result<LearningProfile> {
        let user = self.user_for_write(correction.user_id)?;
        let mut guard = lock(&user)?;

        guard.profile.apply_correction(
            &correction.original_category,
            &correction.correct_category,
            config,
        );
        guard.log.push(CorrectionEntry {
            original_description: correction.original_description.clone(),
            original_category: correction.original_category.clone(),
            correct_category: correction.correct_category.clone(),
            amount: correction.amount,
            merchant: correction.merchant.clone(),
            timestamp: Utc::now(),
        });

        info!(
            user_id = correction.user_id,
            "Learned from user correction: {} -> {}",
            correction.original_category,
            correction.correct_category
        );

        Ok(guard.profile.clone())
    }

    fn corrections(&self, user_id: i64) -> Result<Vec<CorrectionEntry>> {
        let Some(user) = self.existing_user(user_id)? else {
            return Ok(Vec::new());
        };
        let guard = lock(&user)?;
        Ok(guard.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn correction(user_id: i64, original: &str, correct: &str) -> Correction {
        Correction {
            user_id,
            original_description: "UBER EATS 1234".to_string(),
            original_category: original.to_string(),
            correct_category: correct.to_string(),
            amount: 23.5,
            merchant: Some("Uber Eats".to_string()),
        }
    }

    #[test]
    fn test_apply_correction_updates_both_categories() {
        let config = LearningConfig::default();
        let mut profile = LearningProfile::default();

        profile.apply_correction("Transportation", "Food", &config);

        let food = profile.get("Food").unwrap();
        assert_eq!(food.frequency, 1);
        assert!((food.accuracy - 0.55).abs() < 1e-9);

        let transport = profile.get("Transportation").unwrap();
        assert_eq!(transport.frequency, 0);
        assert!((transport.accuracy - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_confirming_correction_only_counts() {
        let config = LearningConfig::default();
        let mut profile = LearningProfile::default();

        profile.apply_correction("Food", "Food", &config);

        let food = profile.get("Food").unwrap();
        assert_eq!(food.frequency, 1);
        assert_eq!(food.accuracy, 0.5);
        assert_eq!(profile.categories.len(), 1);
    }

    #[test]
    fn test_accuracy_is_capped() {
        let config = LearningConfig::default();
        let mut profile = LearningProfile::default();

        for _ in 0..50 {
            profile.apply_correction("Shopping", "Food", &config);
        }

        let food = profile.get("Food").unwrap();
        assert_eq!(food.frequency, 50);
        assert!(food.accuracy <= 1.0);
        assert!(profile.get("Shopping").unwrap().accuracy >= 0.0);
    }

    #[test]
    fn test_frequency_is_monotonic() {
        let config = LearningConfig::default();
        let mut profile = LearningProfile::default();
        let mut last = 0;

        for original in ["Food", "Bills", "Food", "Shopping", "Food"] {
            profile.apply_correction(original, "Food", &config);
            let now = profile.get("Food").unwrap().frequency;
            assert!(now > last);
            last = now;
        }
    }

    #[test]
    fn test_memory_store_keeps_log_in_order() {
        let store = MemoryLearningStore::new();
        let config = LearningConfig::default();

        store
            .record_correction(&correction(1, "Transportation", "Food"), &config)
            .unwrap();
        store
            .record_correction(&correction(1, "Food", "Shopping"), &config)
            .unwrap();

        let log = store.corrections(1).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].correct_category, "Food");
        assert_eq!(log[1].correct_category, "Shopping");

        // Other users are untouched
        assert!(store.profile(2).unwrap().is_empty());
        assert!(store.corrections(2).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_reads_do_not_add_users() {
        let store = MemoryLearningStore::new();
        for user_id in 0..100 {
            assert!(store.profile(user_id).unwrap().is_empty());
            assert!(store.corrections(user_id).unwrap().is_empty());
        }
        assert_eq!(store.user_count().unwrap(), 0);

        store
            .record_correction(&correction(5, "Shopping", "Food"), &LearningConfig::default())
            .unwrap();
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[test]
    fn test_memory_store_serializes_concurrent_corrections() {
        let store = Arc::new(MemoryLearningStore::new());
        let config = LearningConfig::default();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let config = config.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .record_correction(&correction(7, "Food", "Food"), &config)
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let profile = store.profile(7).unwrap();
        assert_eq!(profile.get("Food").unwrap().frequency, 200);
        assert_eq!(store.corrections(7).unwrap().len(), 200);
    }
}

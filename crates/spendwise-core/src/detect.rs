//! Recurring charge detection
//!
//! Detects subscriptions in a user's expense history:
//! - Grouping: charges are grouped under a normalized recurrence key
//! - Filtering: a group must repeat, keep a stable amount, and either land on
//!   the same days of the month or name a known service
//! - Analysis: the surviving groups are matched against known service
//!   signatures, given a billing frequency, a monthly cost and a confidence
//!
//! Change tracking compares two consecutive windows of detection results.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::classifier::round2;
use crate::config::DetectionConfig;
use crate::models::{
    AlternativeOffer, ChargeSample, Frequency, PriceChange, SubscriptionRecord, TransactionRecord,
};
use crate::normalize::Normalizer;
use crate::taxonomy::{ServiceCatalog, ServiceSignature};

/// Service name given to candidates that match no signature
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Category given to candidates that match no signature
const UNKNOWN_CATEGORY: &str = "Other";

/// (minimum occurrences, confidence bonus), checked in order
const OCCURRENCE_BONUS: &[(usize, f64)] = &[(6, 0.3), (4, 0.2), (3, 0.1)];

/// Price moves smaller than this are rounding noise
const PRICE_CHANGE_EPSILON: f64 = 0.01;

/// Charges sharing one recurrence key
///
/// Lives only for the duration of one detection call.
#[derive(Debug, Clone)]
pub struct RecurringSeries {
    pub key: String,
    /// Member charges, oldest first
    pub transactions: Vec<TransactionRecord>,
    pub mean_amount: f64,
    /// Population standard deviation of the amounts
    pub std_dev: f64,
    /// Day of month → number of charges on that day
    pub days_of_month: BTreeMap<u32, usize>,
}

impl RecurringSeries {
    fn new(key: String, mut transactions: Vec<TransactionRecord>) -> Self {
        transactions.sort_by_key(|tx| tx.date);

        let amounts: Vec<f64> = transactions.iter().map(|tx| tx.amount).collect();
        let (mean_amount, std_dev) = mean_and_std_dev(&amounts);

        let mut days_of_month = BTreeMap::new();
        for tx in &transactions {
            *days_of_month.entry(tx.date.day()).or_insert(0) += 1;
        }

        Self {
            key,
            transactions,
            mean_amount,
            std_dev,
            days_of_month,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Coefficient of variation of the amounts (stddev / mean)
    pub fn amount_cv(&self) -> f64 {
        if self.mean_amount > 0.0 {
            self.std_dev / self.mean_amount
        } else {
            0.0
        }
    }

    /// Days of month that saw at least two charges
    pub fn common_days(&self) -> usize {
        self.days_of_month.values().filter(|&&n| n >= 2).count()
    }

    /// Sorted charge dates
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.transactions.iter().map(|tx| tx.date).collect()
    }

    /// Most recent member charge
    pub fn latest(&self) -> Option<&TransactionRecord> {
        self.transactions.last()
    }
}

/// Group expense charges by recurrence key
///
/// Refunds, zero amounts and descriptions that normalize to nothing are
/// skipped. Groups come back in key order.
pub fn group_recurring(
    normalizer: &Normalizer,
    transactions: &[TransactionRecord],
) -> Vec<RecurringSeries> {
    let mut groups: BTreeMap<String, Vec<TransactionRecord>> = BTreeMap::new();

    for tx in transactions {
        if !tx.amount.is_finite() || tx.amount <= 0.0 {
            continue;
        }
        let key = normalizer.recurrence_key(&tx.description);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(tx.clone());
    }

    groups
        .into_iter()
        .map(|(key, members)| RecurringSeries::new(key, members))
        .collect()
}

/// Turns expense history into subscription records
pub struct SubscriptionDetector {
    catalog: ServiceCatalog,
    normalizer: Normalizer,
    config: DetectionConfig,
}

impl SubscriptionDetector {
    pub fn new(catalog: ServiceCatalog, normalizer: Normalizer, config: DetectionConfig) -> Self {
        Self {
            catalog,
            normalizer,
            config,
        }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Detect subscriptions among the given charges
    pub fn detect(&self, transactions: &[TransactionRecord]) -> Vec<SubscriptionRecord> {
        let series = group_recurring(&self.normalizer, transactions);
        debug!(groups = series.len(), "Grouped charges by recurrence key");

        let records: Vec<SubscriptionRecord> = series
            .iter()
            .filter(|s| self.is_candidate(s))
            .filter_map(|s| self.analyze(s))
            .collect();

        debug!(subscriptions = records.len(), "Subscription detection finished");
        records
    }

    /// Whether a group looks like a recurring charge
    pub fn is_candidate(&self, series: &RecurringSeries) -> bool {
        if series.len() < self.config.min_occurrences {
            return false;
        }

        if series.amount_cv() > self.config.max_amount_cv {
            debug!(key = %series.key, cv = series.amount_cv(), "Amounts too variable");
            return false;
        }

        series.common_days() >= self.config.min_common_days || self.names_known_service(&series.key)
    }

    fn names_known_service(&self, key: &str) -> bool {
        self.catalog.iter().any(|service| {
            key.contains(&service.name.replace('_', " "))
                || service.keywords.iter().any(|kw| key.contains(kw.as_str()))
        })
    }

    /// Best-matching known service for a group
    ///
    /// +2 per keyword found in the key, +1 per typical amount within tolerance
    /// of the most recent charge. Ties keep the earlier signature.
    pub fn identify_service(&self, series: &RecurringSeries) -> Option<&ServiceSignature> {
        let amount = series.latest().map(|tx| tx.amount)?;
        let tolerance = self.config.amount_match_tolerance;

        let mut best: Option<(&ServiceSignature, u32)> = None;
        for service in self.catalog.iter() {
            let keyword_hits = service
                .keywords
                .iter()
                .filter(|kw| series.key.contains(kw.as_str()))
                .count() as u32;
            let amount_hits = service
                .typical_amounts
                .iter()
                .filter(|&&typical| (amount - typical).abs() <= typical * tolerance)
                .count() as u32;

            let score = keyword_hits * 2 + amount_hits;
            if score > 0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((service, score));
            }
        }

        best.map(|(service, _)| service)
    }

    /// Billing frequency from the average gap between sorted charge dates
    pub fn infer_frequency(&self, dates: &[NaiveDate]) -> Frequency {
        if dates.len() < self.config.min_occurrences.max(2) {
            return Frequency::Unknown;
        }

        let intervals: Vec<i64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();
        if intervals.is_empty() {
            return Frequency::Unknown;
        }
        let avg_interval = intervals.iter().sum::<i64>() as f64 / intervals.len() as f64;

        let within = |[lo, hi]: [f64; 2]| avg_interval >= lo && avg_interval <= hi;
        if within(self.config.monthly_days) {
            Frequency::Monthly
        } else if within(self.config.quarterly_days) {
            Frequency::Quarterly
        } else if within(self.config.yearly_days) {
            Frequency::Yearly
        } else {
            Frequency::Irregular
        }
    }

    /// Build the subscription record for a candidate group
    pub fn analyze(&self, series: &RecurringSeries) -> Option<SubscriptionRecord> {
        let dates = series.dates();
        let first_charge = *dates.first()?;
        let last_charge = *dates.last()?;

        let service = self.identify_service(series);
        let frequency = self.infer_frequency(&dates);

        let amounts: Vec<f64> = series.transactions.iter().map(|tx| tx.amount).collect();
        let most_common = most_common_amount(&amounts);

        let monthly_cost = match frequency {
            Frequency::Monthly => most_common,
            Frequency::Yearly => most_common / 12.0,
            _ => series.mean_amount,
        };

        let recent_charges = series
            .transactions
            .iter()
            .rev()
            .take(self.config.recent_charge_samples)
            .map(|tx| ChargeSample {
                date: tx.date,
                description: tx.description.clone(),
                amount: tx.amount,
            })
            .collect();

        Some(SubscriptionRecord {
            service_name: service
                .map(|s| s.name.clone())
                .unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
            description_key: series.key.clone(),
            frequency,
            expected_frequency: service.map(|s| s.frequency),
            monthly_cost: round2(monthly_cost),
            annual_cost: round2(monthly_cost * 12.0),
            occurrences: series.len(),
            average_amount: round2(series.mean_amount),
            most_common_amount: round2(most_common),
            category: service
                .map(|s| s.category.clone())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            confidence: self.confidence(series.len(), service.is_some()),
            first_charge,
            last_charge,
            recent_charges,
        })
    }

    /// Detection confidence in [0, 1]
    pub fn confidence(&self, occurrences: usize, known_service: bool) -> f64 {
        if !known_service {
            return self.config.unknown_service_confidence.clamp(0.0, 1.0);
        }

        let occurrence_bonus = OCCURRENCE_BONUS
            .iter()
            .find(|(min, _)| occurrences >= *min)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0);

        round2(
            (self.config.base_confidence + occurrence_bonus + self.config.known_service_bonus)
                .clamp(0.0, 1.0),
        )
    }

    /// Cheaper offers for a known service, cheapest first
    pub fn alternatives(&self, service_name: &str, max_cost: Option<f64>) -> Vec<AlternativeOffer> {
        let mut offers: Vec<AlternativeOffer> = self
            .catalog
            .alternatives_for(service_name)
            .iter()
            .filter(|offer| max_cost.map_or(true, |max| offer.cost <= max))
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        offers
    }
}

/// Sum of monthly costs for monthly and yearly subscriptions, and that sum × 12
pub fn subscription_totals(records: &[SubscriptionRecord]) -> (f64, f64) {
    let monthly: f64 = records
        .iter()
        .filter(|r| matches!(r.frequency, Frequency::Monthly | Frequency::Yearly))
        .map(|r| r.monthly_cost)
        .sum();
    (round2(monthly), round2(monthly * 12.0))
}

/// What changed between two detection windows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionDiff {
    pub new_subscriptions: Vec<SubscriptionRecord>,
    pub cancelled_subscriptions: Vec<SubscriptionRecord>,
    pub price_changes: Vec<PriceChange>,
}

/// Compare the subscriptions of a previous window with the current one
///
/// `current_keys` holds every recurrence key charged in the current window,
/// detected as a subscription or not. A previous subscription is cancelled
/// only when its key was not charged at all.
pub fn diff_subscriptions(
    previous: &[SubscriptionRecord],
    current: &[SubscriptionRecord],
    current_keys: &BTreeSet<String>,
) -> SubscriptionDiff {
    let previous_by_key: BTreeMap<&str, &SubscriptionRecord> = previous
        .iter()
        .map(|r| (r.description_key.as_str(), r))
        .collect();

    let mut diff = SubscriptionDiff::default();

    for record in current {
        match previous_by_key.get(record.description_key.as_str()) {
            None => diff.new_subscriptions.push(record.clone()),
            Some(before) => {
                let delta = record.most_common_amount - before.most_common_amount;
                if delta.abs() > PRICE_CHANGE_EPSILON {
                    let change_percent = if before.most_common_amount > 0.0 {
                        round2(delta / before.most_common_amount * 100.0)
                    } else {
                        0.0
                    };
                    diff.price_changes.push(PriceChange {
                        service_name: record.service_name.clone(),
                        description_key: record.description_key.clone(),
                        previous_amount: before.most_common_amount,
                        current_amount: record.most_common_amount,
                        change_percent,
                    });
                }
            }
        }
    }

    for record in previous {
        if !current_keys.contains(&record.description_key) {
            diff.cancelled_subscriptions.push(record.clone());
        }
    }

    diff
}

/// Recurrence keys of every charge in a set
pub fn recurrence_keys(normalizer: &Normalizer, transactions: &[TransactionRecord]) -> BTreeSet<String> {
    transactions
        .iter()
        .map(|tx| normalizer.recurrence_key(&tx.description))
        .filter(|key| !key.is_empty())
        .collect()
}

/// Mean and population standard deviation
pub(crate) fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Mode of the amounts, compared in cents; ties go to the larger amount
fn most_common_amount(amounts: &[f64]) -> f64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for amount in amounts {
        *counts.entry((amount * 100.0).round() as i64).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by_key(|&(cents, count)| (count, cents))
        .map(|(cents, _)| cents as f64 / 100.0)
        .unwrap_or(0.0)
}

//! Domain models for Spendwise
//!
//! Records supplied by the external store, and the plain result structures
//! the engine hands back. Every result type serializes to JSON made only of
//! primitives, maps and sequences.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Records supplied by collaborators
// =============================================================================

/// An expense transaction as fetched from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: Option<String>,
    /// Positive for money spent
    pub amount: f64,
    pub category: Option<String>,
}

/// A transaction about to be stored
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: Option<String>,
    pub amount: f64,
    pub category: Option<String>,
    pub import_hash: String,
}

/// An income entry about to be stored
#[derive(Debug, Clone)]
pub struct NewIncome {
    pub user_id: i64,
    pub date: NaiveDate,
    pub source: String,
    pub amount: f64,
    pub import_hash: String,
}

/// Income totals for a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeAggregate {
    pub total_income: f64,
    pub by_source: BTreeMap<String, f64>,
}

/// A spending budget for one category over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    pub amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DatePeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// How much of a budget has been spent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSpending {
    pub budget_id: i64,
    pub amount: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage_used: f64,
    pub category: String,
    pub period: DatePeriod,
}

// =============================================================================
// Classification
// =============================================================================

/// Result of categorizing one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub confidence: f64,
    /// Combined score per taxonomy tag
    #[serde(default)]
    pub all_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub reasoning: String,
    pub needs_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A category proposed for partially typed text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub category: String,
    pub relevance: f64,
    pub sample_keywords: Vec<String>,
}

/// A user's correction of a predicted category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub user_id: i64,
    pub original_description: String,
    pub original_category: String,
    pub correct_category: String,
    pub amount: f64,
    pub merchant: Option<String>,
}

/// An entry of the append-only correction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub original_description: String,
    pub original_category: String,
    pub correct_category: String,
    pub amount: f64,
    pub merchant: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement returned by the learning entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnOutcome {
    pub learned: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Billing cadence of a recurring charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Yearly,
    Irregular,
    Unknown,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Irregular => "irregular",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" => Ok(Self::Yearly),
            "irregular" => Ok(Self::Irregular),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One charge kept as evidence on a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeSample {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
}

/// A detected recurring charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Matched service signature name, or `unknown`
    pub service_name: String,
    /// Normalized description the charges were grouped under
    pub description_key: String,
    pub frequency: Frequency,
    /// Cadence the matched signature bills at, if any
    pub expected_frequency: Option<Frequency>,
    pub monthly_cost: f64,
    pub annual_cost: f64,
    pub occurrences: usize,
    pub average_amount: f64,
    pub most_common_amount: f64,
    pub category: String,
    pub confidence: f64,
    pub first_charge: NaiveDate,
    pub last_charge: NaiveDate,
    pub recent_charges: Vec<ChargeSample>,
}

/// Urgency of an insight or recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Numeric rank for sorting (higher = more urgent)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of subscription insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    CostWarning,
    ExpensiveSubscription,
    UnusedSubscriptions,
    DuplicateServices,
    Optimization,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostWarning => "cost_warning",
            Self::ExpensiveSubscription => "expensive_subscription",
            Self::UnusedSubscriptions => "unused_subscriptions",
            Self::DuplicateServices => "duplicate_services",
            Self::Optimization => "optimization",
        }
    }
}

/// A warning or recommendation derived from detected subscriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInsight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

/// Output of subscription detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionReport {
    pub subscriptions: Vec<SubscriptionRecord>,
    pub total_monthly_cost: f64,
    pub total_annual_cost: f64,
    pub insights: Vec<SubscriptionInsight>,
    pub analysis_period: String,
    pub detected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An offer that could replace a detected service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeOffer {
    pub name: String,
    pub cost: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// A service whose price moved between two detection windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub service_name: String,
    pub description_key: String,
    pub previous_amount: f64,
    pub current_amount: f64,
    pub change_percent: f64,
}

/// Differences between the current and the preceding detection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionChanges {
    pub new_subscriptions: Vec<SubscriptionRecord>,
    pub cancelled_subscriptions: Vec<SubscriptionRecord>,
    pub price_changes: Vec<PriceChange>,
    pub analysis_period: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Spending patterns
// =============================================================================

/// Totals for one category within an analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub count: usize,
    pub total: f64,
    pub avg_amount: f64,
}

/// Per-category breakdown of a user's recent spending
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpendingPatterns {
    pub total_categories: usize,
    pub total_spending: f64,
    pub category_breakdown: Vec<CategorySpending>,
    pub most_spent_category: Option<String>,
    pub most_frequent_category: Option<String>,
    pub average_transaction_size: f64,
    pub insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Financial health
// =============================================================================

/// Qualitative tier of a composite health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }

    /// Display color for UIs
    pub fn color(&self) -> &'static str {
        match self {
            Self::Excellent => "#10B981",
            Self::Good => "#3B82F6",
            Self::Fair => "#F59E0B",
            Self::Poor => "#EF4444",
        }
    }
}

impl std::fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialEq<&str> for HealthLevel {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// One weighted health component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub score: f64,
    pub weight: f64,
    pub label: String,
    /// Score rests on an estimate rather than tracked data
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub provisional: bool,
}

/// The five health components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthComponents {
    pub savings_rate: ComponentScore,
    pub budget_adherence: ComponentScore,
    pub income_stability: ComponentScore,
    pub expense_control: ComponentScore,
    pub emergency_fund: ComponentScore,
}

impl HealthComponents {
    pub fn iter(&self) -> impl Iterator<Item = &ComponentScore> {
        [
            &self.savings_rate,
            &self.budget_adherence,
            &self.income_stability,
            &self.expense_control,
            &self.emergency_fund,
        ]
        .into_iter()
    }
}

/// Area a health recommendation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Savings,
    Budget,
    Income,
    Expenses,
    Emergency,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Savings => "savings",
            Self::Budget => "budget",
            Self::Income => "income",
            Self::Expenses => "expenses",
            Self::Emergency => "emergency",
        }
    }
}

/// An actionable step for improving a weak component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: String,
}

/// Composite financial health score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total_score: f64,
    pub health_level: HealthLevel,
    pub color: String,
    pub components: HealthComponents,
    pub recommendations: Vec<Recommendation>,
    pub calculated_at: DateTime<Utc>,
}

/// What the health entry point returns: a report, or a safe error payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthOutcome {
    Report(Box<HealthReport>),
    Failed { error: String },
}

impl HealthOutcome {
    pub fn report(&self) -> Option<&HealthReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }
}

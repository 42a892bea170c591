//! Engine configuration
//!
//! All thresholds used by the classifier, the subscription detector and the
//! health scorer are collected in [`EngineConfig`] so tests and tuning target
//! a single surface.
//!
//! ## Configuration Resolution
//!
//! Each config file is loaded with a three-layer resolution:
//! 1. An explicit config directory (e.g. `--config-dir`)
//! 2. Override in data dir (~/.local/share/spendwise/config/<file>)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default thresholds (compiled into binary)
const DEFAULT_ENGINE_CONFIG: &str = include_str!("../../../config/engine.toml");

pub const ENGINE_CONFIG_FILE: &str = "engine.toml";
pub const TAXONOMY_FILE: &str = "taxonomy.toml";
pub const SERVICES_FILE: &str = "services.toml";

const WEIGHT_EPSILON: f64 = 1e-6;

/// Get the default override directory for config files
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendwise").join("config"))
}

/// Read a config file by name, falling back to the embedded copy
pub(crate) fn read_config_file(
    file_name: &str,
    config_dir: Option<&Path>,
    embedded: &'static str,
) -> Result<String> {
    let candidates = config_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(default_config_dir());

    for dir in candidates {
        let path = dir.join(file_name);
        if path.exists() {
            debug!(path = %path.display(), "Loading config override");
            return fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            });
        }
    }

    Ok(embedded.to_string())
}

/// Complete thresholds table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub learning: LearningConfig,
    pub detection: DetectionConfig,
    pub insights: InsightConfig,
    pub health: HealthConfig,
}

impl EngineConfig {
    /// Load thresholds from the config directory chain
    pub fn load(config_dir: Option<&Path>) -> Result<Self> {
        let content = read_config_file(ENGINE_CONFIG_FILE, config_dir, DEFAULT_ENGINE_CONFIG)?;
        Self::from_toml(&content)
    }

    /// The thresholds built into the crate, ignoring override files
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_ENGINE_CONFIG)
    }

    /// Parse and validate thresholds from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the scoring code relies on
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        let signal_sum = c.text_weight + c.merchant_weight + c.amount_weight + c.learning_weight;
        if (signal_sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(Error::Config(format!(
                "classifier signal weights must sum to 1.0 (got {:.4})",
                signal_sum
            )));
        }

        let health_sum = self.health.weights.sum();
        if (health_sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(Error::Config(format!(
                "health weights must sum to 1.0 (got {:.4})",
                health_sum
            )));
        }

        let t = &self.health.tiers;
        if !(t.excellent > t.good && t.good > t.fair) {
            return Err(Error::Config(
                "health tier cutoffs must be strictly descending".to_string(),
            ));
        }

        let b = &self.health.bands;
        check_band_order("health.bands.savings_rate", &b.savings_rate, BandOrder::Descending)?;
        check_band_order("health.bands.income_cv", &b.income_cv, BandOrder::Ascending)?;
        check_band_order("health.bands.expense_growth", &b.expense_growth, BandOrder::Ascending)?;
        check_band_order("health.bands.emergency_ratio", &b.emergency_ratio, BandOrder::Descending)?;

        if self.detection.min_occurrences < 2 {
            return Err(Error::Config(
                "detection.min_occurrences must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandOrder {
    Ascending,
    Descending,
}

/// Bands are matched first-hit, so their limits must be strictly ordered
fn check_band_order(name: &str, bands: &[Band], order: BandOrder) -> Result<()> {
    let ordered = bands.windows(2).all(|w| match order {
        BandOrder::Ascending => w[0].limit < w[1].limit,
        BandOrder::Descending => w[0].limit > w[1].limit,
    });
    if ordered {
        return Ok(());
    }

    let direction = match order {
        BandOrder::Ascending => "ascending",
        BandOrder::Descending => "descending",
    };
    Err(Error::Config(format!(
        "{} limits must be strictly {}",
        name, direction
    )))
}

/// Category classifier thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub text_weight: f64,
    pub merchant_weight: f64,
    pub amount_weight: f64,
    pub learning_weight: f64,
    pub fallback_threshold: f64,
    pub fallback_confidence: f64,
    pub confirmation_threshold: f64,
    pub merchant_partial_score: f64,
    pub amount_near_score: f64,
    pub amount_far_score: f64,
    pub amount_neutral_score: f64,
    pub amount_near_tolerance: f64,
    pub learning_neutral_score: f64,
    pub suggestion_min_relevance: f64,
    pub suggestion_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            text_weight: 0.4,
            merchant_weight: 0.3,
            amount_weight: 0.2,
            learning_weight: 0.1,
            fallback_threshold: 0.3,
            fallback_confidence: 0.5,
            confirmation_threshold: 0.6,
            merchant_partial_score: 0.7,
            amount_near_score: 0.8,
            amount_far_score: 0.3,
            amount_neutral_score: 0.5,
            amount_near_tolerance: 0.2,
            learning_neutral_score: 0.5,
            suggestion_min_relevance: 0.1,
            suggestion_limit: 5,
        }
    }
}

/// Learning profile update rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub default_accuracy: f64,
    pub decay: f64,
    pub boost: f64,
    pub frequency_scale: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            default_accuracy: 0.5,
            decay: 0.9,
            boost: 1.1,
            frequency_scale: 10.0,
        }
    }
}

/// Recurrence detection and subscription analysis thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Look-back window used when the caller does not pass one
    pub default_window_days: i64,
    /// Minimum charges in a group before it can be a subscription
    pub min_occurrences: usize,
    /// Maximum coefficient of variation (stddev / mean) of charge amounts
    pub max_amount_cv: f64,
    /// Days-of-month that must each see 2+ charges
    pub min_common_days: usize,
    /// Relative tolerance when comparing to a service's typical amounts
    pub amount_match_tolerance: f64,
    pub base_confidence: f64,
    pub unknown_service_confidence: f64,
    pub known_service_bonus: f64,
    pub recent_charge_samples: usize,
    pub monthly_days: [f64; 2],
    pub quarterly_days: [f64; 2],
    pub yearly_days: [f64; 2],
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            default_window_days: 90,
            min_occurrences: 3,
            max_amount_cv: 0.15,
            min_common_days: 2,
            amount_match_tolerance: 0.10,
            base_confidence: 0.5,
            unknown_service_confidence: 0.3,
            known_service_bonus: 0.2,
            recent_charge_samples: 3,
            monthly_days: [25.0, 35.0],
            quarterly_days: [85.0, 95.0],
            yearly_days: [350.0, 380.0],
        }
    }
}

/// Insight generator thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub high_monthly_total: f64,
    pub expensive_monthly_cost: f64,
    pub unused_confidence: f64,
    pub entertainment_category: String,
    pub max_entertainment: usize,
    pub dominant_category_percent: f64,
    pub small_average_amount: f64,
    pub small_category_count: usize,
    pub large_one_time_amount: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            high_monthly_total: 200.0,
            expensive_monthly_cost: 50.0,
            unused_confidence: 0.6,
            entertainment_category: "Entertainment".to_string(),
            max_entertainment: 3,
            dominant_category_percent: 40.0,
            small_average_amount: 20.0,
            small_category_count: 3,
            large_one_time_amount: 200.0,
        }
    }
}

/// One value per health component
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ComponentValues {
    pub savings_rate: f64,
    pub budget_adherence: f64,
    pub income_stability: f64,
    pub expense_control: f64,
    pub emergency_fund: f64,
}

impl ComponentValues {
    pub fn sum(&self) -> f64 {
        self.savings_rate
            + self.budget_adherence
            + self.income_stability
            + self.expense_control
            + self.emergency_fund
    }
}

/// Tier cutoffs for the composite score
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TierCutoffs {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

/// Scores used when a component has no data to judge
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct NeutralScores {
    pub budget_adherence: f64,
    pub income_stability: f64,
    pub expense_control: f64,
    pub emergency_fund: f64,
}

impl Default for NeutralScores {
    fn default() -> Self {
        Self {
            budget_adherence: 50.0,
            income_stability: 50.0,
            expense_control: 70.0,
            emergency_fund: 50.0,
        }
    }
}

/// Per-budget score curve
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BudgetCurve {
    pub comfort_percent: f64,
    pub near_limit_base: f64,
    pub near_limit_slope: f64,
    pub over_limit_base: f64,
    pub over_limit_slope: f64,
}

impl Default for BudgetCurve {
    fn default() -> Self {
        Self {
            comfort_percent: 80.0,
            near_limit_base: 80.0,
            near_limit_slope: 0.5,
            over_limit_base: 50.0,
            over_limit_slope: 0.3,
        }
    }
}

/// Time windows the health components look at
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HealthWindows {
    pub income_months: u32,
    pub prior_period_days: i64,
    pub expense_lookback_days: i64,
    pub emergency_target_months: f64,
    pub provisional_savings_rate: f64,
    pub provisional_months: f64,
}

impl Default for HealthWindows {
    fn default() -> Self {
        Self {
            income_months: 6,
            prior_period_days: 30,
            expense_lookback_days: 90,
            emergency_target_months: 6.0,
            provisional_savings_rate: 0.2,
            provisional_months: 3.0,
        }
    }
}

/// A step in a score table
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Band {
    pub limit: f64,
    pub score: f64,
}

const fn band(limit: f64, score: f64) -> Band {
    Band { limit, score }
}

/// Score tables for the banded components
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreBands {
    /// Savings rate (%) at or above `limit`
    pub savings_rate: Vec<Band>,
    /// Income coefficient of variation (%) strictly below `limit`
    pub income_cv: Vec<Band>,
    pub income_cv_floor: f64,
    /// Average transaction growth (%) at or below `limit`
    pub expense_growth: Vec<Band>,
    pub expense_growth_floor: f64,
    /// Savings buffer as % of target at or above `limit`
    pub emergency_ratio: Vec<Band>,
    pub emergency_ratio_floor: f64,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            savings_rate: vec![
                band(20.0, 100.0),
                band(10.0, 75.0),
                band(5.0, 60.0),
                band(0.0, 50.0),
            ],
            income_cv: vec![
                band(10.0, 100.0),
                band(20.0, 80.0),
                band(30.0, 60.0),
                band(50.0, 40.0),
            ],
            income_cv_floor: 20.0,
            expense_growth: vec![
                band(-10.0, 100.0),
                band(0.0, 85.0),
                band(10.0, 70.0),
                band(20.0, 50.0),
                band(30.0, 30.0),
            ],
            expense_growth_floor: 10.0,
            emergency_ratio: vec![
                band(100.0, 100.0),
                band(50.0, 80.0),
                band(25.0, 60.0),
                band(15.0, 40.0),
            ],
            emergency_ratio_floor: 20.0,
        }
    }
}

/// Financial health scorer thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub weights: ComponentValues,
    pub tiers: TierCutoffs,
    pub recommend_below: ComponentValues,
    pub neutral: NeutralScores,
    pub budget: BudgetCurve,
    pub windows: HealthWindows,
    pub bands: ScoreBands,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            weights: ComponentValues {
                savings_rate: 0.30,
                budget_adherence: 0.25,
                income_stability: 0.20,
                expense_control: 0.15,
                emergency_fund: 0.10,
            },
            tiers: TierCutoffs {
                excellent: 80.0,
                good: 60.0,
                fair: 40.0,
            },
            recommend_below: ComponentValues {
                savings_rate: 60.0,
                budget_adherence: 70.0,
                income_stability: 60.0,
                expense_control: 60.0,
                emergency_fund: 50.0,
            },
            neutral: NeutralScores::default(),
            budget: BudgetCurve::default(),
            windows: HealthWindows::default(),
            bands: ScoreBands::default(),
        }
    }
}

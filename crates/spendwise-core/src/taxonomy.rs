//! Category taxonomy and known service signatures
//!
//! Both tables are immutable data loaded once at engine start from
//! `taxonomy.toml` and `services.toml` (see [`crate::config`] for the
//! resolution order). Adding a category or a service is a data change.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::{read_config_file, SERVICES_FILE, TAXONOMY_FILE};
use crate::error::{Error, Result};
use crate::models::{AlternativeOffer, Frequency};
use crate::normalize::Normalizer;

const DEFAULT_TAXONOMY: &str = include_str!("../../../config/taxonomy.toml");
const DEFAULT_SERVICES: &str = include_str!("../../../config/services.toml");

/// Signals that identify one spending category
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySignature {
    pub name: String,
    /// Cleaned keywords
    pub keywords: Vec<String>,
    /// Cleaned known merchant names
    pub merchants: Vec<String>,
    /// Typical (min, max) amounts, in declaration order
    pub amount_ranges: Vec<(f64, f64)>,
    /// Static prior, used to break exact score ties
    pub weight: f64,
}

/// The full set of categories the classifier may assign
#[derive(Debug, Clone)]
pub struct Taxonomy {
    signatures: Vec<CategorySignature>,
    fallback: String,
}

#[derive(Debug, Deserialize)]
struct RawTaxonomy {
    fallback: Option<String>,
    #[serde(default)]
    category: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    #[serde(default)]
    weight: f64,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    merchants: Vec<String>,
    #[serde(default)]
    amount_ranges: Vec<[f64; 2]>,
}

impl Taxonomy {
    /// Load the taxonomy from the config directory chain
    pub fn load(normalizer: &Normalizer, config_dir: Option<&Path>) -> Result<Self> {
        let content = read_config_file(TAXONOMY_FILE, config_dir, DEFAULT_TAXONOMY)?;
        Self::from_toml(&content, normalizer)
    }

    /// The taxonomy built into the crate, ignoring override files
    pub fn embedded(normalizer: &Normalizer) -> Result<Self> {
        Self::from_toml(DEFAULT_TAXONOMY, normalizer)
    }

    /// Parse a taxonomy, cleaning every keyword and merchant
    pub fn from_toml(content: &str, normalizer: &Normalizer) -> Result<Self> {
        let raw: RawTaxonomy = toml::from_str(content)?;
        let fallback = raw.fallback.unwrap_or_else(|| "Other".to_string());

        let mut signatures = Vec::with_capacity(raw.category.len());
        for cat in raw.category {
            if signatures
                .iter()
                .any(|s: &CategorySignature| s.name == cat.name)
            {
                return Err(Error::Config(format!("duplicate category: {}", cat.name)));
            }

            let mut amount_ranges = Vec::with_capacity(cat.amount_ranges.len());
            for [min, max] in cat.amount_ranges {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(Error::Config(format!(
                        "invalid amount range [{}, {}] for {}",
                        min, max, cat.name
                    )));
                }
                amount_ranges.push((min, max));
            }

            signatures.push(CategorySignature {
                keywords: clean_all(normalizer, &cat.keywords),
                merchants: clean_all(normalizer, &cat.merchants),
                amount_ranges,
                weight: cat.weight,
                name: cat.name,
            });
        }

        if !signatures.iter().any(|s| s.name == fallback) {
            return Err(Error::Config(format!(
                "taxonomy is missing the fallback category '{}'",
                fallback
            )));
        }

        Ok(Self {
            signatures,
            fallback,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategorySignature> {
        self.signatures.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CategorySignature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Tag used when no category scores high enough
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// A known recurring service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSignature {
    pub name: String,
    /// Cleaned keywords
    pub keywords: Vec<String>,
    pub merchants: Vec<String>,
    pub typical_amounts: Vec<f64>,
    pub frequency: Frequency,
    pub category: String,
    pub alternatives: Option<String>,
}

/// All known services plus the alternative offers per group
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    services: Vec<ServiceSignature>,
    alternatives: BTreeMap<String, Vec<AlternativeOffer>>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    service: Vec<RawService>,
    #[serde(default)]
    alternatives: Vec<RawAlternatives>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    merchants: Vec<String>,
    #[serde(default)]
    typical_amounts: Vec<f64>,
    frequency: Frequency,
    category: String,
    alternatives: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAlternatives {
    group: String,
    #[serde(default)]
    offers: Vec<AlternativeOffer>,
}

impl ServiceCatalog {
    /// Load service signatures from the config directory chain
    pub fn load(normalizer: &Normalizer, config_dir: Option<&Path>) -> Result<Self> {
        let content = read_config_file(SERVICES_FILE, config_dir, DEFAULT_SERVICES)?;
        Self::from_toml(&content, normalizer)
    }

    /// The service signatures built into the crate, ignoring override files
    pub fn embedded(normalizer: &Normalizer) -> Result<Self> {
        Self::from_toml(DEFAULT_SERVICES, normalizer)
    }

    pub fn from_toml(content: &str, normalizer: &Normalizer) -> Result<Self> {
        let raw: RawCatalog = toml::from_str(content)?;

        let mut alternatives = BTreeMap::new();
        for group in raw.alternatives {
            alternatives.insert(group.group, group.offers);
        }

        let mut services = Vec::with_capacity(raw.service.len());
        for svc in raw.service {
            if services.iter().any(|s: &ServiceSignature| s.name == svc.name) {
                return Err(Error::Config(format!("duplicate service: {}", svc.name)));
            }
            if let Some(group) = &svc.alternatives {
                if !alternatives.contains_key(group) {
                    return Err(Error::Config(format!(
                        "service {} references unknown alternatives group '{}'",
                        svc.name, group
                    )));
                }
            }

            services.push(ServiceSignature {
                keywords: clean_all(normalizer, &svc.keywords),
                merchants: clean_all(normalizer, &svc.merchants),
                typical_amounts: svc.typical_amounts,
                frequency: svc.frequency,
                category: svc.category,
                alternatives: svc.alternatives,
                name: svc.name,
            });
        }

        Ok(Self {
            services,
            alternatives,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceSignature> {
        self.services.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSignature> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Offers in the alternatives group of a service (empty if none)
    pub fn alternatives_for(&self, service_name: &str) -> &[AlternativeOffer] {
        self.get(service_name)
            .and_then(|s| s.alternatives.as_ref())
            .and_then(|group| self.alternatives.get(group))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn clean_all(normalizer: &Normalizer, values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| normalizer.clean(v))
        .filter(|v| !v.is_empty())
        .collect()
}

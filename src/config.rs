//! Pipeline configuration and the agronomic lookup tables used during
//! preprocessing.
//!
//! The tables encode plausibility ranges and naming conventions for Indian
//! crop datasets. They are built once at startup and passed by reference
//! into the stages that consume them.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AgriYieldError, Result};

/// Plausible yield range (kg/ha) per crop, with a permissive default for
/// crops not listed.
#[derive(Debug, Clone)]
pub struct CropYieldLimits {
    bounds: HashMap<String, (f64, f64)>,
    default: (f64, f64),
}

impl Default for CropYieldLimits {
    fn default() -> Self {
        let table = [
            ("rice", (500.0, 8000.0)),
            ("wheat", (500.0, 7000.0)),
            ("maize", (500.0, 12000.0)),
            ("cotton", (100.0, 3000.0)),
            ("sugarcane", (30000.0, 150000.0)),
            ("groundnut", (300.0, 4000.0)),
            ("soybean", (300.0, 4000.0)),
            ("soyabean", (300.0, 4000.0)),
            ("bajra", (200.0, 3500.0)),
            ("jowar", (200.0, 3500.0)),
            ("potato", (5000.0, 50000.0)),
            ("onion", (5000.0, 40000.0)),
            ("tomato", (10000.0, 80000.0)),
        ];
        let bounds = table
            .iter()
            .map(|(crop, range)| (crop.to_string(), *range))
            .collect();
        Self {
            bounds,
            default: (50.0, 100000.0),
        }
    }
}

impl CropYieldLimits {
    /// Returns the (min, max) plausible yield for a crop name, falling back
    /// to the default range for crops without a dedicated entry.
    pub fn bounds_for(&self, crop: &str) -> (f64, f64) {
        self.bounds
            .get(crop.trim().to_lowercase().as_str())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn default_bounds(&self) -> (f64, f64) {
        self.default
    }
}

/// Maps state names to coarse geographic regions by substring match.
///
/// Entries are checked in declaration order and the first match wins, so
/// the table is held as an ordered list rather than a map.
#[derive(Debug, Clone)]
pub struct RegionMap {
    regions: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl Default for RegionMap {
    fn default() -> Self {
        let table: [(&str, &[&str]); 5] = [
            (
                "north-india",
                &[
                    "jammu",
                    "kashmir",
                    "himachal",
                    "punjab",
                    "haryana",
                    "uttarakhand",
                    "uttar pradesh",
                    "delhi",
                ],
            ),
            (
                "south-india",
                &[
                    "andhra",
                    "telangana",
                    "karnataka",
                    "tamil",
                    "kerala",
                    "puducherry",
                ],
            ),
            (
                "east-india",
                &[
                    "bihar",
                    "jharkhand",
                    "west bengal",
                    "odisha",
                    "assam",
                    "sikkim",
                    "arunachal",
                    "nagaland",
                    "manipur",
                    "mizoram",
                    "tripura",
                    "meghalaya",
                ],
            ),
            (
                "west-india",
                &["rajasthan", "gujarat", "maharashtra", "goa"],
            ),
            ("central-india", &["madhya", "chhattisgarh"]),
        ];
        let regions = table
            .iter()
            .map(|(region, states)| {
                (
                    region.to_string(),
                    states.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self {
            regions,
            fallback: "central-india".to_string(),
        }
    }
}

impl RegionMap {
    /// Classifies a state name into a region. Matching is case-insensitive
    /// and tolerant of decorations like "Punjab, India".
    pub fn classify(&self, state: &str) -> &str {
        let needle = state.trim().to_lowercase();
        for (region, states) in &self.regions {
            if states.iter().any(|s| needle.contains(s.as_str())) {
                return region;
            }
        }
        &self.fallback
    }
}

/// Canonicalizes free-form season labels onto the Indian cropping calendar.
#[derive(Debug, Clone)]
pub struct SeasonTable {
    synonyms: HashMap<String, String>,
}

impl Default for SeasonTable {
    fn default() -> Self {
        let table = [
            ("winter", "rabi"),
            ("summer", "zaid"),
            ("autumn", "kharif"),
            ("whole year", "annual"),
            ("monsoon", "kharif"),
        ];
        let synonyms = table
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self { synonyms }
    }
}

impl SeasonTable {
    /// Returns the canonical season label; labels without a synonym entry
    /// pass through unchanged.
    pub fn canonical<'a>(&'a self, season: &'a str) -> &'a str {
        self.synonyms
            .get(season)
            .map(String::as_str)
            .unwrap_or(season)
    }
}

/// All agronomic lookup tables, built once per process.
#[derive(Debug, Clone, Default)]
pub struct DomainTables {
    pub crop_limits: CropYieldLimits,
    pub regions: RegionMap,
    pub seasons: SeasonTable,
}

/// Configuration for a full training run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidate dataset locations, tried in order.
    pub data_candidates: Vec<PathBuf>,
    /// Directory that receives the model bundle and metric reports.
    pub artifacts_dir: PathBuf,
    /// Requested fold count for both cross-validation strategies.
    pub n_splits: usize,
    /// Seed for every random decision in the run.
    pub seed: u64,
    /// Fraction of rows held out for the final test split.
    pub test_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_candidates: vec![
                PathBuf::from("data/crop_yield_processed.csv"),
                PathBuf::from("data/crop_yield.csv"),
            ],
            artifacts_dir: PathBuf::from("artifacts"),
            n_splits: 5,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the candidate list with a single explicit dataset path.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_candidates = vec![path.into()];
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_cv_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_candidates.is_empty() {
            return Err(AgriYieldError::InvalidParameter {
                name: "data_candidates".to_string(),
                value: "[]".to_string(),
                reason: "at least one dataset path is required".to_string(),
            });
        }
        if self.n_splits == 0 {
            return Err(AgriYieldError::InvalidParameter {
                name: "n_splits".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(AgriYieldError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: format!("{}", self.test_fraction),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yield_limits_lookup() {
        let limits = CropYieldLimits::default();
        assert_eq!(limits.bounds_for("rice"), (500.0, 8000.0));
        assert_eq!(limits.bounds_for("  RICE "), (500.0, 8000.0));
        assert_eq!(limits.bounds_for("sugarcane"), (30000.0, 150000.0));
        assert_eq!(limits.bounds_for("dragonfruit"), limits.default_bounds());
    }

    #[test]
    fn test_region_classification() {
        let regions = RegionMap::default();
        assert_eq!(regions.classify("punjab"), "north-india");
        assert_eq!(regions.classify("PUNJAB, INDIA"), "north-india");
        assert_eq!(regions.classify("tamil nadu"), "south-india");
        assert_eq!(regions.classify("west bengal"), "east-india");
        assert_eq!(regions.classify("gujarat"), "west-india");
        assert_eq!(regions.classify("UNKNOWNLAND"), "central-india");
    }

    #[test]
    fn test_season_synonyms() {
        let seasons = SeasonTable::default();
        assert_eq!(seasons.canonical("winter"), "rabi");
        assert_eq!(seasons.canonical("monsoon"), "kharif");
        assert_eq!(seasons.canonical("whole year"), "annual");
        assert_eq!(seasons.canonical("kharif"), "kharif");
    }

    #[test]
    fn test_config_validation() {
        assert!(PipelineConfig::default().validate().is_ok());
        let bad = PipelineConfig::default().with_test_fraction(1.5);
        assert!(bad.validate().is_err());
        let bad = PipelineConfig::default().with_cv_splits(0);
        assert!(bad.validate().is_err());
    }
}

//! Feature engineering: seeded backfill of absent sensor columns and
//! derivation of agronomic features.
//!
//! Every derived feature is declared in [`DERIVED_FEATURES`] with the input
//! columns it needs; a feature whose inputs are absent is skipped rather
//! than failing the run. Backfill draws from a seeded generator so two runs
//! over the same dataset produce identical frames.

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::preprocessing::{numeric_values, string_values};

const SOIL_TYPES: [&str; 6] = ["clay", "sandy", "loamy", "black", "red", "alluvial"];

const RAINFALL_EDGES: [f64; 6] = [0.0, 500.0, 1000.0, 1500.0, 2000.0, f64::INFINITY];
const RAINFALL_LABELS: [&str; 5] = ["very_low", "low", "medium", "high", "very_high"];

/// A derived feature: its input columns and the columns it produces.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub requires: &'static [&'static str],
    pub outputs: &'static [&'static str],
    builder: fn(DataFrame) -> Result<DataFrame>,
}

impl FeatureSpec {
    /// True when every required input column is present.
    pub fn satisfied_by(&self, df: &DataFrame) -> bool {
        self.requires.iter().all(|c| df.column(c).is_ok())
    }
}

/// Derived features, applied in declaration order.
pub const DERIVED_FEATURES: &[FeatureSpec] = &[
    FeatureSpec {
        name: "productivity_index",
        requires: &["production", "area_hectares"],
        outputs: &["productivity_index"],
        builder: add_productivity_index,
    },
    FeatureSpec {
        name: "fertilizer_intensity",
        requires: &["fertilizer", "area_hectares"],
        outputs: &["fertilizer_intensity"],
        builder: add_fertilizer_intensity,
    },
    FeatureSpec {
        name: "pesticide_intensity",
        requires: &["pesticide", "area_hectares"],
        outputs: &["pesticide_intensity"],
        builder: add_pesticide_intensity,
    },
    FeatureSpec {
        name: "rainfall_category",
        requires: &["rainfall"],
        outputs: &["rainfall_category"],
        builder: add_rainfall_category,
    },
    FeatureSpec {
        name: "yield_history",
        requires: &["state", "crop", "year", "yield"],
        outputs: &["prev_year_yield", "yield_change"],
        builder: add_yield_history,
    },
];

/// Columns synthesized and features derived during engineering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineeringSummary {
    pub synthesized: Vec<String>,
    pub derived: Vec<String>,
}

pub struct FeatureEngineer {
    seed: u64,
    rng: ChaCha8Rng,
}

impl FeatureEngineer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Backfills absent sensor columns, then derives every feature whose
    /// inputs are available.
    pub fn apply(&mut self, df: &DataFrame) -> Result<(DataFrame, EngineeringSummary)> {
        let mut df = df.clone();
        let mut summary = EngineeringSummary::default();

        self.backfill(&mut df, &mut summary)?;
        for spec in DERIVED_FEATURES {
            if !spec.satisfied_by(&df) {
                debug!(feature = spec.name, "inputs absent, skipped");
                continue;
            }
            df = (spec.builder)(df)?;
            summary
                .derived
                .extend(spec.outputs.iter().map(|s| s.to_string()));
        }

        info!(
            synthesized = summary.synthesized.len(),
            derived = summary.derived.len(),
            "feature engineering complete"
        );
        Ok((df, summary))
    }

    fn backfill(&mut self, df: &mut DataFrame, summary: &mut EngineeringSummary) -> Result<()> {
        self.backfill_uniform(df, "temperature", 25.0, 35.0, summary)?;
        self.backfill_uniform(df, "humidity", 40.0, 80.0, summary)?;
        self.backfill_uniform(df, "ndvi", 0.3, 0.8, summary)?;
        self.backfill_uniform(df, "soil_moisture", 15.0, 45.0, summary)?;
        self.backfill_lst(df, summary)?;
        self.backfill_soil_type(df, summary)?;
        Ok(())
    }

    fn backfill_uniform(
        &mut self,
        df: &mut DataFrame,
        name: &str,
        lo: f64,
        hi: f64,
        summary: &mut EngineeringSummary,
    ) -> Result<()> {
        if df.column(name).is_ok() {
            return Ok(());
        }
        let values: Vec<f64> = (0..df.height()).map(|_| self.rng.gen_range(lo..hi)).collect();
        df.with_column(Series::new(name.into(), values))?;
        summary.synthesized.push(name.to_string());
        Ok(())
    }

    /// Land surface temperature tracks air temperature when available.
    fn backfill_lst(&mut self, df: &mut DataFrame, summary: &mut EngineeringSummary) -> Result<()> {
        if df.column("lst").is_ok() {
            return Ok(());
        }
        let values: Vec<Option<f64>> = if df.column("temperature").is_ok() {
            let temps = numeric_values(df, "temperature")?;
            let mut out = Vec::with_capacity(temps.len());
            for t in temps {
                out.push(t.map(|t| t + self.rng.gen_range(-2.0..5.0)));
            }
            out
        } else {
            (0..df.height())
                .map(|_| Some(self.rng.gen_range(20.0..35.0)))
                .collect()
        };
        df.with_column(Series::new("lst".into(), values))?;
        summary.synthesized.push("lst".to_string());
        Ok(())
    }

    fn backfill_soil_type(
        &mut self,
        df: &mut DataFrame,
        summary: &mut EngineeringSummary,
    ) -> Result<()> {
        if df.column("soil_type").is_ok() {
            return Ok(());
        }
        let values: Vec<&str> = (0..df.height())
            .map(|_| SOIL_TYPES[self.rng.gen_range(0..SOIL_TYPES.len())])
            .collect();
        df.with_column(Series::new("soil_type".into(), values))?;
        summary.synthesized.push("soil_type".to_string());
        Ok(())
    }
}

fn add_productivity_index(mut df: DataFrame) -> Result<DataFrame> {
    let production = numeric_values(&df, "production")?;
    let area = numeric_values(&df, "area_hectares")?;
    let values: Vec<Option<f64>> = production
        .iter()
        .zip(&area)
        .map(|(p, a)| match (p, a) {
            (Some(p), Some(a)) => Some(p / (a + 1.0)),
            _ => None,
        })
        .collect();
    df.with_column(Series::new("productivity_index".into(), values))?;
    Ok(df)
}

fn add_fertilizer_intensity(df: DataFrame) -> Result<DataFrame> {
    add_intensity(df, "fertilizer", "fertilizer_intensity")
}

fn add_pesticide_intensity(df: DataFrame) -> Result<DataFrame> {
    add_intensity(df, "pesticide", "pesticide_intensity")
}

/// Input per hectare; non-numeric input entries count as zero.
fn add_intensity(mut df: DataFrame, input: &str, output: &str) -> Result<DataFrame> {
    let amounts = numeric_values(&df, input)?;
    let area = numeric_values(&df, "area_hectares")?;
    let values: Vec<Option<f64>> = amounts
        .iter()
        .zip(&area)
        .map(|(amount, a)| a.map(|a| amount.unwrap_or(0.0) / (a + 1.0)))
        .collect();
    df.with_column(Series::new(output.into(), values))?;
    Ok(df)
}

fn add_rainfall_category(mut df: DataFrame) -> Result<DataFrame> {
    let rainfall = numeric_values(&df, "rainfall")?;
    let values: Vec<Option<&str>> = rainfall
        .iter()
        .map(|opt| opt.and_then(bin_rainfall))
        .collect();
    df.with_column(Series::new("rainfall_category".into(), values))?;
    Ok(df)
}

/// Right-closed bins: a value lands in the first bin whose upper edge it
/// does not exceed. Values at or below zero have no category.
fn bin_rainfall(v: f64) -> Option<&'static str> {
    RAINFALL_EDGES
        .windows(2)
        .position(|w| v > w[0] && v <= w[1])
        .map(|i| RAINFALL_LABELS[i])
}

/// Previous-season yield per (state, crop) group and the change against it.
/// Rows without history keep a null previous yield and a zero change.
fn add_yield_history(df: DataFrame) -> Result<DataFrame> {
    let mut df = df.sort(["state", "crop", "year"], SortMultipleOptions::default())?;
    let states = string_values(&df, "state")?;
    let crops = string_values(&df, "crop")?;
    let yields = numeric_values(&df, "yield")?;

    let n = df.height();
    let mut prev: Vec<Option<f64>> = Vec::with_capacity(n);
    for i in 0..n {
        let same_group = i > 0 && states[i] == states[i - 1] && crops[i] == crops[i - 1];
        prev.push(if same_group { yields[i - 1] } else { None });
    }
    let change: Vec<Option<f64>> = (0..n)
        .map(|i| yields[i].map(|y| y - prev[i].unwrap_or(y)))
        .collect();

    df.with_column(Series::new("prev_year_yield".into(), prev))?;
    df.with_column(Series::new("yield_change".into(), change))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_satisfaction() {
        let df = df!(
            "rainfall" => &[800.0],
            "state" => &["punjab"],
        )
        .unwrap();
        let by_name = |name: &str| {
            DERIVED_FEATURES
                .iter()
                .find(|s| s.name == name)
                .unwrap()
        };
        assert!(by_name("rainfall_category").satisfied_by(&df));
        assert!(!by_name("productivity_index").satisfied_by(&df));
        assert!(!by_name("yield_history").satisfied_by(&df));
    }

    #[test]
    fn test_backfill_is_seeded_and_in_range() {
        let df = df!("yield" => &[3000.0, 2800.0, 2600.0, 3100.0]).unwrap();
        let (a, summary) = FeatureEngineer::new(7).apply(&df).unwrap();
        let (b, _) = FeatureEngineer::new(7).apply(&df).unwrap();
        assert!(a.equals(&b));
        assert!(summary.synthesized.contains(&"temperature".to_string()));
        assert!(summary.synthesized.contains(&"soil_type".to_string()));

        let temps: Vec<f64> = a
            .column("temperature")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert!(temps.iter().all(|t| (25.0..35.0).contains(t)));

        let soils: Vec<Option<&str>> =
            a.column("soil_type").unwrap().str().unwrap().into_iter().collect();
        assert!(soils
            .iter()
            .all(|s| SOIL_TYPES.contains(&s.unwrap())));
    }

    #[test]
    fn test_lst_tracks_temperature() {
        let df = df!(
            "temperature" => &[28.0, 31.0, 26.5],
        )
        .unwrap();
        let (out, _) = FeatureEngineer::new(42).apply(&df).unwrap();
        let temps: Vec<f64> = out
            .column("temperature")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        let lsts: Vec<f64> = out
            .column("lst")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        for (t, l) in temps.iter().zip(&lsts) {
            let delta = l - t;
            assert!((-2.0..5.0).contains(&delta), "delta {delta} out of range");
        }
    }

    #[test]
    fn test_existing_columns_not_overwritten() {
        let df = df!("ndvi" => &[0.99, 0.98]).unwrap();
        let (out, summary) = FeatureEngineer::new(1).apply(&df).unwrap();
        let ndvi: Vec<Option<f64>> =
            out.column("ndvi").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ndvi, vec![Some(0.99), Some(0.98)]);
        assert!(!summary.synthesized.contains(&"ndvi".to_string()));
    }

    #[test]
    fn test_productivity_index() {
        let df = df!(
            "production" => &[100.0, 50.0],
            "area_hectares" => &[9.0, 4.0],
        )
        .unwrap();
        let (out, summary) = FeatureEngineer::new(1).apply(&df).unwrap();
        let values: Vec<Option<f64>> = out
            .column("productivity_index")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(10.0), Some(10.0)]);
        assert!(summary.derived.contains(&"productivity_index".to_string()));
    }

    #[test]
    fn test_intensity_coerces_non_numeric_to_zero() {
        let df = df!(
            "fertilizer" => &["120", "junk", "60"],
            "area_hectares" => &[11.0, 5.0, 11.0],
        )
        .unwrap();
        let (out, _) = FeatureEngineer::new(1).apply(&df).unwrap();
        let values: Vec<Option<f64>> = out
            .column("fertilizer_intensity")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(10.0), Some(0.0), Some(5.0)]);
    }

    #[test]
    fn test_rainfall_binning_edges() {
        assert_eq!(bin_rainfall(0.0), None);
        assert_eq!(bin_rainfall(-10.0), None);
        assert_eq!(bin_rainfall(300.0), Some("very_low"));
        assert_eq!(bin_rainfall(500.0), Some("very_low"));
        assert_eq!(bin_rainfall(500.1), Some("low"));
        assert_eq!(bin_rainfall(1500.0), Some("medium"));
        assert_eq!(bin_rainfall(1999.0), Some("high"));
        assert_eq!(bin_rainfall(25000.0), Some("very_high"));
    }

    #[test]
    fn test_yield_history_within_groups() {
        let df = df!(
            "state" => &["punjab", "punjab", "punjab", "kerala"],
            "crop" => &["rice", "rice", "rice", "rice"],
            "year" => &[2019i64, 2018, 2020, 2020],
            "yield" => &[20.0, 10.0, 40.0, 35.0],
        )
        .unwrap();
        let (out, _) = FeatureEngineer::new(1).apply(&df).unwrap();
        // Sorted by (state, crop, year): kerala first, then punjab 2018..2020.
        let prev: Vec<Option<f64>> = out
            .column("prev_year_yield")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        let change: Vec<Option<f64>> = out
            .column("yield_change")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(prev, vec![None, None, Some(10.0), Some(20.0)]);
        assert_eq!(change, vec![Some(0.0), Some(0.0), Some(10.0), Some(20.0)]);
    }
}

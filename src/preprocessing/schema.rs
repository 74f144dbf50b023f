//! Schema normalization for heterogeneous crop yield datasets.
//!
//! Public datasets disagree on column naming and categorical spelling, so
//! everything downstream assumes this stage has already run. Normalization
//! is idempotent: applying it to an already-normalized frame is a no-op.

use polars::prelude::*;
use tracing::debug;

use crate::config::{RegionMap, SeasonTable};
use crate::error::Result;
use crate::preprocessing::string_values;

/// Column name synonyms, copied onto the canonical name when it is absent.
const COLUMN_SYNONYMS: [(&str, &str); 3] = [
    ("annual_rainfall", "rainfall"),
    ("area", "area_hectares"),
    ("crop_year", "year"),
];

/// Categorical columns cleaned to lowercase with missing values filled.
const CATEGORICAL_COLUMNS: [&str; 4] = ["state", "district", "crop", "season"];

pub struct SchemaNormalizer<'a> {
    regions: &'a RegionMap,
    seasons: &'a SeasonTable,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(regions: &'a RegionMap, seasons: &'a SeasonTable) -> Self {
        Self { regions, seasons }
    }

    /// Normalizes column names and categorical values and derives the
    /// region column from the state when no region column exists.
    pub fn normalize(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        normalize_column_names(&mut df)?;
        copy_synonyms(&mut df)?;

        for col in CATEGORICAL_COLUMNS {
            if df.column(col).is_ok() {
                clean_categorical(&mut df, col)?;
            }
        }
        if df.column("season").is_ok() {
            self.canonicalize_seasons(&mut df)?;
        }
        if df.column("region").is_err() && df.column("state").is_ok() {
            self.derive_region(&mut df)?;
        }

        debug!(columns = df.width(), "schema normalized");
        Ok(df)
    }

    fn canonicalize_seasons(&self, df: &mut DataFrame) -> Result<()> {
        let seasons = string_values(df, "season")?;
        let mapped: Vec<String> = seasons
            .iter()
            .map(|opt| {
                let label = opt.as_deref().unwrap_or("unknown");
                self.seasons.canonical(label).to_string()
            })
            .collect();
        df.with_column(Series::new("season".into(), mapped))?;
        Ok(())
    }

    fn derive_region(&self, df: &mut DataFrame) -> Result<()> {
        let states = string_values(df, "state")?;
        let regions: Vec<String> = states
            .iter()
            .map(|opt| {
                self.regions
                    .classify(opt.as_deref().unwrap_or(""))
                    .to_string()
            })
            .collect();
        df.with_column(Series::new("region".into(), regions))?;
        Ok(())
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn normalize_column_names(df: &mut DataFrame) -> Result<()> {
    let originals: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for original in &originals {
        let normalized = normalize_name(original);
        if normalized == *original {
            continue;
        }
        // A collision means the normalized name is already taken; keep the
        // existing column and leave this one untouched.
        if df.column(&normalized).is_ok() {
            continue;
        }
        df.rename(original, normalized.into())?;
    }
    Ok(())
}

fn copy_synonyms(df: &mut DataFrame) -> Result<()> {
    for (source, canonical) in COLUMN_SYNONYMS {
        if df.column(source).is_ok() && df.column(canonical).is_err() {
            let mut series = df.column(source)?.as_materialized_series().clone();
            series.rename(canonical.into());
            df.with_column(series)?;
        }
    }
    Ok(())
}

fn clean_categorical(df: &mut DataFrame, name: &str) -> Result<()> {
    let values = string_values(df, name)?;
    let cleaned: Vec<String> = values
        .iter()
        .map(|opt| match opt.as_deref() {
            Some(v) => {
                let trimmed = v.trim().to_lowercase();
                if trimmed.is_empty() {
                    "unknown".to_string()
                } else {
                    trimmed
                }
            }
            None => "unknown".to_string(),
        })
        .collect();
    df.with_column(Series::new(name.into(), cleaned))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainTables;

    fn normalizer(tables: &DomainTables) -> SchemaNormalizer<'_> {
        SchemaNormalizer::new(&tables.regions, &tables.seasons)
    }

    #[test]
    fn test_column_names_lowercased() {
        let tables = DomainTables::default();
        let df = df!(
            "State" => &["Punjab"],
            "Crop Year" => &[2020i64],
            "yield" => &[3000.0],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        assert!(out.column("state").is_ok());
        assert!(out.column("crop_year").is_ok());
        assert!(out.column("year").is_ok());
    }

    #[test]
    fn test_synonym_copied_only_when_canonical_absent() {
        let tables = DomainTables::default();
        let df = df!(
            "annual_rainfall" => &[800.0, 1200.0],
            "rainfall" => &[1.0, 2.0],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        let rainfall: Vec<Option<f64>> =
            out.column("rainfall").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(rainfall, vec![Some(1.0), Some(2.0)]);

        let df = df!("area" => &[10.0, 20.0]).unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        assert!(out.column("area_hectares").is_ok());
        assert!(out.column("area").is_ok());
    }

    #[test]
    fn test_categoricals_cleaned_and_filled() {
        let tables = DomainTables::default();
        let df = df!(
            "state" => &[Some("  PUNJAB "), None, Some("Kerala")],
            "crop" => &[Some("Rice"), Some(""), Some("WHEAT")],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        let states: Vec<Option<&str>> =
            out.column("state").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(states, vec![Some("punjab"), Some("unknown"), Some("kerala")]);
        let crops: Vec<Option<&str>> =
            out.column("crop").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(crops, vec![Some("rice"), Some("unknown"), Some("wheat")]);
    }

    #[test]
    fn test_season_canonicalized() {
        let tables = DomainTables::default();
        let df = df!(
            "season" => &["Winter", "MONSOON", "Whole Year", "kharif"],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        let seasons: Vec<Option<&str>> =
            out.column("season").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            seasons,
            vec![Some("rabi"), Some("kharif"), Some("annual"), Some("kharif")]
        );
    }

    #[test]
    fn test_region_derived_from_state() {
        let tables = DomainTables::default();
        let df = df!(
            "state" => &["PUNJAB, INDIA", "tamil nadu", "UNKNOWNLAND"],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        let regions: Vec<Option<&str>> =
            out.column("region").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            regions,
            vec![Some("north-india"), Some("south-india"), Some("central-india")]
        );
    }

    #[test]
    fn test_existing_region_preserved() {
        let tables = DomainTables::default();
        let df = df!(
            "state" => &["punjab"],
            "region" => &["custom-region"],
        )
        .unwrap();
        let out = normalizer(&tables).normalize(&df).unwrap();
        let regions: Vec<Option<&str>> =
            out.column("region").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(regions, vec![Some("custom-region")]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let tables = DomainTables::default();
        let df = df!(
            "State" => &[Some("Punjab"), None, Some("GOA ")],
            "Season" => &["Winter", "Summer", "Autumn"],
            "Annual_Rainfall" => &[700.0, 300.0, 900.0],
            "Area" => &[12.0, 8.0, 20.0],
            "yield" => &[3000.0, 2000.0, 2500.0],
        )
        .unwrap();
        let norm = normalizer(&tables);
        let once = norm.normalize(&df).unwrap();
        let twice = norm.normalize(&once).unwrap();
        assert!(once.equals(&twice));
    }
}

//! Dataset discovery and CSV loading.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::error::{AgriYieldError, Result};

/// Returns the first candidate path that exists on disk.
///
/// Candidates are checked in order so a preprocessed dataset can shadow the
/// raw one. The error lists every path tried.
pub fn resolve_dataset(candidates: &[PathBuf]) -> Result<PathBuf> {
    for path in candidates {
        if path.exists() {
            return Ok(path.clone());
        }
    }
    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(AgriYieldError::DatasetNotFound(tried))
}

/// Reads a CSV file into a DataFrame with header and schema inference.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.is_empty() {
        return Err(AgriYieldError::DataError(format!(
            "dataset {} contains no rows",
            path.display()
        )));
    }

    info!(
        rows = df.height(),
        columns = df.width(),
        path = %path.display(),
        "loaded dataset"
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_prefers_first_existing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b\n1,2").unwrap();
        let existing = file.path().to_path_buf();

        let candidates = vec![PathBuf::from("does/not/exist.csv"), existing.clone()];
        let resolved = resolve_dataset(&candidates).unwrap();
        assert_eq!(resolved, existing);
    }

    #[test]
    fn test_resolve_reports_tried_paths() {
        let candidates = vec![
            PathBuf::from("missing_one.csv"),
            PathBuf::from("missing_two.csv"),
        ];
        let err = resolve_dataset(&candidates).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing_one.csv"));
        assert!(msg.contains("missing_two.csv"));
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "state,yield").unwrap();
        writeln!(file, "punjab,3500").unwrap();
        writeln!(file, "kerala,2800").unwrap();
        file.flush().unwrap();

        let df = load_dataset(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }
}

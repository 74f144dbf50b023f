//! Integration test: full training pipeline (CSV → artifacts)

use std::fmt::Write as _;
use std::fs;

use agriyield::artifacts::ArtifactStore;
use agriyield::config::PipelineConfig;
use agriyield::pipeline::TrainingPipeline;
use agriyield::preprocessing::FeatureSelector;
use agriyield::AgriYieldError;

/// 3 states × 2 districts × 6 years × 2 crops = 72 plausible rows, plus
/// one impossible rice yield and one zero-yield row that the filter must
/// drop.
fn synthetic_csv() -> String {
    let mut csv =
        String::from("State,District,Crop,Crop_Year,Season,Annual_Rainfall,Area,Production,Yield\n");
    let states: [(&str, [&str; 2]); 3] = [
        ("Punjab", ["Amritsar", "Ludhiana"]),
        ("Tamil Nadu", ["Erode", "Salem"]),
        ("Maharashtra", ["Pune", "Nashik"]),
    ];

    for (state_idx, (state, districts)) in states.iter().enumerate() {
        for (d, district) in districts.iter().enumerate() {
            let district_idx = state_idx * 2 + d;
            for year in 2016i32..=2021 {
                for (crop, season, base) in
                    [("Wheat", "Winter", 3000.0), ("Rice", "Kharif", 3800.0)]
                {
                    let drift = 30.0 * (year - 2016) as f64;
                    let noise = ((district_idx + year as usize) % 4) as f64 * 25.0;
                    let yield_kg = base + 150.0 * district_idx as f64 + drift + noise;
                    let rainfall =
                        600.0 + 300.0 * district_idx as f64 + 10.0 * (year - 2016) as f64;
                    let area = 100.0 + 10.0 * district_idx as f64;
                    let production = yield_kg * area / 1000.0;
                    writeln!(
                        csv,
                        "{state},{district},{crop},{year},{season},{rainfall},{area},{production},{yield_kg}"
                    )
                    .unwrap();
                }
            }
        }
    }

    csv.push_str("Punjab,Amritsar,Rice,2021,Kharif,800,100,2500,25000\n");
    csv.push_str("Punjab,Amritsar,Wheat,2021,Winter,600,100,0,0\n");
    csv
}

#[test]
fn test_training_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("crop_yield.csv");
    fs::write(&data_path, synthetic_csv()).unwrap();
    let artifacts_dir = dir.path().join("artifacts");

    let config = PipelineConfig::new()
        .with_data_path(&data_path)
        .with_artifacts_dir(&artifacts_dir)
        .with_cv_splits(5)
        .with_seed(42)
        .with_test_fraction(0.2);

    let run = TrainingPipeline::new(config).run().unwrap();

    // Loading and filtering.
    assert_eq!(run.rows_loaded, 74);
    assert_eq!(run.outlier.rows_removed, 2);
    assert_eq!(run.outlier.rows_retained, 72);
    assert_eq!(run.outlier.conversion_factor, 1.0);

    // Sensor columns were absent from the CSV, so all six are backfilled.
    assert_eq!(run.engineering.synthesized.len(), 6);

    // Encoded vocabularies match the panel.
    assert_eq!(run.encoder_cardinalities["state"], 3);
    assert_eq!(run.encoder_cardinalities["district"], 6);
    assert_eq!(run.encoder_cardinalities["crop"], 2);
    assert_eq!(run.encoder_cardinalities["season"], 2);
    assert_eq!(run.encoder_cardinalities["region"], 3);

    // Six years allow four expanding-window folds; six districts and a
    // requested five splits give five spatial folds.
    assert_eq!(run.temporal_cv.folds.len(), 4);
    assert_eq!(run.spatial_cv.folds.len(), 5);

    // Report totals.
    assert_eq!(run.report.total_samples, 72);
    assert_eq!(run.report.train_samples + run.report.test_samples, 72);
    assert_eq!(run.report.n_features, 11);
    assert_eq!(run.report.temporal_cv_folds, 4);
    assert_eq!(run.report.temporal_cv_scores.len(), 4);
    assert_eq!(run.report.spatial_cv_folds, 5);
    assert_eq!(run.report.spatial_cv_scores.len(), 5);
    assert_eq!(run.report.backfill_seed, 42);
    assert!(run.report.r2.is_finite());
    assert!(run.report.rmse >= 0.0);
    assert!(run.report.oob_score.is_some());
    assert_eq!(run.report.feature_importance.len(), 11);

    // Artifact files landed on disk.
    assert!(run.artifacts.model.exists());
    assert!(run.artifacts.metrics.exists());
    assert!(run.artifacts.feature_importance.exists());
}

#[test]
fn test_saved_bundle_reloads_and_matches_contract() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("crop_yield.csv");
    fs::write(&data_path, synthetic_csv()).unwrap();
    let artifacts_dir = dir.path().join("artifacts");

    let config = PipelineConfig::new()
        .with_data_path(&data_path)
        .with_artifacts_dir(&artifacts_dir)
        .with_seed(7);
    TrainingPipeline::new(config).run().unwrap();

    let store = ArtifactStore::new(&artifacts_dir);
    let bundle = store.load_bundle().unwrap();
    assert_eq!(bundle.feature_names, FeatureSelector::feature_names());
    assert_eq!(bundle.model.n_trees(), 300);
    assert_eq!(bundle.backfill_seed, 7);

    let report = store.load_report().unwrap();
    assert_eq!(report.model_type, "random_forest_regressor");
    assert_eq!(report.feature_names, bundle.feature_names);
    assert_eq!(
        report.hyperparameters.n_estimators, 300,
        "report must describe the persisted forest"
    );
}

#[test]
fn test_missing_dataset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new()
        .with_data_path(dir.path().join("nope.csv"))
        .with_artifacts_dir(dir.path().join("artifacts"));

    let err = TrainingPipeline::new(config).run();
    assert!(matches!(err, Err(AgriYieldError::DatasetNotFound(_))));
}

#[test]
fn test_all_rows_filtered_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("bad.csv");
    fs::write(
        &data_path,
        "State,District,Crop,Crop_Year,Season,Annual_Rainfall,Area,Production,Yield\n\
         Punjab,Amritsar,Rice,2020,Kharif,800,100,0,0\n\
         Punjab,Amritsar,Rice,2021,Kharif,820,100,0,0\n",
    )
    .unwrap();

    let config = PipelineConfig::new()
        .with_data_path(&data_path)
        .with_artifacts_dir(dir.path().join("artifacts"));

    let err = TrainingPipeline::new(config).run();
    assert!(matches!(err, Err(AgriYieldError::DataError(_))));
}

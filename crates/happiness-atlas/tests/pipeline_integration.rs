//! End-to-end tests: raw tables in, report out

use happiness_atlas::analysis::{AnomalyListing, ClusteringOutcome, LocalSlopeOutcome};
use happiness_atlas::config::KeyCollisionPolicy;
use happiness_atlas::ingestion::{parse_csv, DropReason, SourceTable};
use happiness_atlas::{analyze, analyze_files, AtlasConfig, CountryRecord, Error, PipelineContext};

const INTERNET_CSV: &str = "\
Country,PctOfPopulationUsingInternet,Latitude,Longitude
Finland,96.3,64.0,26.0
Denmark,98.9,56.0,10.0
Germany,91.6,51.0,10.0
Poland,86.9,52.0,19.0
Italy,85.1,42.8,12.8
Greece,83.2,39.0,22.0
DR Congo,22.9,-4.0,21.8
Hong Kong,95.6,22.3,114.2
United States,91.8,38.0,-97.0
Chile,90.2,-35.7,-71.5
Brazil,81.0,-10.0,-55.0
Nowhere,50.0,,
Atlantis,70.0,0.0,-30.0
";

const HAPPINESS_CSV: &str = "\
Country,Ladder score
Finland,7.741
Denmark,7.583
Germany,6.719
Poland,6.442
Italy,6.324
Greece,5.934
Congo (Kinshasa),3.295
Hong Kong S.A.R. of China,5.316
United States,6.725
Chile,6.360
Brazil,6.272
Nowhere,5.0
";

fn tables() -> (Vec<happiness_atlas::RawRow>, Vec<happiness_atlas::RawRow>) {
    (
        parse_csv("internet", INTERNET_CSV.as_bytes()).unwrap(),
        parse_csv("happiness", HAPPINESS_CSV.as_bytes()).unwrap(),
    )
}

#[test]
fn test_full_pipeline_from_csv_text() {
    let (internet, happiness) = tables();
    let report = analyze(&AtlasConfig::default(), &internet, &happiness).unwrap();

    // DR Congo and Hong Kong match through the alias table
    assert_eq!(report.merge.merged, 11);
    assert_eq!(report.merge.internet_rows, 13);
    assert_eq!(report.merge.happiness_rows, 12);
    assert!(report.records.iter().any(|r| r.country == "Congo (Kinshasa)"));
    assert!(report.records.iter().any(|r| r.country == "Hong Kong S.A.R. of China"));

    let reasons: Vec<_> = report.merge.dropped.iter().map(|d| d.reason).collect();
    assert!(reasons.contains(&DropReason::InvalidLatitude));
    assert!(reasons.contains(&DropReason::NoHappinessMatch));
    assert!(report.merge.dropped.iter().all(|d| d.table == SourceTable::Internet));

    let clustering = report.clustering.result().unwrap();
    assert_eq!(clustering.assigned_count(), 11);
    assert!(report.records.iter().all(|r| r.cluster_id.is_some()));

    let slopes = report.local_slopes.result().unwrap();
    assert_eq!(slopes.slopes.len(), 11);
    assert_eq!(
        slopes.estimated + slopes.insufficient + slopes.ill_conditioned,
        11
    );
    // The Americas, Congo and Hong Kong have too few neighbours within 2500 km
    assert!(slopes.insufficient >= 5);

    let residuals = report.residuals.as_ref().unwrap();
    let top = residuals.by_magnitude[0].residual.abs();
    assert!(residuals.by_magnitude.iter().all(|e| e.residual.abs() <= top));
    assert!(matches!(residuals.anomalies, AnomalyListing::Listed { .. }));

    let interp = report.interpretation.as_ref().unwrap();
    assert!(interp.sentence.starts_with("Pearson correlation = "));
    assert!(interp
        .pattern_summary
        .as_deref()
        .unwrap()
        .starts_with("Countries above line (examples): "));
}

#[test]
fn test_two_record_example() {
    let records = vec![
        CountryRecord::new("A", 90.0, 8.0, 0.0, 0.0),
        CountryRecord::new("B", 10.0, 4.0, 0.0, 1.0),
    ];
    let ctx = PipelineContext::from_records(AtlasConfig::default(), records).unwrap();
    let report = ctx.finish().unwrap();

    let reg = report.statistics.regression.unwrap();
    assert!((report.statistics.correlation.r - 1.0).abs() < 1e-9);
    assert!((reg.model.slope - 0.05).abs() < 1e-9);
    assert!((reg.model.intercept - 3.5).abs() < 1e-9);
    assert!((reg.r_squared - 1.0).abs() < 1e-9);

    let anomalies = &report.residuals.unwrap().anomalies;
    assert_eq!(
        *anomalies,
        AnomalyListing::InsufficientData { required: 5, available: 2 }
    );
}

#[test]
fn test_non_finite_records_never_reach_statistics() {
    let records = vec![
        CountryRecord::new("A", 90.0, 8.0, 0.0, 0.0),
        CountryRecord::new("B", 10.0, 4.0, 0.0, 1.0),
        CountryRecord::new("C", 50.0, f64::NAN, 0.0, 2.0),
    ];
    let report = PipelineContext::from_records(AtlasConfig::default(), records)
        .unwrap()
        .finish()
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.merge.dropped[0].reason, DropReason::NonFiniteValue);
    assert!(report.statistics.correlation.r.is_finite());
    assert!(!report.render_text().contains("NaN"));
}

#[test]
fn test_repeated_happiness_row_uses_last_score() {
    let internet = parse_csv(
        "internet",
        b"Country,PctOfPopulationUsingInternet,Latitude,Longitude\nPeru,75,-9,-75\n",
    )
    .unwrap();
    let happiness =
        parse_csv("happiness", b"Country,Ladder score\nPeru,5.8\nPeru,9.9\n").unwrap();

    let ctx = PipelineContext::new(AtlasConfig::default(), &internet, &happiness).unwrap();
    assert_eq!(ctx.records()[0].happiness_score, 9.9);
    assert_eq!(ctx.merge_outcome().dropped_from(SourceTable::Happiness), 1);
}

#[test]
fn test_single_record_clustering_is_insufficient() {
    let records = vec![CountryRecord::new("Solo", 80.0, 6.0, 10.0, 10.0)];
    let mut ctx = PipelineContext::from_records(AtlasConfig::default(), records).unwrap();

    let outcome = ctx.run_clustering().unwrap().clone();
    assert_eq!(
        outcome,
        ClusteringOutcome::InsufficientData { required: 3, available: 1 }
    );
    assert_eq!(ctx.records()[0].cluster_id, None);

    let report = ctx.finish().unwrap();
    assert!(report.statistics.regression.is_none());
    assert!(report.interpretation.is_none());
    assert!(report.residuals.is_none());
    assert!(matches!(
        report.local_slopes,
        LocalSlopeOutcome::InsufficientData { required: 5, available: 1 }
    ));
    assert!(report.render_text().contains("not enough location data"));
}

#[test]
fn test_pipeline_is_deterministic() {
    let (internet, happiness) = tables();
    let a = analyze(&AtlasConfig::default(), &internet, &happiness).unwrap();
    let b = analyze(&AtlasConfig::default(), &internet, &happiness).unwrap();

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.records, b.records);
    assert_eq!(a.merge, b.merge);
    assert_eq!(a.statistics, b.statistics);
    assert_eq!(a.residuals, b.residuals);
}

#[test]
fn test_collision_policy_from_config() {
    let internet = parse_csv(
        "internet",
        b"Country,PctOfPopulationUsingInternet,Latitude,Longitude\n\
          Chile,80,-35,-71\n\
          Chile,90,-35,-71\n",
    )
    .unwrap();
    let happiness = parse_csv("happiness", b"Country,Ladder score\nChile,6.2\n").unwrap();

    let mut config = AtlasConfig::default();
    config.merge.collision_policy = KeyCollisionPolicy::LastWins;
    let ctx = PipelineContext::new(config, &internet, &happiness).unwrap();

    assert_eq!(ctx.records().len(), 1);
    assert_eq!(ctx.records()[0].internet_usage_percent, 90.0);
    assert_eq!(ctx.merge_outcome().dropped_for(DropReason::DuplicateCountry), 1);
}

#[test]
fn test_report_outputs() {
    let (internet, happiness) = tables();
    let report = analyze(&AtlasConfig::default(), &internet, &happiness).unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["clustering"]["status"], "clustered");
    assert_eq!(json["records"].as_array().unwrap().len(), 11);

    let text = report.render_text();
    assert!(text.contains("Regression: y="));
    assert!(text.contains("Largest residuals:"));
    assert!(text.contains("mean happiness"));

    let mut buf = Vec::new();
    report.write_records_csv(&mut buf).unwrap();
    let csv_text = String::from_utf8(buf).unwrap();
    assert_eq!(csv_text.lines().count(), 12);
    assert!(csv_text.starts_with("country,internet_usage_percent"));
}

#[tokio::test]
async fn test_analyze_files() {
    let dir = tempfile::tempdir().unwrap();
    let internet = dir.path().join("internet.csv");
    let happiness = dir.path().join("happiness.csv");
    std::fs::write(&internet, INTERNET_CSV).unwrap();
    std::fs::write(&happiness, HAPPINESS_CSV).unwrap();

    let report = analyze_files(AtlasConfig::default(), &internet, &happiness)
        .await
        .unwrap();
    assert_eq!(report.merge.merged, 11);
}

#[tokio::test]
async fn test_analyze_files_rejects_unknown_format() {
    let dir = tempfile::tempdir().unwrap();
    let internet = dir.path().join("internet.xlsx");
    let happiness = dir.path().join("happiness.csv");
    std::fs::write(&internet, "irrelevant").unwrap();
    std::fs::write(&happiness, HAPPINESS_CSV).unwrap();

    let result = analyze_files(AtlasConfig::default(), &internet, &happiness).await;
    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
}

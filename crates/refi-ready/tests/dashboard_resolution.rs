use refi_ready::workflows::ingest::RawSources;
use refi_ready::workflows::refinance::domain::{MarketingCategory, RawTable};
use refi_ready::workflows::refinance::report::views::{LtvBucket, SpreadBucket};
use refi_ready::workflows::refinance::{
    evaluate_sources, ClassificationMode, DataProvenance, DataQualityReport, DataSourceResolver,
    DirectorySource, EligibilityEngine, FallbackReason, ResolveError, ResolveRequest,
};
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Copies the raw tables (and optionally the extracts) into a scratch data root.
fn scratch_root(with_extracts: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut folders = vec!["raw"];
    if with_extracts {
        folders.push("output");
    }

    for folder in folders {
        let target = dir.path().join(folder);
        std::fs::create_dir_all(&target).expect("create folder");
        for entry in std::fs::read_dir(fixtures().join(folder)).expect("fixture folder") {
            let entry = entry.expect("fixture entry");
            std::fs::copy(entry.path(), target.join(entry.file_name())).expect("copy fixture");
        }
    }
    dir
}

fn resolver(root: &Path) -> DataSourceResolver<DirectorySource> {
    DataSourceResolver::new(DirectorySource::new(root), EligibilityEngine::default())
}

#[test]
fn fixture_extract_is_served_and_enriched() {
    let resolved = resolver(&fixtures())
        .resolve(ResolveRequest::default())
        .expect("fixtures resolve");

    match &resolved.provenance {
        DataProvenance::Precomputed {
            extract_key,
            enriched,
            matched_rows,
            unmatched_rows,
            ..
        } => {
            assert_eq!(extract_key, "output/audience-20240501.csv");
            assert!(enriched);
            assert_eq!((*matched_rows, *unmatched_rows), (4, 0));
        }
        other => panic!("expected the scheduled extract, got {other:?}"),
    }

    assert_eq!(resolved.audience.len(), 4);
    assert!(resolved.audience.iter().all(|record| record.detail.is_some()));
    assert_eq!(resolved.population.len(), 8);

    let summary = resolved.summary(10);
    assert_eq!(summary.kpis.total_monthly_savings, 775.5);
    assert_eq!(summary.kpis.ltv_sample_size, 4);
    assert!(summary.kpis.average_ltv_ratio.is_some());
    assert_eq!(summary.ltv_spread_matrix.cells.len(), 16);
}

#[test]
fn fallback_output_equals_a_direct_join_and_classify() {
    let root = scratch_root(false);
    let resolved = resolver(root.path())
        .resolve(ResolveRequest::default())
        .expect("raw fallback");

    assert!(matches!(
        resolved.provenance,
        DataProvenance::Derived {
            reason: FallbackReason::NoExtract,
            ..
        }
    ));

    let mut quality = DataQualityReport::new();
    let sources = RawSources::from_dir(fixtures().join("raw"), &mut quality).expect("raw parses");
    let direct = evaluate_sources(
        &sources,
        &EligibilityEngine::default(),
        ClassificationMode::Audience,
        &mut quality,
    );

    assert_eq!(resolved.audience, direct.audience);
    assert_eq!(resolved.population, direct.population);
    assert_eq!(resolved.quality.summary(), quality.summary());
}

#[test]
fn fixture_population_produces_expected_dashboard() {
    let root = scratch_root(false);
    let resolved = resolver(root.path())
        .resolve(ResolveRequest::default())
        .expect("raw fallback");

    let quality = resolved.quality.summary();
    assert_eq!(quality.duplicate_keys, 1);
    assert_eq!(quality.invalid_numeric_fields, 1);
    assert_eq!(quality.invalid_boolean_fields, 1);
    assert_eq!(quality.join_key_mismatches, 2);

    let summary = resolved.summary(3);
    assert_eq!(summary.kpis.audience_count, 4);
    assert_eq!(summary.kpis.total_monthly_savings, 775.5);
    assert_eq!(summary.population_count, 8);
    assert_eq!(summary.borrowers_on_file, 10);
    assert_eq!(summary.eligible_in_population, 4);

    let ranked: Vec<&str> = summary
        .top_opportunities
        .iter()
        .map(|view| view.borrower_id.as_str())
        .collect();
    assert_eq!(ranked, vec!["B001", "B007", "B002"]);

    let counts: Vec<(MarketingCategory, usize)> = summary
        .category_distribution
        .iter()
        .map(|entry| (entry.category, entry.count))
        .collect();
    assert_eq!(
        counts,
        vec![
            (MarketingCategory::ImmediateAction, 2),
            (MarketingCategory::HotLead, 2),
            (MarketingCategory::Watchlist, 0),
            (MarketingCategory::Ineligible, 0),
        ]
    );

    let matrix = &summary.ltv_spread_matrix;
    assert_eq!(matrix.cells.len(), 16);
    assert_eq!(matrix.unbinned, 1);
    assert_eq!(matrix.binned_total(), 7);
    assert_eq!(matrix.count(LtvBucket::From70To80, SpreadBucket::From100To150), 2);
    assert_eq!(matrix.count(LtvBucket::From80To100, SpreadBucket::From150Up), 1);
    assert_eq!(matrix.count(LtvBucket::Under60, SpreadBucket::Under050), 1);

    let paperless = &summary.engagement_breakdown[0];
    assert_eq!((paperless.yes, paperless.no), (6, 2));
    assert_eq!(paperless.yes_pct, Some(75.0));

    let insights = summary.insights();
    assert_eq!(insights.eligibility_rate_pct, Some(40.0));
    assert_eq!(
        insights.top_opportunities[0],
        "John Doe - 5.5% \u{2192} 4.0% ($250/mo savings)"
    );
}

#[test]
fn population_mode_reaches_the_ineligible_tier() {
    let resolved = resolver(&fixtures())
        .resolve(ResolveRequest {
            mode: ClassificationMode::FullPopulation,
            force_raw: false,
        })
        .expect("population derivation");

    assert_eq!(resolved.audience.len(), 8);
    let tier_of = |id: &str| {
        resolved
            .audience
            .iter()
            .find(|record| record.borrower_id.as_str() == id)
            .map(|record| record.marketing_category)
    };
    assert_eq!(tier_of("B003"), Some(MarketingCategory::Watchlist));
    assert_eq!(tier_of("B004"), Some(MarketingCategory::ImmediateAction));
    assert_eq!(tier_of("B006"), Some(MarketingCategory::Ineligible));
    assert_eq!(tier_of("B008"), None);
}

#[test]
fn missing_raw_table_without_extract_is_data_unavailable() {
    let root = scratch_root(false);
    std::fs::remove_file(root.path().join("raw").join(RawTable::BorrowerEngagement.file_name()))
        .expect("remove engagement table");

    let error = resolver(root.path())
        .resolve(ResolveRequest::default())
        .expect_err("nothing to serve");
    let ResolveError::DataUnavailable { raw, .. } = error;
    assert!(raw.contains("borrower_engagement.csv"));
}

#[test]
fn extract_survives_when_raw_tables_are_gone() {
    let root = scratch_root(true);
    std::fs::remove_dir_all(root.path().join("raw")).expect("remove raw folder");

    let resolved = resolver(root.path())
        .resolve(ResolveRequest::default())
        .expect("extract alone");
    assert!(matches!(
        resolved.provenance,
        DataProvenance::Precomputed { enriched: false, .. }
    ));
    assert_eq!(resolved.audience.len(), 4);
    assert!(resolved.population.is_empty());
    assert_eq!(resolved.summary(10).kpis.average_ltv_ratio, None);
}

//! Chooses between a precomputed audience extract and a fresh derivation from
//! the raw tables, and records which one was served.

mod extract;
mod source;

pub use source::{
    DataSource, DirectorySource, ExtractDescriptor, SourceError, DEFAULT_OUTPUT_PREFIX,
    DEFAULT_RAW_PREFIX,
};

use super::domain::{ClassifiedBorrowerRecord, RawTable, SpreadAnnotatedRecord};
use super::eligibility::{ClassificationMode, EligibilityEngine};
use super::quality::DataQualityReport;
use super::report::views::ReportSummary;
use super::report::AudienceReport;
use crate::workflows::ingest::RawSources;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;
use tracing::{info, warn};

/// Where a resolved audience came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataProvenance {
    Precomputed {
        extract_key: String,
        last_modified: DateTime<Utc>,
        /// Raw tables were readable and extract rows were matched against them.
        enriched: bool,
        /// Extract rows that found a raw record to enrich from.
        matched_rows: usize,
        /// Extract rows served without raw attributes such as LTV.
        unmatched_rows: usize,
    },
    Derived {
        raw_location: String,
        reason: FallbackReason,
    },
    /// Raw tables supplied directly by the caller.
    Inline,
}

impl DataProvenance {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Precomputed { .. } => "precomputed",
            Self::Derived { .. } => "derived",
            Self::Inline => "inline",
        }
    }
}

/// Why the raw tables were used instead of an extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoExtract,
    ExtractUnreadable(String),
    ExtractEmpty,
    Forced,
    /// Extracts only hold the eligible audience, so population analysis always derives.
    PopulationMode,
}

impl FallbackReason {
    pub fn describe(&self) -> String {
        match self {
            Self::NoExtract => "no audience extract found".to_string(),
            Self::ExtractUnreadable(detail) => format!("audience extract unreadable: {detail}"),
            Self::ExtractEmpty => "audience extract has no usable rows".to_string(),
            Self::Forced => "extract skipped on request".to_string(),
            Self::PopulationMode => "extract skipped for full-population analysis".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    pub mode: ClassificationMode,
    pub force_raw: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no audience data available (extract: {extract}; raw sources: {raw})")]
    DataUnavailable { extract: String, raw: String },
}

impl ResolveError {
    /// The fetch did not finish in time, which counts as both inputs being unavailable.
    pub fn timed_out(after: Duration) -> Self {
        let reason = SourceError::Timeout(after).to_string();
        Self::DataUnavailable {
            extract: reason.clone(),
            raw: reason,
        }
    }
}

/// An audience plus everything needed to report on it and audit where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAudience {
    pub provenance: DataProvenance,
    pub mode: ClassificationMode,
    pub audience: Vec<ClassifiedBorrowerRecord>,
    /// Spread-annotated raw population; empty when the raw tables were unreadable.
    pub population: Vec<SpreadAnnotatedRecord>,
    /// Rows in the raw borrower table; zero when the raw tables were unreadable.
    pub borrowers_on_file: usize,
    pub quality: DataQualityReport,
}

impl ResolvedAudience {
    /// Classifies caller-supplied raw tables without consulting any data source.
    pub fn from_inline(
        sources: &RawSources,
        engine: &EligibilityEngine,
        mode: ClassificationMode,
        mut quality: DataQualityReport,
    ) -> Self {
        let outcome = super::evaluate_sources(sources, engine, mode, &mut quality);
        Self {
            provenance: DataProvenance::Inline,
            mode,
            audience: outcome.audience,
            population: outcome.population,
            borrowers_on_file: sources.row_count(RawTable::BorrowerInformation),
            quality,
        }
    }

    pub fn report(&self) -> AudienceReport<'_> {
        AudienceReport::new(&self.audience, &self.population)
            .with_borrowers_on_file(self.borrowers_on_file)
    }

    pub fn summary(&self, top_n: usize) -> ReportSummary {
        self.report().summary(top_n)
    }
}

/// Serves audiences from a [`DataSource`], preferring the latest extract.
#[derive(Debug, Clone)]
pub struct DataSourceResolver<S> {
    source: S,
    engine: EligibilityEngine,
}

impl<S: DataSource> DataSourceResolver<S> {
    pub fn new(source: S, engine: EligibilityEngine) -> Self {
        Self { source, engine }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &EligibilityEngine {
        &self.engine
    }

    pub fn resolve(&self, request: ResolveRequest) -> Result<ResolvedAudience, ResolveError> {
        let mut quality = DataQualityReport::new();

        let reason = if request.mode == ClassificationMode::FullPopulation {
            FallbackReason::PopulationMode
        } else if request.force_raw {
            FallbackReason::Forced
        } else {
            match self.load_extract(&mut quality) {
                Ok((descriptor, audience)) => {
                    return Ok(self.enrich(descriptor, audience, request.mode, quality));
                }
                Err(reason) => reason,
            }
        };

        warn!(reason = %reason.describe(), "deriving audience from raw sources");
        let sources = self
            .load_raw(&mut quality)
            .map_err(|raw| ResolveError::DataUnavailable {
                extract: reason.describe(),
                raw,
            })?;

        let outcome = super::evaluate_sources(&sources, &self.engine, request.mode, &mut quality);
        info!(
            audience = outcome.audience.len(),
            population = outcome.population.len(),
            issues = quality.issues().len(),
            "audience derived from raw sources"
        );

        Ok(ResolvedAudience {
            provenance: DataProvenance::Derived {
                raw_location: self.source.raw_location(),
                reason,
            },
            mode: request.mode,
            audience: outcome.audience,
            population: outcome.population,
            borrowers_on_file: sources.row_count(RawTable::BorrowerInformation),
            quality,
        })
    }

    fn load_extract(
        &self,
        quality: &mut DataQualityReport,
    ) -> Result<(ExtractDescriptor, Vec<ClassifiedBorrowerRecord>), FallbackReason> {
        let extracts = self
            .source
            .list_extracts()
            .map_err(|err| FallbackReason::ExtractUnreadable(err.to_string()))?;
        let descriptor = extract::pick_latest(&extracts)
            .cloned()
            .ok_or(FallbackReason::NoExtract)?;

        let bytes = self
            .source
            .read_extract(&descriptor)
            .map_err(|err| FallbackReason::ExtractUnreadable(err.to_string()))?;
        let audience = extract::parse_extract(&bytes, &descriptor.key, &self.engine, quality)
            .map_err(|err| FallbackReason::ExtractUnreadable(err.to_string()))?;

        if audience.is_empty() {
            return Err(FallbackReason::ExtractEmpty);
        }

        info!(
            extract = %descriptor.key,
            last_modified = %descriptor.last_modified,
            rows = audience.len(),
            "serving precomputed audience extract"
        );
        Ok((descriptor, audience))
    }

    fn load_raw(&self, quality: &mut DataQualityReport) -> Result<RawSources, String> {
        let read = |table: RawTable| {
            self.source
                .read_raw(table)
                .map(Cursor::new)
                .map_err(|err| err.to_string())
        };

        RawSources::from_readers(
            read(RawTable::BorrowerInformation)?,
            read(RawTable::LoanInformation)?,
            read(RawTable::MarketEquity)?,
            read(RawTable::BorrowerEngagement)?,
            quality,
        )
        .map_err(|err| err.to_string())
    }

    /// Left-joins raw attributes onto extract rows. The extract's own spread,
    /// savings and category stay as published.
    fn enrich(
        &self,
        descriptor: ExtractDescriptor,
        mut audience: Vec<ClassifiedBorrowerRecord>,
        mode: ClassificationMode,
        mut quality: DataQualityReport,
    ) -> ResolvedAudience {
        let mut raw_quality = DataQualityReport::new();
        let (population, borrowers_on_file) = match self.load_raw(&mut raw_quality) {
            Ok(sources) => (
                super::evaluate_sources(&sources, &self.engine, mode, &mut raw_quality).population,
                sources.row_count(RawTable::BorrowerInformation),
            ),
            Err(err) => {
                warn!(error = %err, "raw sources unreadable; serving extract without enrichment");
                let provenance = DataProvenance::Precomputed {
                    extract_key: descriptor.key,
                    last_modified: descriptor.last_modified,
                    enriched: false,
                    matched_rows: 0,
                    unmatched_rows: audience.len(),
                };
                return ResolvedAudience {
                    provenance,
                    mode,
                    audience,
                    population: Vec::new(),
                    borrowers_on_file: 0,
                    quality,
                };
            }
        };
        quality.merge(raw_quality);

        let by_borrower: HashMap<&str, &SpreadAnnotatedRecord> = population
            .iter()
            .map(|record| (record.borrower_id.as_str(), record))
            .collect();

        let mut matched = 0;
        for record in &mut audience {
            if let Some(raw) = by_borrower.get(record.borrower_id.as_str()) {
                record.detail = Some(raw.detail());
                matched += 1;
            }
        }
        let unmatched = audience.len() - matched;
        if unmatched > 0 {
            warn!(
                rows = audience.len(),
                matched, unmatched, "extract rows missing from raw sources; served unenriched"
            );
        } else {
            info!(rows = audience.len(), "extract rows enriched from raw sources");
        }

        ResolvedAudience {
            provenance: DataProvenance::Precomputed {
                extract_key: descriptor.key,
                last_modified: descriptor.last_modified,
                enriched: true,
                matched_rows: matched,
                unmatched_rows: unmatched,
            },
            mode,
            audience,
            population,
            borrowers_on_file,
            quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    const IDENTITIES: &str = "borrower_id,first_name,last_name,property_id,city,state,credit_score\n\
B001,John,Doe,P001,Austin,TX,720\n\
B002,Jane,Roe,P002,Dallas,TX,680\n";
    const LOANS: &str = "borrower_id,current_interest_rate\nB001,5.5\nB002,5.5\n";
    const MARKETS: &str = "property_id,market_rate_offer,ltv_ratio,monthly_savings_est\n\
P001,4.0,65,250.00\n\
P002,4.0,85,250.00\n";
    const ENGAGEMENTS: &str = "borrower_id,paperless_billing,email_open_last_30d,mobile_app_login_last_30d,sms_opt_in\n\
B001,true,true,false,true\n\
B002,false,false,false,false\n";

    /// In-memory source; `None` for a raw table simulates an unreadable object.
    #[derive(Debug, Default)]
    struct MemorySource {
        raw: BTreeMap<RawTable, String>,
        extracts: Vec<(ExtractDescriptor, String)>,
        listing_fails: bool,
    }

    impl MemorySource {
        fn with_raw() -> Self {
            let mut raw = BTreeMap::new();
            raw.insert(RawTable::BorrowerInformation, IDENTITIES.to_string());
            raw.insert(RawTable::LoanInformation, LOANS.to_string());
            raw.insert(RawTable::MarketEquity, MARKETS.to_string());
            raw.insert(RawTable::BorrowerEngagement, ENGAGEMENTS.to_string());
            Self {
                raw,
                ..Self::default()
            }
        }

        fn with_extract(mut self, key: &str, body: &str) -> Self {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
            self.extracts
                .push((ExtractDescriptor::new(key, at), body.to_string()));
            self
        }
    }

    impl DataSource for MemorySource {
        fn raw_location(&self) -> String {
            "memory://raw".to_string()
        }

        fn list_extracts(&self) -> Result<Vec<ExtractDescriptor>, SourceError> {
            if self.listing_fails {
                return Err(SourceError::Unavailable("listing denied".to_string()));
            }
            Ok(self.extracts.iter().map(|(descriptor, _)| descriptor.clone()).collect())
        }

        fn read_extract(&self, extract: &ExtractDescriptor) -> Result<Vec<u8>, SourceError> {
            self.extracts
                .iter()
                .find(|(descriptor, _)| descriptor.key == extract.key)
                .map(|(_, body)| body.clone().into_bytes())
                .ok_or_else(|| SourceError::NotFound(extract.key.clone()))
        }

        fn read_raw(&self, table: RawTable) -> Result<Vec<u8>, SourceError> {
            self.raw
                .get(&table)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| SourceError::NotFound(table.file_name().to_string()))
        }
    }

    fn resolver(source: MemorySource) -> DataSourceResolver<MemorySource> {
        DataSourceResolver::new(source, EligibilityEngine::default())
    }

    const EXTRACT: &str = "borrower_id,name,rate_spread,monthly_savings_est,marketing_category\n\
B001,John Doe,1.5,250.00,Immediate Action\n\
B404,Ghost Borrower,1.1,80.00,Hot Lead\n";

    #[test]
    fn serves_latest_extract_and_enriches_known_borrowers() {
        let resolved = resolver(MemorySource::with_raw().with_extract("output/audience.csv", EXTRACT))
            .resolve(ResolveRequest::default())
            .expect("extract resolves");

        match &resolved.provenance {
            DataProvenance::Precomputed {
                extract_key,
                enriched,
                ..
            } => {
                assert_eq!(extract_key, "output/audience.csv");
                assert!(enriched);
            }
            other => panic!("expected precomputed provenance, got {other:?}"),
        }

        assert_eq!(resolved.audience.len(), 2);
        let john = resolved.audience[0].detail.as_ref().expect("B001 enriched");
        assert_eq!(john.ltv_ratio, 65.0);
        assert_eq!(john.city.as_deref(), Some("Austin"));
        assert!(resolved.audience[1].detail.is_none());
        assert_eq!(resolved.population.len(), 2);
        assert_eq!(resolved.borrowers_on_file, 2);
    }

    #[test]
    fn mostly_unmatched_extract_reports_partial_enrichment() {
        let extract = "borrower_id,name,rate_spread,monthly_savings_est,marketing_category\n\
B001,John Doe,1.5,250.00,Immediate Action\n\
B501,Ada Stone,1.4,200.00,Immediate Action\n\
B502,Lee Park,1.1,150.00,Hot Lead\n\
B503,Kim Wu,1.0,120.00,Hot Lead\n";
        let resolved = resolver(MemorySource::with_raw().with_extract("output/audience.csv", extract))
            .resolve(ResolveRequest::default())
            .expect("extract resolves");

        match &resolved.provenance {
            DataProvenance::Precomputed {
                enriched,
                matched_rows,
                unmatched_rows,
                ..
            } => {
                assert!(enriched);
                assert_eq!((*matched_rows, *unmatched_rows), (1, 3));
            }
            other => panic!("expected precomputed provenance, got {other:?}"),
        }

        let kpis = resolved.summary(10).kpis;
        assert_eq!(kpis.audience_count, 4);
        assert_eq!(kpis.ltv_sample_size, 1);
        assert_eq!(kpis.average_ltv_ratio, None);
    }

    #[test]
    fn extract_without_raw_tables_is_served_unenriched() {
        let source = MemorySource::default().with_extract("output/audience.csv", EXTRACT);
        let resolved = resolver(source)
            .resolve(ResolveRequest::default())
            .expect("extract alone is enough");

        assert!(matches!(
            resolved.provenance,
            DataProvenance::Precomputed {
                enriched: false,
                matched_rows: 0,
                unmatched_rows: 2,
                ..
            }
        ));
        assert!(resolved.population.is_empty());
        assert!(resolved.summary(10).insights().eligibility_rate_pct.is_none());
    }

    #[test]
    fn falls_back_to_raw_when_no_extract_exists() {
        let resolved = resolver(MemorySource::with_raw())
            .resolve(ResolveRequest::default())
            .expect("raw derivation");

        assert_eq!(
            resolved.provenance,
            DataProvenance::Derived {
                raw_location: "memory://raw".to_string(),
                reason: FallbackReason::NoExtract,
            }
        );
        assert_eq!(resolved.audience.len(), 1);
        assert_eq!(resolved.audience[0].borrower_id.as_str(), "B001");
        assert!(resolved.audience[0].detail.is_some());
    }

    #[test]
    fn unreadable_or_empty_extracts_fall_back() {
        let empty = resolver(
            MemorySource::with_raw()
                .with_extract("output/audience.csv", "borrower_id,name,rate_spread,monthly_savings_est\n"),
        )
        .resolve(ResolveRequest::default())
        .expect("falls back");
        assert!(matches!(
            empty.provenance,
            DataProvenance::Derived {
                reason: FallbackReason::ExtractEmpty,
                ..
            }
        ));

        let mut failing = MemorySource::with_raw();
        failing.listing_fails = true;
        let unreadable = resolver(failing)
            .resolve(ResolveRequest::default())
            .expect("falls back");
        match unreadable.provenance {
            DataProvenance::Derived {
                reason: FallbackReason::ExtractUnreadable(detail),
                ..
            } => assert!(detail.contains("listing denied")),
            other => panic!("expected unreadable extract, got {other:?}"),
        }
    }

    #[test]
    fn population_mode_and_forced_requests_skip_the_extract() {
        let source = MemorySource::with_raw().with_extract("output/audience.csv", EXTRACT);
        let resolver = resolver(source);

        let population = resolver
            .resolve(ResolveRequest {
                mode: ClassificationMode::FullPopulation,
                force_raw: false,
            })
            .expect("population derivation");
        assert_eq!(population.audience.len(), 2);
        assert!(matches!(
            population.provenance,
            DataProvenance::Derived {
                reason: FallbackReason::PopulationMode,
                ..
            }
        ));

        let forced = resolver
            .resolve(ResolveRequest {
                mode: ClassificationMode::Audience,
                force_raw: true,
            })
            .expect("forced derivation");
        assert_eq!(forced.audience.len(), 1);
        assert!(matches!(
            forced.provenance,
            DataProvenance::Derived {
                reason: FallbackReason::Forced,
                ..
            }
        ));
    }

    #[test]
    fn nothing_readable_is_data_unavailable() {
        let mut source = MemorySource::with_raw();
        source.raw.remove(&RawTable::MarketEquity);
        let error = resolver(source)
            .resolve(ResolveRequest::default())
            .expect_err("no data anywhere");

        let ResolveError::DataUnavailable { extract, raw } = error;
        assert_eq!(extract, "no audience extract found");
        assert!(raw.contains("market_equity.csv"));
    }

    #[test]
    fn provenance_serializes_with_kind_tag() {
        let provenance = DataProvenance::Derived {
            raw_location: "data/raw".to_string(),
            reason: FallbackReason::NoExtract,
        };
        let json = serde_json::to_value(&provenance).expect("serializes");
        assert_eq!(json["kind"], "derived");
        assert_eq!(json["reason"]["code"], "no_extract");
    }

    #[test]
    fn timeout_reads_as_unavailable() {
        let error = ResolveError::timed_out(Duration::from_secs(30));
        assert!(error.to_string().contains("timed out after 30s"));
    }
}

use super::source::{ExtractDescriptor, SourceError};
use crate::workflows::ingest::normalizer::{non_empty, normalize_header, normalize_key, parse_decimal};
use crate::workflows::ingest::parser::empty_string_as_none;
use crate::workflows::refinance::domain::{BorrowerId, ClassifiedBorrowerRecord, MarketingCategory};
use crate::workflows::refinance::eligibility::EligibilityEngine;
use crate::workflows::refinance::quality::{DataQualityKind, DataQualityReport};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

pub(crate) const EXTRACT_SOURCE: &str = "audience extract";

const REQUIRED_COLUMNS: &[&str] = &["borrower_id", "rate_spread", "monthly_savings_est"];
const NAME_COLUMNS: &[&str] = &["name", "full_name", "first_name"];

#[derive(Debug, Deserialize)]
struct ExtractRow {
    borrower_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    full_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    rate_spread: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    monthly_savings_est: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    marketing_category: Option<String>,
}

impl ExtractRow {
    fn display_name(&self) -> String {
        if let Some(name) = non_empty(self.name.clone()).or_else(|| non_empty(self.full_name.clone())) {
            return name.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Picks the extract to serve: the newest non-fallback CSV, or the newest
/// fallback CSV when nothing else was ever produced.
pub(crate) fn pick_latest(extracts: &[ExtractDescriptor]) -> Option<&ExtractDescriptor> {
    let newest = |fallback: bool| {
        extracts
            .iter()
            .filter(|extract| extract.is_csv() && extract.fallback == fallback)
            .max_by(|left, right| {
                left.last_modified
                    .cmp(&right.last_modified)
                    .then_with(|| left.key.cmp(&right.key))
            })
    };

    newest(false).or_else(|| newest(true))
}

/// Parses a precomputed audience extract.
///
/// Rows with an unusable spread or savings value are reported and skipped.
/// A missing or unknown category label is re-derived from the spread.
pub(crate) fn parse_extract(
    bytes: &[u8],
    key: &str,
    engine: &EligibilityEngine,
    quality: &mut DataQualityReport,
) -> Result<Vec<ClassifiedBorrowerRecord>, SourceError> {
    let csv_error = |source: csv::Error| SourceError::Csv {
        key: key.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(normalize_header)
        .collect::<csv::StringRecord>();

    let has = |column: &str| headers.iter().any(|header| header == column);
    if let Some(column) = REQUIRED_COLUMNS.iter().find(|column| !has(**column)) {
        return Err(SourceError::MissingColumn {
            key: key.to_string(),
            column: *column,
        });
    }
    if !NAME_COLUMNS.iter().any(|column| has(*column)) {
        return Err(SourceError::MissingColumn {
            key: key.to_string(),
            column: "name",
        });
    }

    reader.set_headers(headers);

    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for row in reader.deserialize::<ExtractRow>() {
        let row = row.map_err(csv_error)?;
        let borrower_id = normalize_key(&row.borrower_id);
        if borrower_id.is_empty() {
            quality.record(
                DataQualityKind::JoinKeyMismatch,
                EXTRACT_SOURCE,
                "",
                "row has an empty borrower_id",
            );
            continue;
        }

        if !seen.insert(borrower_id.clone()) {
            quality.record(
                DataQualityKind::DuplicateKey,
                EXTRACT_SOURCE,
                borrower_id,
                "borrower_id repeated; first occurrence kept",
            );
            continue;
        }

        let spread = parse_decimal(row.rate_spread.as_deref());
        let savings = parse_decimal(row.monthly_savings_est.as_deref());
        let (Some(rate_spread), Some(monthly_savings_est)) = (spread.value(), savings.value()) else {
            let detail = [("rate_spread", &spread), ("monthly_savings_est", &savings)]
                .into_iter()
                .filter(|(_, field)| field.value().is_none())
                .map(|(column, field)| format!("{column} is {}", field.describe()))
                .collect::<Vec<_>>()
                .join("; ");
            quality.record(
                DataQualityKind::InvalidNumericField,
                EXTRACT_SOURCE,
                borrower_id,
                format!("{detail}; row skipped"),
            );
            continue;
        };

        let marketing_category = match row.marketing_category.as_deref() {
            Some(label) => MarketingCategory::from_label(label).unwrap_or_else(|| {
                warn!(borrower_id = %borrower_id, label, "unknown category label; re-derived from spread");
                engine.category_for(rate_spread)
            }),
            None => engine.category_for(rate_spread),
        };

        records.push(ClassifiedBorrowerRecord {
            full_name: row.display_name(),
            borrower_id: BorrowerId::new(borrower_id),
            rate_spread,
            monthly_savings_est,
            marketing_category,
            detail: None,
        });
    }

    debug!(extract = key, rows = records.len(), "audience extract parsed");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(csv: &str) -> (Vec<ClassifiedBorrowerRecord>, DataQualityReport) {
        let mut quality = DataQualityReport::new();
        let rows = parse_extract(
            csv.as_bytes(),
            "output/audience.csv",
            &EligibilityEngine::default(),
            &mut quality,
        )
        .expect("extract parses");
        (rows, quality)
    }

    #[test]
    fn reads_extract_rows_as_classified_records() {
        let (rows, quality) = parse(
            "borrower_id,name,rate_spread,monthly_savings_est,marketing_category\n\
B001,John  Doe,1.5,250.00,Immediate Action\n\
B002,Jane Roe,1.1,120,hot lead\n",
        );

        assert!(quality.is_clean());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].full_name, "John Doe");
        assert_eq!(rows[0].marketing_category, MarketingCategory::ImmediateAction);
        assert_eq!(rows[1].marketing_category, MarketingCategory::HotLead);
        assert!(rows.iter().all(|row| row.detail.is_none()));
    }

    #[test]
    fn unknown_category_is_rederived_from_spread() {
        let (rows, _) = parse(
            "Borrower ID,First Name,Last Name,Rate Spread,Monthly Savings Est,Marketing Category\n\
B003,Ann,Lee,1.25,90,Priority\n\
B004,Bo,Kim,1.6,300,\n",
        );

        assert_eq!(rows[0].full_name, "Ann Lee");
        assert_eq!(rows[0].marketing_category, MarketingCategory::HotLead);
        assert_eq!(rows[1].marketing_category, MarketingCategory::ImmediateAction);
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let (rows, quality) = parse(
            "borrower_id,name,rate_spread,monthly_savings_est,marketing_category\n\
B001,John Doe,abc,250,Immediate Action\n\
B002,Jane Roe,1.2,,Hot Lead\n\
B003,Ann Lee,1.4,150,Immediate Action\n\
B003,Ann Lee,1.4,150,Immediate Action\n",
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].borrower_id.as_str(), "B003");
        assert_eq!(quality.count(DataQualityKind::InvalidNumericField), 2);
        assert_eq!(quality.count(DataQualityKind::DuplicateKey), 1);
        assert!(quality.issues()[1].detail.contains("monthly_savings_est is missing"));
    }

    #[test]
    fn missing_columns_fail_the_extract() {
        let mut quality = DataQualityReport::new();
        let error = parse_extract(
            b"borrower_id,name,monthly_savings_est\nB001,John Doe,250\n",
            "output/audience.csv",
            &EligibilityEngine::default(),
            &mut quality,
        )
        .expect_err("rate_spread required");
        assert!(matches!(
            error,
            SourceError::MissingColumn { column: "rate_spread", .. }
        ));
    }

    #[test]
    fn latest_prefers_scheduled_over_fallback_extracts() {
        let at = |hour| Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        let extracts = vec![
            ExtractDescriptor::new("output/audience-a.csv", at(8)),
            ExtractDescriptor::new("output/fallback-audience.csv", at(12)),
            ExtractDescriptor::new("output/audience-b.csv", at(10)),
            ExtractDescriptor::new("output/audience-c.csv.metadata", at(11)),
        ];

        assert_eq!(
            pick_latest(&extracts).map(|extract| extract.key.as_str()),
            Some("output/audience-b.csv")
        );
        assert_eq!(
            pick_latest(&extracts[1..2]).map(|extract| extract.key.as_str()),
            Some("output/fallback-audience.csv")
        );
        assert!(pick_latest(&extracts[3..]).is_none());
    }
}

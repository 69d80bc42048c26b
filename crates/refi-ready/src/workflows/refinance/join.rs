use super::domain::{RawTable, UnifiedBorrowerRecord};
use super::quality::{DataQualityKind, DataQualityReport};
use crate::workflows::ingest::RawSources;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::{info, warn};

/// Inner-joins the four raw sources into one record per borrower.
///
/// Identity rows drive the output order. Loan and engagement rows match on
/// `borrower_id`, market rows on the identity's `property_id`. Within each
/// source the first row for a key wins; later duplicates are reported and
/// ignored so a repeated key can never multiply output rows.
pub fn join_sources(
    sources: &RawSources,
    quality: &mut DataQualityReport,
) -> Vec<UnifiedBorrowerRecord> {
    let loans = index_first(
        &sources.loans,
        |row| row.borrower_id.as_str(),
        RawTable::LoanInformation,
        quality,
    );
    let markets = index_first(
        &sources.markets,
        |row| row.property_id.as_str(),
        RawTable::MarketEquity,
        quality,
    );
    let engagements = index_first(
        &sources.engagements,
        |row| row.borrower_id.as_str(),
        RawTable::BorrowerEngagement,
        quality,
    );

    let mut seen_borrowers: HashSet<&str> = HashSet::new();
    let mut used_properties: HashSet<&str> = HashSet::new();
    let mut records = Vec::new();

    for identity in &sources.identities {
        let borrower_id = identity.borrower_id.as_str();
        if borrower_id.is_empty() {
            quality.record(
                DataQualityKind::JoinKeyMismatch,
                RawTable::BorrowerInformation.label(),
                "",
                "row has an empty borrower_id",
            );
            continue;
        }

        if !seen_borrowers.insert(borrower_id) {
            quality.record(
                DataQualityKind::DuplicateKey,
                RawTable::BorrowerInformation.label(),
                borrower_id,
                "borrower_id repeated; first occurrence kept",
            );
            continue;
        }

        let property_id = identity.property_id.as_str();
        used_properties.insert(property_id);

        let loan = loans.get(borrower_id);
        let market = markets.get(property_id);
        let engagement = engagements.get(borrower_id);

        let (Some(loan), Some(market), Some(engagement)) = (loan, market, engagement) else {
            let missing = [
                (loan.is_none(), RawTable::LoanInformation),
                (market.is_none(), RawTable::MarketEquity),
                (engagement.is_none(), RawTable::BorrowerEngagement),
            ]
            .into_iter()
            .filter(|(absent, _)| *absent)
            .map(|(_, table)| table.label())
            .collect::<Vec<_>>()
            .join(", ");

            quality.record(
                DataQualityKind::JoinKeyMismatch,
                RawTable::BorrowerInformation.label(),
                borrower_id,
                format!("no matching {missing} row"),
            );
            continue;
        };

        if let Some(loan_property) = &loan.property_id {
            if loan_property != &identity.property_id {
                warn!(
                    borrower_id,
                    identity_property = property_id,
                    loan_property = loan_property.as_str(),
                    "loan row names a different property; identity property used for the join"
                );
            }
        }

        records.push(UnifiedBorrowerRecord {
            identity: identity.clone(),
            loan: (*loan).clone(),
            market: (*market).clone(),
            engagement: (*engagement).clone(),
        });
    }

    report_orphans(
        loans.keys().copied(),
        &seen_borrowers,
        RawTable::LoanInformation,
        quality,
    );
    report_orphans(
        markets.keys().copied(),
        &used_properties,
        RawTable::MarketEquity,
        quality,
    );
    report_orphans(
        engagements.keys().copied(),
        &seen_borrowers,
        RawTable::BorrowerEngagement,
        quality,
    );

    info!(
        identities = sources.identities.len(),
        unified = records.len(),
        "raw sources joined"
    );

    records
}

fn index_first<'a, T, K, F>(
    rows: &'a [T],
    key_of: F,
    table: RawTable,
    quality: &mut DataQualityReport,
) -> HashMap<K, &'a T>
where
    K: Eq + Hash + AsRef<str> + 'a,
    F: Fn(&'a T) -> K,
{
    let mut index: HashMap<K, &'a T> = HashMap::with_capacity(rows.len());

    for row in rows {
        let key = key_of(row);
        if key.as_ref().is_empty() {
            quality.record(
                DataQualityKind::JoinKeyMismatch,
                table.label(),
                "",
                "row has an empty join key",
            );
            continue;
        }

        if index.contains_key(&key) {
            quality.record(
                DataQualityKind::DuplicateKey,
                table.label(),
                key.as_ref(),
                "join key repeated; first occurrence kept",
            );
            continue;
        }

        index.insert(key, row);
    }

    index
}

fn report_orphans<'a>(
    keys: impl Iterator<Item = &'a str>,
    matched: &HashSet<&str>,
    table: RawTable,
    quality: &mut DataQualityReport,
) {
    // Sorted so the issue list is reproducible regardless of hash order.
    let mut orphans: Vec<&str> = keys.filter(|key| !matched.contains(key)).collect();
    orphans.sort_unstable();

    for key in orphans {
        quality.record(
            DataQualityKind::JoinKeyMismatch,
            table.label(),
            key,
            "no matching borrower information row",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::refinance::domain::{
        BorrowerId, EngagementSignals, NumericField, PropertyId, RawBorrowerIdentity,
        RawEngagement, RawLoanInfo, RawMarketEquity,
    };

    fn identity(borrower: &str, property: &str) -> RawBorrowerIdentity {
        RawBorrowerIdentity {
            borrower_id: BorrowerId::new(borrower),
            first_name: format!("First{borrower}"),
            last_name: "Tester".to_string(),
            property_id: PropertyId::new(property),
            email: None,
            phone: None,
            city: None,
            state: None,
            credit_score: None,
        }
    }

    fn loan(borrower: &str, rate: f64) -> RawLoanInfo {
        RawLoanInfo {
            borrower_id: BorrowerId::new(borrower),
            property_id: None,
            current_interest_rate: NumericField::Value(rate),
        }
    }

    fn market(property: &str, offer: f64) -> RawMarketEquity {
        RawMarketEquity {
            property_id: PropertyId::new(property),
            market_rate_offer: NumericField::Value(offer),
            ltv_ratio: NumericField::Value(65.0),
            monthly_savings_est: NumericField::Value(100.0),
        }
    }

    fn engagement(borrower: &str) -> RawEngagement {
        RawEngagement {
            borrower_id: BorrowerId::new(borrower),
            signals: EngagementSignals::default(),
        }
    }

    #[test]
    fn emits_only_borrowers_present_in_all_sources_in_identity_order() {
        let sources = RawSources {
            identities: vec![
                identity("B003", "P003"),
                identity("B001", "P001"),
                identity("B002", "P002"),
            ],
            loans: vec![loan("B001", 5.5), loan("B002", 6.0), loan("B003", 7.0)],
            markets: vec![market("P001", 4.0), market("P003", 4.2)],
            engagements: vec![engagement("B001"), engagement("B003")],
        };

        let mut quality = DataQualityReport::new();
        let records = join_sources(&sources, &mut quality);

        let ids: Vec<&str> = records.iter().map(|r| r.borrower_id().as_str()).collect();
        assert_eq!(ids, vec!["B003", "B001"]);
        assert_eq!(quality.count(DataQualityKind::JoinKeyMismatch), 1);
        assert!(quality.issues()[0].detail.contains("market equity"));
        assert!(quality.issues()[0].detail.contains("borrower engagement"));
    }

    #[test]
    fn duplicate_keys_keep_first_match_without_multiplying_rows() {
        let sources = RawSources {
            identities: vec![identity("B001", "P001")],
            loans: vec![loan("B001", 5.5), loan("B001", 9.9)],
            markets: vec![market("P001", 4.0), market("P001", 1.0)],
            engagements: vec![engagement("B001"), engagement("B001")],
        };

        let mut quality = DataQualityReport::new();
        let records = join_sources(&sources, &mut quality);

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].loan.current_interest_rate,
            NumericField::Value(5.5)
        );
        assert_eq!(records[0].market.market_rate_offer, NumericField::Value(4.0));
        assert_eq!(quality.count(DataQualityKind::DuplicateKey), 3);
    }

    #[test]
    fn shared_property_joins_each_borrower_once() {
        let sources = RawSources {
            identities: vec![identity("B001", "P001"), identity("B002", "P001")],
            loans: vec![loan("B001", 5.5), loan("B002", 6.5)],
            markets: vec![market("P001", 4.0)],
            engagements: vec![engagement("B001"), engagement("B002")],
        };

        let mut quality = DataQualityReport::new();
        let records = join_sources(&sources, &mut quality);
        assert_eq!(records.len(), 2);
        assert!(quality.is_clean());
    }

    #[test]
    fn loan_property_stays_source_qualified() {
        let mut qualified_loan = loan("B001", 5.5);
        qualified_loan.property_id = Some(PropertyId::new("P999"));
        let sources = RawSources {
            identities: vec![identity("B001", "P001")],
            loans: vec![qualified_loan],
            markets: vec![market("P001", 4.0)],
            engagements: vec![engagement("B001")],
        };

        let mut quality = DataQualityReport::new();
        let records = join_sources(&sources, &mut quality);
        assert_eq!(records[0].property_id().as_str(), "P001");
        assert_eq!(
            records[0].loan.property_id.as_ref().map(PropertyId::as_str),
            Some("P999")
        );
    }

    #[test]
    fn orphan_rows_are_informational_mismatches() {
        let sources = RawSources {
            identities: vec![identity("B001", "P001")],
            loans: vec![loan("B001", 5.5), loan("B404", 6.0)],
            markets: vec![market("P001", 4.0), market("P404", 4.0)],
            engagements: vec![engagement("B001")],
        };

        let mut quality = DataQualityReport::new();
        let records = join_sources(&sources, &mut quality);
        assert_eq!(records.len(), 1);

        let orphan_keys: Vec<&str> = quality
            .issues()
            .iter()
            .filter(|issue| issue.kind == DataQualityKind::JoinKeyMismatch)
            .map(|issue| issue.key.as_str())
            .collect();
        assert_eq!(orphan_keys, vec!["B404", "P404"]);
    }
}

use super::normalizer::{non_empty, normalize_header, normalize_key, parse_decimal, parse_flag};
use super::IngestError;
use crate::workflows::refinance::domain::{
    BorrowerId, EngagementSignal, EngagementSignals, PropertyId, RawBorrowerIdentity,
    RawEngagement, RawLoanInfo, RawMarketEquity, RawTable,
};
use crate::workflows::refinance::quality::{DataQualityKind, DataQualityReport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use tracing::debug;

const IDENTITY_COLUMNS: &[&str] = &["borrower_id", "first_name", "last_name", "property_id"];
const LOAN_COLUMNS: &[&str] = &["borrower_id", "current_interest_rate"];
const MARKET_COLUMNS: &[&str] = &[
    "property_id",
    "market_rate_offer",
    "ltv_ratio",
    "monthly_savings_est",
];
const ENGAGEMENT_COLUMNS: &[&str] = &[
    "borrower_id",
    "paperless_billing",
    "email_open_last_30d",
    "mobile_app_login_last_30d",
    "sms_opt_in",
];

/// Reads every row of `reader` as `T` after normalizing and validating the header.
pub(crate) fn read_rows<R, T>(
    reader: R,
    table: RawTable,
    required: &[&'static str],
) -> Result<Vec<T>, IngestError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| IngestError::Csv { table, source })?
        .iter()
        .map(normalize_header)
        .collect::<csv::StringRecord>();

    if let Some(column) = required
        .iter()
        .find(|column| !headers.iter().any(|header| header == **column))
    {
        return Err(IngestError::MissingColumn {
            table,
            column: *column,
        });
    }

    csv_reader.set_headers(headers);

    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<T>() {
        rows.push(record.map_err(|source| IngestError::Csv { table, source })?);
    }

    debug!(table = table.label(), rows = rows.len(), "source parsed");
    Ok(rows)
}

pub(crate) fn parse_identities<R: Read>(reader: R) -> Result<Vec<RawBorrowerIdentity>, IngestError> {
    let rows: Vec<IdentityRow> = read_rows(reader, RawTable::BorrowerInformation, IDENTITY_COLUMNS)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let credit_score = row.credit_score.as_deref().and_then(|raw| {
                let parsed = raw.trim().parse::<u16>().ok();
                if parsed.is_none() {
                    debug!(borrower_id = %row.borrower_id, value = raw, "ignoring unparseable credit score");
                }
                parsed
            });

            RawBorrowerIdentity {
                borrower_id: BorrowerId(normalize_key(&row.borrower_id)),
                first_name: row.first_name,
                last_name: row.last_name,
                property_id: PropertyId(normalize_key(&row.property_id)),
                email: non_empty(row.email),
                phone: non_empty(row.phone),
                city: non_empty(row.city),
                state: non_empty(row.state),
                credit_score,
            }
        })
        .collect())
}

pub(crate) fn parse_loans<R: Read>(reader: R) -> Result<Vec<RawLoanInfo>, IngestError> {
    let rows: Vec<LoanRow> = read_rows(reader, RawTable::LoanInformation, LOAN_COLUMNS)?;

    Ok(rows
        .into_iter()
        .map(|row| RawLoanInfo {
            borrower_id: BorrowerId(normalize_key(&row.borrower_id)),
            property_id: non_empty(row.property_id).map(|id| PropertyId(normalize_key(&id))),
            current_interest_rate: parse_decimal(row.current_interest_rate.as_deref()),
        })
        .collect())
}

pub(crate) fn parse_markets<R: Read>(reader: R) -> Result<Vec<RawMarketEquity>, IngestError> {
    let rows: Vec<MarketRow> = read_rows(reader, RawTable::MarketEquity, MARKET_COLUMNS)?;

    Ok(rows
        .into_iter()
        .map(|row| RawMarketEquity {
            property_id: PropertyId(normalize_key(&row.property_id)),
            market_rate_offer: parse_decimal(row.market_rate_offer.as_deref()),
            ltv_ratio: parse_decimal(row.ltv_ratio.as_deref()),
            monthly_savings_est: parse_decimal(row.monthly_savings_est.as_deref()),
        })
        .collect())
}

pub(crate) fn parse_engagements<R: Read>(
    reader: R,
    quality: &mut DataQualityReport,
) -> Result<Vec<RawEngagement>, IngestError> {
    let rows: Vec<EngagementRow> =
        read_rows(reader, RawTable::BorrowerEngagement, ENGAGEMENT_COLUMNS)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let borrower_id = BorrowerId(normalize_key(&row.borrower_id));
            let mut signals = EngagementSignals::default();

            for (signal, raw) in [
                (EngagementSignal::PaperlessBilling, &row.paperless_billing),
                (EngagementSignal::EmailOpenLast30d, &row.email_open_last_30d),
                (
                    EngagementSignal::MobileAppLoginLast30d,
                    &row.mobile_app_login_last_30d,
                ),
                (EngagementSignal::SmsOptIn, &row.sms_opt_in),
            ] {
                match raw.as_deref().and_then(parse_flag) {
                    Some(value) => signals.set(signal, value),
                    None => quality.record(
                        DataQualityKind::InvalidBooleanField,
                        RawTable::BorrowerEngagement.label(),
                        borrower_id.as_str(),
                        format!(
                            "{} value {:?} is not boolean; treated as false",
                            signal.column(),
                            raw.as_deref().unwrap_or("")
                        ),
                    ),
                }
            }

            RawEngagement {
                borrower_id,
                signals,
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct IdentityRow {
    borrower_id: String,
    first_name: String,
    last_name: String,
    property_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    city: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    credit_score: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoanRow {
    borrower_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    property_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    current_interest_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    property_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    market_rate_offer: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    ltv_ratio: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    monthly_savings_est: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EngagementRow {
    borrower_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    paperless_billing: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email_open_last_30d: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    mobile_app_login_last_30d: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    sms_opt_in: Option<String>,
}

pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

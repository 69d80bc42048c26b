use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque borrower identifier shared by identity, loan and engagement sources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowerId(pub String);

impl BorrowerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BorrowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque property identifier linking identity rows to market rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four raw tables a unified record is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTable {
    BorrowerInformation,
    LoanInformation,
    MarketEquity,
    BorrowerEngagement,
}

impl RawTable {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::BorrowerInformation,
            Self::LoanInformation,
            Self::MarketEquity,
            Self::BorrowerEngagement,
        ]
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::BorrowerInformation => "borrower_information.csv",
            Self::LoanInformation => "loan_information.csv",
            Self::MarketEquity => "market_equity.csv",
            Self::BorrowerEngagement => "borrower_engagement.csv",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::BorrowerInformation => "borrower information",
            Self::LoanInformation => "loan information",
            Self::MarketEquity => "market equity",
            Self::BorrowerEngagement => "borrower engagement",
        }
    }
}

impl fmt::Display for RawTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A numeric cell after schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericField {
    Value(f64),
    Missing,
    Invalid(String),
}

impl NumericField {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Missing | Self::Invalid(_) => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Value(value) => value.to_string(),
            Self::Missing => "missing".to_string(),
            Self::Invalid(raw) => format!("non-numeric value '{raw}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBorrowerIdentity {
    pub borrower_id: BorrowerId,
    pub first_name: String,
    pub last_name: String,
    pub property_id: PropertyId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub credit_score: Option<u16>,
}

impl RawBorrowerIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawLoanInfo {
    pub borrower_id: BorrowerId,
    /// Some loan exports repeat the property key; it never replaces the identity's.
    pub property_id: Option<PropertyId>,
    pub current_interest_rate: NumericField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMarketEquity {
    pub property_id: PropertyId,
    pub market_rate_offer: NumericField,
    pub ltv_ratio: NumericField,
    pub monthly_savings_est: NumericField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEngagement {
    pub borrower_id: BorrowerId,
    pub signals: EngagementSignals,
}

/// Boolean engagement axis tracked per borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementSignal {
    PaperlessBilling,
    EmailOpenLast30d,
    MobileAppLoginLast30d,
    SmsOptIn,
}

impl EngagementSignal {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::PaperlessBilling,
            Self::EmailOpenLast30d,
            Self::MobileAppLoginLast30d,
            Self::SmsOptIn,
        ]
    }

    pub const fn column(self) -> &'static str {
        match self {
            Self::PaperlessBilling => "paperless_billing",
            Self::EmailOpenLast30d => "email_open_last_30d",
            Self::MobileAppLoginLast30d => "mobile_app_login_last_30d",
            Self::SmsOptIn => "sms_opt_in",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PaperlessBilling => "Paperless Billing",
            Self::EmailOpenLast30d => "Email Opened (30d)",
            Self::MobileAppLoginLast30d => "Mobile App Login (30d)",
            Self::SmsOptIn => "SMS Opt-In",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSignals {
    pub paperless_billing: bool,
    pub email_open_last_30d: bool,
    pub mobile_app_login_last_30d: bool,
    pub sms_opt_in: bool,
}

impl EngagementSignals {
    pub const fn get(&self, signal: EngagementSignal) -> bool {
        match signal {
            EngagementSignal::PaperlessBilling => self.paperless_billing,
            EngagementSignal::EmailOpenLast30d => self.email_open_last_30d,
            EngagementSignal::MobileAppLoginLast30d => self.mobile_app_login_last_30d,
            EngagementSignal::SmsOptIn => self.sms_opt_in,
        }
    }

    pub fn set(&mut self, signal: EngagementSignal, value: bool) {
        match signal {
            EngagementSignal::PaperlessBilling => self.paperless_billing = value,
            EngagementSignal::EmailOpenLast30d => self.email_open_last_30d = value,
            EngagementSignal::MobileAppLoginLast30d => self.mobile_app_login_last_30d = value,
            EngagementSignal::SmsOptIn => self.sms_opt_in = value,
        }
    }
}

/// One row from each source, joined on `borrower_id` and `property_id`.
///
/// Each source keeps its own struct so that columns sharing a name across
/// sources stay qualified by where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedBorrowerRecord {
    pub identity: RawBorrowerIdentity,
    pub loan: RawLoanInfo,
    pub market: RawMarketEquity,
    pub engagement: RawEngagement,
}

impl UnifiedBorrowerRecord {
    pub fn borrower_id(&self) -> &BorrowerId {
        &self.identity.borrower_id
    }

    pub fn property_id(&self) -> &PropertyId {
        &self.identity.property_id
    }
}

/// Contact-priority tier derived from the rate spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketingCategory {
    ImmediateAction,
    HotLead,
    Watchlist,
    Ineligible,
}

impl MarketingCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::ImmediateAction,
            Self::HotLead,
            Self::Watchlist,
            Self::Ineligible,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ImmediateAction => "Immediate Action",
            Self::HotLead => "Hot Lead",
            Self::Watchlist => "Watchlist",
            Self::Ineligible => "Ineligible",
        }
    }

    /// Parses the label written into audience extracts.
    pub fn from_label(value: &str) -> Option<Self> {
        let wanted = value.trim();
        Self::ordered()
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for MarketingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated metrics plus the derived spread for one unified record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadAnnotatedRecord {
    pub borrower_id: BorrowerId,
    pub property_id: PropertyId,
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub credit_score: Option<u16>,
    pub current_interest_rate: f64,
    pub market_rate_offer: f64,
    pub ltv_ratio: f64,
    pub monthly_savings_est: f64,
    pub rate_spread: f64,
    pub engagement: EngagementSignals,
    /// Whether the record passed the audience filter.
    pub eligible: bool,
}

impl SpreadAnnotatedRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn detail(&self) -> BorrowerDetail {
        BorrowerDetail {
            property_id: self.property_id.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            credit_score: self.credit_score,
            current_interest_rate: self.current_interest_rate,
            market_rate_offer: self.market_rate_offer,
            ltv_ratio: self.ltv_ratio,
            engagement: self.engagement,
        }
    }
}

/// Source attributes carried alongside an audience record when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorrowerDetail {
    pub property_id: PropertyId,
    pub city: Option<String>,
    pub state: Option<String>,
    pub credit_score: Option<u16>,
    pub current_interest_rate: f64,
    pub market_rate_offer: f64,
    pub ltv_ratio: f64,
    pub engagement: EngagementSignals,
}

/// A tiered audience member, either derived from raw sources or read back
/// from a precomputed extract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedBorrowerRecord {
    pub borrower_id: BorrowerId,
    pub full_name: String,
    pub rate_spread: f64,
    pub monthly_savings_est: f64,
    pub marketing_category: MarketingCategory,
    /// Absent for extract rows that could not be matched against raw sources.
    pub detail: Option<BorrowerDetail>,
}

impl ClassifiedBorrowerRecord {
    pub(crate) fn from_annotated(record: &SpreadAnnotatedRecord, category: MarketingCategory) -> Self {
        Self {
            borrower_id: record.borrower_id.clone(),
            full_name: record.full_name(),
            rate_spread: record.rate_spread,
            monthly_savings_est: record.monthly_savings_est,
            marketing_category: category,
            detail: Some(record.detail()),
        }
    }

    pub fn ltv_ratio(&self) -> Option<f64> {
        self.detail.as_ref().map(|detail| detail.ltv_ratio)
    }
}

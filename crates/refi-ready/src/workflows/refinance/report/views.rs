use super::super::domain::{BorrowerId, EngagementSignal, MarketingCategory};
use super::super::eligibility::at_least;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub audience_count: usize,
    pub total_monthly_savings: f64,
    /// `None` when the audience is empty.
    pub average_rate_spread: Option<f64>,
    /// `None` unless every audience record carries an LTV ratio.
    pub average_ltv_ratio: Option<f64>,
    /// Audience records with a known LTV ratio.
    pub ltv_sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCountEntry {
    pub category: MarketingCategory,
    pub category_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBorrowerView {
    pub rank: usize,
    pub borrower_id: BorrowerId,
    pub full_name: String,
    pub monthly_savings_est: f64,
    pub rate_spread: f64,
    pub marketing_category: MarketingCategory,
    pub category_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_interest_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_rate_offer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltv_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<u16>,
}

/// LTV percentage bins: `[0,60)`, `[60,70)`, `[70,80)`, `[80,100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LtvBucket {
    Under60,
    From60To70,
    From70To80,
    From80To100,
}

impl LtvBucket {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Under60,
            Self::From60To70,
            Self::From70To80,
            Self::From80To100,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Under60 => "<60%",
            Self::From60To70 => "60-70%",
            Self::From70To80 => "70-80%",
            Self::From80To100 => "80-100%",
        }
    }

    pub fn of(ltv_ratio: f64) -> Option<Self> {
        match ltv_ratio {
            v if (0.0..60.0).contains(&v) => Some(Self::Under60),
            v if (60.0..70.0).contains(&v) => Some(Self::From60To70),
            v if (70.0..80.0).contains(&v) => Some(Self::From70To80),
            v if (80.0..=100.0).contains(&v) => Some(Self::From80To100),
            _ => None,
        }
    }
}

/// Rate-spread bins in percentage points: `[0,0.5)`, `[0.5,1.0)`, `[1.0,1.5)`, `[1.5,∞)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadBucket {
    Under050,
    From050To100,
    From100To150,
    From150Up,
}

impl SpreadBucket {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Under050,
            Self::From050To100,
            Self::From100To150,
            Self::From150Up,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Under050 => "0-0.5",
            Self::From050To100 => "0.5-1.0",
            Self::From100To150 => "1.0-1.5",
            Self::From150Up => "1.5+",
        }
    }

    /// Edges share the eligibility filter's tolerance, so a spread that passes
    /// the 1.0 minimum never lands in the `[0.5,1.0)` column.
    pub fn of(rate_spread: f64) -> Option<Self> {
        if !rate_spread.is_finite() || !at_least(rate_spread, 0.0) {
            return None;
        }

        let bucket = if at_least(rate_spread, 1.5) {
            Self::From150Up
        } else if at_least(rate_spread, 1.0) {
            Self::From100To150
        } else if at_least(rate_spread, 0.5) {
            Self::From050To100
        } else {
            Self::Under050
        };
        Some(bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCell {
    pub ltv_bucket: LtvBucket,
    pub ltv_label: &'static str,
    pub spread_bucket: SpreadBucket,
    pub spread_label: &'static str,
    pub count: usize,
}

/// Dense LTV x spread grid: always 16 cells, LTV-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketMatrix {
    pub cells: Vec<BucketCell>,
    /// Records whose LTV or spread falls outside every bin (e.g. a negative spread).
    pub unbinned: usize,
}

impl BucketMatrix {
    pub fn count(&self, ltv: LtvBucket, spread: SpreadBucket) -> usize {
        self.cells
            .iter()
            .find(|cell| cell.ltv_bucket == ltv && cell.spread_bucket == spread)
            .map(|cell| cell.count)
            .unwrap_or(0)
    }

    pub fn binned_total(&self) -> usize {
        self.cells.iter().map(|cell| cell.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalBreakdownEntry {
    pub signal: EngagementSignal,
    pub signal_label: &'static str,
    pub yes: usize,
    pub no: usize,
    /// `None` when the population under analysis is empty.
    pub yes_pct: Option<f64>,
    pub no_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub kpis: KpiSummary,
    pub category_distribution: Vec<CategoryCountEntry>,
    pub top_opportunities: Vec<RankedBorrowerView>,
    pub ltv_spread_matrix: BucketMatrix,
    pub engagement_breakdown: Vec<SignalBreakdownEntry>,
    /// Size of the population behind the matrix and engagement views.
    pub population_count: usize,
    /// Rows in the raw borrower table, before joining and validation.
    pub borrowers_on_file: usize,
    /// Population members passing the audience filter.
    pub eligible_in_population: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudienceInsights {
    pub borrowers_on_file: usize,
    pub population_count: usize,
    pub audience_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_rate_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_category: Option<&'static str>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_opportunities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<String>,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn percentage(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(round2(part as f64 / whole as f64 * 100.0))
    }
}

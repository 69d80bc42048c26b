use serde::{Deserialize, Serialize};

/// Thresholds for the audience filter and tier boundaries, in percentage points
/// (LTV as a 0-100 percentage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub max_ltv_ratio: f64,
    pub min_rate_spread: f64,
    pub immediate_action_above: f64,
    pub hot_lead_above: f64,
    pub watchlist_above: f64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            max_ltv_ratio: 80.0,
            min_rate_spread: 1.0,
            immediate_action_above: 1.25,
            hot_lead_above: 0.75,
            watchlist_above: 0.50,
        }
    }
}

/// Which records receive a marketing category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// Only records passing the LTV and minimum-spread filter are tiered.
    #[default]
    Audience,
    /// Every valid unified record is tiered by spread alone; `Ineligible` is reachable.
    FullPopulation,
}

impl ClassificationMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Audience => "Eligible audience",
            Self::FullPopulation => "Full population",
        }
    }
}

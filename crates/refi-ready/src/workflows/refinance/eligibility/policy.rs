use super::super::domain::MarketingCategory;
use super::config::EligibilityConfig;
use super::rules::{at_least, at_most, strictly_above};

/// Audience entry gate: enough equity and at least the minimum savings spread.
pub(crate) fn passes_filter(config: &EligibilityConfig, ltv_ratio: f64, rate_spread: f64) -> bool {
    at_most(ltv_ratio, config.max_ltv_ratio) && at_least(rate_spread, config.min_rate_spread)
}

/// Tier by spread magnitude alone. Boundaries are strict, so an exact
/// threshold value lands in the lower tier.
pub(crate) fn categorize(config: &EligibilityConfig, rate_spread: f64) -> MarketingCategory {
    if strictly_above(rate_spread, config.immediate_action_above) {
        MarketingCategory::ImmediateAction
    } else if strictly_above(rate_spread, config.hot_lead_above) {
        MarketingCategory::HotLead
    } else if strictly_above(rate_spread, config.watchlist_above) {
        MarketingCategory::Watchlist
    } else {
        MarketingCategory::Ineligible
    }
}

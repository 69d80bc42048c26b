use super::super::domain::{NumericField, SpreadAnnotatedRecord, UnifiedBorrowerRecord};

/// Absorbs binary noise such as `4.1 - 3.1 = 0.9999999999999996`.
pub(crate) const SPREAD_TOLERANCE: f64 = 1e-9;

pub(crate) struct InvalidField {
    pub column: &'static str,
    pub description: String,
}

/// Validates the numeric columns a classification needs and derives the spread.
pub(crate) fn annotate(
    record: &UnifiedBorrowerRecord,
) -> Result<SpreadAnnotatedRecord, Vec<InvalidField>> {
    let fields: [(&'static str, &NumericField); 4] = [
        (
            "current_interest_rate",
            &record.loan.current_interest_rate,
        ),
        ("market_rate_offer", &record.market.market_rate_offer),
        ("ltv_ratio", &record.market.ltv_ratio),
        ("monthly_savings_est", &record.market.monthly_savings_est),
    ];

    let invalid: Vec<InvalidField> = fields
        .iter()
        .filter(|(_, field)| field.value().is_none())
        .map(|(column, field)| InvalidField {
            column: *column,
            description: field.describe(),
        })
        .collect();

    let (Some(current_interest_rate), Some(market_rate_offer), Some(ltv_ratio), Some(monthly_savings_est)) = (
        fields[0].1.value(),
        fields[1].1.value(),
        fields[2].1.value(),
        fields[3].1.value(),
    ) else {
        return Err(invalid);
    };

    let identity = &record.identity;
    Ok(SpreadAnnotatedRecord {
        borrower_id: identity.borrower_id.clone(),
        property_id: identity.property_id.clone(),
        first_name: identity.first_name.clone(),
        last_name: identity.last_name.clone(),
        city: identity.city.clone(),
        state: identity.state.clone(),
        credit_score: identity.credit_score,
        current_interest_rate,
        market_rate_offer,
        ltv_ratio,
        monthly_savings_est,
        rate_spread: current_interest_rate - market_rate_offer,
        engagement: record.engagement.signals,
        eligible: false,
    })
}

pub(crate) fn at_most(value: f64, limit: f64) -> bool {
    value <= limit + SPREAD_TOLERANCE
}

pub(crate) fn at_least(value: f64, floor: f64) -> bool {
    value >= floor - SPREAD_TOLERANCE
}

pub(crate) fn strictly_above(value: f64, floor: f64) -> bool {
    value > floor + SPREAD_TOLERANCE
}

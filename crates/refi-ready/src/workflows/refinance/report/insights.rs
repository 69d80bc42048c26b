use super::views::{
    percentage, AudienceInsights, CategoryCountEntry, RankedBorrowerView, ReportSummary,
};
use std::cmp::Ordering;

const OPPORTUNITY_LIMIT: usize = 5;

pub(crate) fn generate_insights(summary: &ReportSummary) -> AudienceInsights {
    let audience_count = summary.kpis.audience_count;
    let population_count = summary.population_count;
    let borrowers_on_file = summary.borrowers_on_file;
    // Measured against every borrower on file, including rows the join dropped.
    let eligibility_rate_pct = percentage(summary.eligible_in_population, borrowers_on_file);

    let dominant_category = summary
        .category_distribution
        .iter()
        .filter(|entry| entry.count > 0)
        .max_by(|left, right| by_count_then_tier_order(left, right))
        .map(|entry| entry.category_label);

    let top_opportunities = summary
        .top_opportunities
        .iter()
        .take(OPPORTUNITY_LIMIT)
        .map(describe_opportunity)
        .collect();

    let mut observations = Vec::new();
    if audience_count == 0 {
        observations.push(
            "No eligible borrowers found; criteria are LTV ratio <= 80% and rate spread >= 1.0"
                .to_string(),
        );
    } else {
        observations.push(format!(
            "{audience_count} borrower(s) qualify with ${:.0}/mo combined savings potential",
            summary.kpis.total_monthly_savings
        ));
    }

    if let Some(rate) = eligibility_rate_pct {
        observations.push(format!(
            "{rate:.1}% of {borrowers_on_file} borrower(s) on file pass the eligibility filter"
        ));
    }

    if borrowers_on_file > population_count {
        observations.push(format!(
            "{} borrower(s) on file could not be analysed (missing join partner or invalid values)",
            borrowers_on_file - population_count
        ));
    }

    if let Some(label) = dominant_category {
        observations.push(format!("{label} is the largest marketing segment"));
    }

    if summary.ltv_spread_matrix.unbinned > 0 {
        observations.push(format!(
            "{} borrower(s) fall outside the LTV/spread grid (negative spread or LTV above 100%)",
            summary.ltv_spread_matrix.unbinned
        ));
    }

    AudienceInsights {
        borrowers_on_file,
        population_count,
        audience_count,
        eligibility_rate_pct,
        dominant_category,
        top_opportunities,
        observations,
    }
}

fn by_count_then_tier_order(left: &CategoryCountEntry, right: &CategoryCountEntry) -> Ordering {
    left.count
        .cmp(&right.count)
        .then_with(|| right.category.cmp(&left.category))
}

fn describe_opportunity(view: &RankedBorrowerView) -> String {
    match (view.current_interest_rate, view.market_rate_offer) {
        (Some(current), Some(offer)) => format!(
            "{} - {:.1}% \u{2192} {:.1}% (${:.0}/mo savings)",
            view.full_name, current, offer, view.monthly_savings_est
        ),
        _ => format!(
            "{} - {:.2} pt spread (${:.0}/mo savings)",
            view.full_name, view.rate_spread, view.monthly_savings_est
        ),
    }
}

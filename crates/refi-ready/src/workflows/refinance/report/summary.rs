use super::super::domain::{
    ClassifiedBorrowerRecord, EngagementSignal, MarketingCategory, SpreadAnnotatedRecord,
};
use super::views::{
    percentage, round2, AudienceInsights, BucketCell, BucketMatrix, CategoryCountEntry,
    KpiSummary, LtvBucket, RankedBorrowerView, ReportSummary, SignalBreakdownEntry, SpreadBucket,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DEFAULT_TOP_N: usize = 10;

/// Aggregates over one classified audience and the population it came from.
///
/// Every view is derived on demand from the borrowed slices; nothing is cached
/// and iteration follows input order, so identical inputs give identical output.
#[derive(Debug, Clone, Copy)]
pub struct AudienceReport<'a> {
    audience: &'a [ClassifiedBorrowerRecord],
    population: &'a [SpreadAnnotatedRecord],
    borrowers_on_file: Option<usize>,
}

impl<'a> AudienceReport<'a> {
    pub fn new(
        audience: &'a [ClassifiedBorrowerRecord],
        population: &'a [SpreadAnnotatedRecord],
    ) -> Self {
        Self {
            audience,
            population,
            borrowers_on_file: None,
        }
    }

    /// Raw borrower rows behind the population; defaults to the population size.
    pub fn with_borrowers_on_file(mut self, rows: usize) -> Self {
        self.borrowers_on_file = Some(rows);
        self
    }

    pub fn kpis(&self) -> KpiSummary {
        let audience_count = self.audience.len();
        let total_monthly_savings: f64 = self
            .audience
            .iter()
            .map(|record| record.monthly_savings_est)
            .sum();

        let average_rate_spread = mean(self.audience.iter().map(|record| record.rate_spread));
        let ltv_ratios: Vec<f64> = self
            .audience
            .iter()
            .filter_map(|record| record.ltv_ratio())
            .collect();
        let ltv_sample_size = ltv_ratios.len();
        // A mean over a subset would not be the audience mean.
        let average_ltv_ratio = if ltv_sample_size == audience_count {
            mean(ltv_ratios.into_iter())
        } else {
            None
        };

        KpiSummary {
            audience_count,
            total_monthly_savings,
            average_rate_spread,
            average_ltv_ratio,
            ltv_sample_size,
        }
    }

    /// Counts per category, listing every category even when empty.
    pub fn category_distribution(&self) -> Vec<CategoryCountEntry> {
        let mut counts: BTreeMap<MarketingCategory, usize> = BTreeMap::new();
        for record in self.audience {
            *counts.entry(record.marketing_category).or_default() += 1;
        }

        MarketingCategory::ordered()
            .into_iter()
            .map(|category| CategoryCountEntry {
                category,
                category_label: category.label(),
                count: counts.get(&category).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Highest savings first; equal savings ordered by ascending borrower id.
    pub fn top_opportunities(&self, limit: usize) -> Vec<RankedBorrowerView> {
        let mut ranked: Vec<&ClassifiedBorrowerRecord> = self.audience.iter().collect();
        ranked.sort_by(|left, right| rank_order(left, right));

        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, record)| {
                let detail = record.detail.as_ref();
                RankedBorrowerView {
                    rank: index + 1,
                    borrower_id: record.borrower_id.clone(),
                    full_name: record.full_name.clone(),
                    monthly_savings_est: round2(record.monthly_savings_est),
                    rate_spread: round2(record.rate_spread),
                    marketing_category: record.marketing_category,
                    category_label: record.marketing_category.label(),
                    current_interest_rate: detail.map(|d| round2(d.current_interest_rate)),
                    market_rate_offer: detail.map(|d| round2(d.market_rate_offer)),
                    ltv_ratio: detail.map(|d| round2(d.ltv_ratio)),
                    city: detail.and_then(|d| d.city.clone()),
                    state: detail.and_then(|d| d.state.clone()),
                    credit_score: detail.and_then(|d| d.credit_score),
                }
            })
            .collect()
    }

    pub fn ltv_spread_matrix(&self) -> BucketMatrix {
        let mut counts: BTreeMap<(LtvBucket, SpreadBucket), usize> = BTreeMap::new();
        let mut unbinned = 0;

        for record in self.population {
            match (
                LtvBucket::of(record.ltv_ratio),
                SpreadBucket::of(record.rate_spread),
            ) {
                (Some(ltv), Some(spread)) => *counts.entry((ltv, spread)).or_default() += 1,
                _ => unbinned += 1,
            }
        }

        let cells = LtvBucket::ordered()
            .into_iter()
            .flat_map(|ltv| {
                SpreadBucket::ordered()
                    .into_iter()
                    .map(move |spread| (ltv, spread))
            })
            .map(|(ltv, spread)| BucketCell {
                ltv_bucket: ltv,
                ltv_label: ltv.label(),
                spread_bucket: spread,
                spread_label: spread.label(),
                count: counts.get(&(ltv, spread)).copied().unwrap_or(0),
            })
            .collect();

        BucketMatrix { cells, unbinned }
    }

    pub fn engagement_breakdown(&self) -> Vec<SignalBreakdownEntry> {
        let total = self.population.len();

        EngagementSignal::ordered()
            .into_iter()
            .map(|signal| {
                let yes = self
                    .population
                    .iter()
                    .filter(|record| record.engagement.get(signal))
                    .count();
                let no = total - yes;
                SignalBreakdownEntry {
                    signal,
                    signal_label: signal.label(),
                    yes,
                    no,
                    yes_pct: percentage(yes, total),
                    no_pct: percentage(no, total),
                }
            })
            .collect()
    }

    pub fn summary(&self, top_n: usize) -> ReportSummary {
        ReportSummary {
            kpis: self.kpis(),
            category_distribution: self.category_distribution(),
            top_opportunities: self.top_opportunities(top_n),
            ltv_spread_matrix: self.ltv_spread_matrix(),
            engagement_breakdown: self.engagement_breakdown(),
            population_count: self.population.len(),
            borrowers_on_file: self.borrowers_on_file.unwrap_or(self.population.len()),
            eligible_in_population: self.population.iter().filter(|row| row.eligible).count(),
        }
    }
}

impl ReportSummary {
    pub fn insights(&self) -> AudienceInsights {
        super::generate_insights(self)
    }
}

fn rank_order(left: &ClassifiedBorrowerRecord, right: &ClassifiedBorrowerRecord) -> Ordering {
    right
        .monthly_savings_est
        .total_cmp(&left.monthly_savings_est)
        .then_with(|| left.borrower_id.cmp(&right.borrower_id))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

mod config;
mod policy;
mod rules;

pub use config::{ClassificationMode, EligibilityConfig};

pub(crate) use rules::at_least;

use super::domain::{
    ClassifiedBorrowerRecord, MarketingCategory, RawTable, SpreadAnnotatedRecord,
    UnifiedBorrowerRecord,
};
use super::quality::{DataQualityKind, DataQualityReport};
use tracing::info;

/// Stateless evaluator applying the eligibility thresholds to unified records.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEngine {
    config: EligibilityConfig,
}

impl EligibilityEngine {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn is_eligible(&self, ltv_ratio: f64, rate_spread: f64) -> bool {
        policy::passes_filter(&self.config, ltv_ratio, rate_spread)
    }

    pub fn category_for(&self, rate_spread: f64) -> MarketingCategory {
        policy::categorize(&self.config, rate_spread)
    }

    /// Derives `rate_spread` for every record with valid metrics and flags
    /// filter membership. Records with missing or non-numeric metrics are
    /// reported and left out.
    pub fn annotate(
        &self,
        records: &[UnifiedBorrowerRecord],
        quality: &mut DataQualityReport,
    ) -> Vec<SpreadAnnotatedRecord> {
        let mut annotated = Vec::with_capacity(records.len());

        for record in records {
            match rules::annotate(record) {
                Ok(mut row) => {
                    row.eligible = self.is_eligible(row.ltv_ratio, row.rate_spread);
                    annotated.push(row);
                }
                Err(fields) => {
                    for field in fields {
                        let source = if field.column == "current_interest_rate" {
                            RawTable::LoanInformation
                        } else {
                            RawTable::MarketEquity
                        };
                        quality.record(
                            DataQualityKind::InvalidNumericField,
                            source.label(),
                            record.borrower_id().as_str(),
                            format!(
                                "{} is {}; record excluded from classification",
                                field.column, field.description
                            ),
                        );
                    }
                }
            }
        }

        annotated
    }

    /// Annotates and tiers `records` according to `mode`.
    pub fn classify(
        &self,
        records: &[UnifiedBorrowerRecord],
        mode: ClassificationMode,
        quality: &mut DataQualityReport,
    ) -> ClassificationOutcome {
        let population = self.annotate(records, quality);

        let audience: Vec<ClassifiedBorrowerRecord> = population
            .iter()
            .filter(|row| match mode {
                ClassificationMode::Audience => row.eligible,
                ClassificationMode::FullPopulation => true,
            })
            .map(|row| {
                ClassifiedBorrowerRecord::from_annotated(row, self.category_for(row.rate_spread))
            })
            .collect();

        info!(
            mode = mode.label(),
            unified = records.len(),
            annotated = population.len(),
            audience = audience.len(),
            "borrowers classified"
        );

        ClassificationOutcome {
            mode,
            audience,
            population,
        }
    }
}

/// Result of one classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub mode: ClassificationMode,
    /// Tiered records; filter-passing only in [`ClassificationMode::Audience`].
    pub audience: Vec<ClassifiedBorrowerRecord>,
    /// Every record with valid metrics, eligible or not.
    pub population: Vec<SpreadAnnotatedRecord>,
}

impl ClassificationOutcome {
    pub fn excluded_by_filter(&self) -> usize {
        self.population.iter().filter(|row| !row.eligible).count()
    }
}

pub mod domain;
pub mod eligibility;
mod join;
pub mod quality;
pub mod report;
pub mod resolver;

pub use eligibility::{
    ClassificationMode, ClassificationOutcome, EligibilityConfig, EligibilityEngine,
};
pub use join::join_sources;
pub use quality::{DataQualityKind, DataQualityReport};
pub use report::AudienceReport;
pub use resolver::{
    DataProvenance, DataSource, DataSourceResolver, DirectorySource, FallbackReason,
    ResolveError, ResolveRequest, ResolvedAudience,
};

use crate::workflows::ingest::RawSources;

/// Joins the four raw tables and classifies the result in one pass.
pub fn evaluate_sources(
    sources: &RawSources,
    engine: &EligibilityEngine,
    mode: ClassificationMode,
    quality: &mut DataQualityReport,
) -> ClassificationOutcome {
    let unified = join_sources(sources, quality);
    engine.classify(&unified, mode, quality)
}

mod insights;
mod summary;
pub mod views;

pub use summary::{AudienceReport, DEFAULT_TOP_N};

pub(crate) use insights::generate_insights;

pub mod ingest;
pub mod refinance;

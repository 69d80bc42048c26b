//! Refinance-readiness analytics: joins borrower, loan, market and engagement
//! tables, selects the eligible refinance audience, tiers it by rate spread and
//! builds the dashboard aggregates.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

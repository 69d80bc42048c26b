//! CSV ingestion for the four raw refinance sources.
//!
//! Loosely typed CSV cells are converted into the validated record shapes from
//! [`crate::workflows::refinance::domain`]. Structural problems (unreadable
//! input, broken CSV framing, missing required columns) fail the whole source;
//! cell-level problems are carried forward as data-quality conditions.

pub(crate) mod normalizer;
pub(crate) mod parser;

use crate::workflows::refinance::domain::{
    RawBorrowerIdentity, RawEngagement, RawLoanInfo, RawMarketEquity, RawTable,
};
use crate::workflows::refinance::quality::DataQualityReport;
use std::io::Read;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {table} source: {source}")]
    Io {
        table: RawTable,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {table} CSV data: {source}")]
    Csv {
        table: RawTable,
        #[source]
        source: csv::Error,
    },
    #[error("{table} source is missing required column '{column}'")]
    MissingColumn {
        table: RawTable,
        column: &'static str,
    },
}

impl IngestError {
    pub fn table(&self) -> RawTable {
        match self {
            Self::Io { table, .. } | Self::Csv { table, .. } | Self::MissingColumn { table, .. } => {
                *table
            }
        }
    }
}

/// The four raw tables for one evaluation run, fully loaded into memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSources {
    pub identities: Vec<RawBorrowerIdentity>,
    pub loans: Vec<RawLoanInfo>,
    pub markets: Vec<RawMarketEquity>,
    pub engagements: Vec<RawEngagement>,
}

impl RawSources {
    pub fn from_readers<A, B, C, D>(
        identities: A,
        loans: B,
        markets: C,
        engagements: D,
        quality: &mut DataQualityReport,
    ) -> Result<Self, IngestError>
    where
        A: Read,
        B: Read,
        C: Read,
        D: Read,
    {
        Ok(Self {
            identities: parser::parse_identities(identities)?,
            loans: parser::parse_loans(loans)?,
            markets: parser::parse_markets(markets)?,
            engagements: parser::parse_engagements(engagements, quality)?,
        })
    }

    /// Loads the well-known raw file names from a directory.
    pub fn from_dir<P: AsRef<Path>>(
        dir: P,
        quality: &mut DataQualityReport,
    ) -> Result<Self, IngestError> {
        let dir = dir.as_ref();
        let open = |table: RawTable| {
            std::fs::File::open(dir.join(table.file_name()))
                .map_err(|source| IngestError::Io { table, source })
        };

        Self::from_readers(
            open(RawTable::BorrowerInformation)?,
            open(RawTable::LoanInformation)?,
            open(RawTable::MarketEquity)?,
            open(RawTable::BorrowerEngagement)?,
            quality,
        )
    }

    pub fn row_count(&self, table: RawTable) -> usize {
        match table {
            RawTable::BorrowerInformation => self.identities.len(),
            RawTable::LoanInformation => self.loans.len(),
            RawTable::MarketEquity => self.markets.len(),
            RawTable::BorrowerEngagement => self.engagements.len(),
        }
    }
}

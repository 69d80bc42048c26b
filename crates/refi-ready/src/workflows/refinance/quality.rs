use serde::Serialize;
use tracing::{debug, warn};

/// Per-record conditions that drop or adjust a row without failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityKind {
    JoinKeyMismatch,
    DuplicateKey,
    InvalidNumericField,
    InvalidBooleanField,
}

impl DataQualityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::JoinKeyMismatch => "Join key mismatch",
            Self::DuplicateKey => "Duplicate key",
            Self::InvalidNumericField => "Invalid numeric field",
            Self::InvalidBooleanField => "Invalid boolean field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityIssue {
    pub kind: DataQualityKind,
    pub source: &'static str,
    pub key: String,
    pub detail: String,
}

/// Accumulates data-quality issues for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQualityReport {
    issues: Vec<DataQualityIssue>,
}

impl DataQualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: DataQualityKind,
        source: &'static str,
        key: impl Into<String>,
        detail: impl Into<String>,
    ) {
        let issue = DataQualityIssue {
            kind,
            source,
            key: key.into(),
            detail: detail.into(),
        };

        match kind {
            DataQualityKind::JoinKeyMismatch => {
                debug!(source = issue.source, key = %issue.key, detail = %issue.detail, "row dropped from join");
            }
            _ => {
                warn!(
                    kind = kind.label(),
                    source = issue.source,
                    key = %issue.key,
                    detail = %issue.detail,
                    "data quality issue"
                );
            }
        }

        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[DataQualityIssue] {
        &self.issues
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: DataQualityKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }

    pub fn merge(&mut self, other: DataQualityReport) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> DataQualitySummary {
        DataQualitySummary {
            join_key_mismatches: self.count(DataQualityKind::JoinKeyMismatch),
            duplicate_keys: self.count(DataQualityKind::DuplicateKey),
            invalid_numeric_fields: self.count(DataQualityKind::InvalidNumericField),
            invalid_boolean_fields: self.count(DataQualityKind::InvalidBooleanField),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DataQualitySummary {
    pub join_key_mismatches: usize,
    pub duplicate_keys: usize,
    pub invalid_numeric_fields: usize,
    pub invalid_boolean_fields: usize,
}

impl DataQualitySummary {
    pub fn total(&self) -> usize {
        self.join_key_mismatches
            + self.duplicate_keys
            + self.invalid_numeric_fields
            + self.invalid_boolean_fields
    }
}

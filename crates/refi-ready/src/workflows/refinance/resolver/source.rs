use crate::workflows::refinance::domain::RawTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RAW_PREFIX: &str = "raw";
pub const DEFAULT_OUTPUT_PREFIX: &str = "output";

const FALLBACK_MARKER: &str = "fallback-";

/// A previously materialized audience extract found in the output location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractDescriptor {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    /// Written by an earlier fallback run rather than the scheduled pipeline.
    pub fallback: bool,
}

impl ExtractDescriptor {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        let key = key.into();
        let fallback = file_name(&key).contains(FALLBACK_MARKER);
        Self {
            key,
            last_modified,
            fallback,
        }
    }

    pub fn is_csv(&self) -> bool {
        self.key.ends_with(".csv")
    }
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Read-only access to raw tables and audience extracts.
///
/// Implementations hand back raw bytes; parsing stays with the caller so every
/// backend is validated by the same schema rules.
pub trait DataSource: Send + Sync {
    /// Human-readable location of the raw tables, recorded in provenance.
    fn raw_location(&self) -> String;
    fn list_extracts(&self) -> Result<Vec<ExtractDescriptor>, SourceError>;
    fn read_extract(&self, extract: &ExtractDescriptor) -> Result<Vec<u8>, SourceError>;
    fn read_raw(&self, table: RawTable) -> Result<Vec<u8>, SourceError>;
}

impl<S: DataSource + ?Sized> DataSource for std::sync::Arc<S> {
    fn raw_location(&self) -> String {
        (**self).raw_location()
    }

    fn list_extracts(&self) -> Result<Vec<ExtractDescriptor>, SourceError> {
        (**self).list_extracts()
    }

    fn read_extract(&self, extract: &ExtractDescriptor) -> Result<Vec<u8>, SourceError> {
        (**self).read_extract(extract)
    }

    fn read_raw(&self, table: RawTable) -> Result<Vec<u8>, SourceError> {
        (**self).read_raw(table)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to read {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV in {key}: {source}")]
    Csv {
        key: String,
        #[source]
        source: csv::Error,
    },
    #[error("{key} is missing required column '{column}'")]
    MissingColumn { key: String, column: &'static str },
    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Local directory laid out as `<root>/<raw_prefix>/*.csv` for the four raw
/// tables and `<root>/<output_prefix>/*.csv` for audience extracts.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    raw_prefix: String,
    output_prefix: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            raw_prefix: DEFAULT_RAW_PREFIX.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }

    pub fn with_prefixes(mut self, raw_prefix: impl Into<String>, output_prefix: impl Into<String>) -> Self {
        self.raw_prefix = raw_prefix.into();
        self.output_prefix = output_prefix.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), SourceError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(SourceError::Unavailable(format!(
                "data root {} is not a directory",
                self.root.display()
            )))
        }
    }

    fn read_key(&self, key: &str) -> Result<Vec<u8>, SourceError> {
        self.ensure_root()?;
        std::fs::read(self.root.join(key)).map_err(|source| match source.kind() {
            ErrorKind::NotFound => SourceError::NotFound(key.to_string()),
            _ => SourceError::Io {
                key: key.to_string(),
                source,
            },
        })
    }
}

impl DataSource for DirectorySource {
    fn raw_location(&self) -> String {
        self.root.join(&self.raw_prefix).display().to_string()
    }

    fn list_extracts(&self) -> Result<Vec<ExtractDescriptor>, SourceError> {
        self.ensure_root()?;
        let dir = self.root.join(&self.output_prefix);
        let io_error = |source: std::io::Error| SourceError::Io {
            key: self.output_prefix.clone(),
            source,
        };

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(err)),
        };

        let mut extracts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error)?;
            let metadata = entry.metadata().map_err(io_error)?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = metadata.modified().map_err(io_error)?;
            let descriptor = ExtractDescriptor::new(
                format!("{}/{name}", self.output_prefix),
                DateTime::<Utc>::from(modified),
            );
            if descriptor.is_csv() {
                extracts.push(descriptor);
            }
        }

        extracts.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(extracts)
    }

    fn read_extract(&self, extract: &ExtractDescriptor) -> Result<Vec<u8>, SourceError> {
        self.read_key(&extract.key)
    }

    fn read_raw(&self, table: RawTable) -> Result<Vec<u8>, SourceError> {
        self.read_key(&format!("{}/{}", self.raw_prefix, table.file_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_marker_is_read_from_the_file_name() {
        let now = Utc::now();
        assert!(ExtractDescriptor::new("output/fallback-audience.csv", now).fallback);
        assert!(!ExtractDescriptor::new("fallback-runs/audience.csv", now).fallback);
        assert!(!ExtractDescriptor::new("output/audience.csv.metadata", now).is_csv());
    }

    #[test]
    fn directory_source_lists_only_csv_extracts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output).expect("output dir");
        std::fs::write(output.join("audience.csv"), "borrower_id\n").expect("write extract");
        std::fs::write(output.join("audience.csv.metadata"), "{}").expect("write metadata");
        std::fs::create_dir_all(output.join("archive.csv")).expect("nested dir");

        let source = DirectorySource::new(dir.path());
        let extracts = source.list_extracts().expect("listing succeeds");
        assert_eq!(extracts.len(), 1);
        assert_eq!(extracts[0].key, "output/audience.csv");
    }

    #[test]
    fn missing_output_location_means_no_extracts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectorySource::new(dir.path()).with_prefixes("landing", "exports");
        assert!(source.list_extracts().expect("listing succeeds").is_empty());

        let error = source
            .read_raw(RawTable::LoanInformation)
            .expect_err("raw table absent");
        match error {
            SourceError::NotFound(key) => assert_eq!(key, "landing/loan_information.csv"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn missing_root_is_unavailable() {
        let source = DirectorySource::new("./no-such-data-root");
        assert!(matches!(
            source.list_extracts(),
            Err(SourceError::Unavailable(_))
        ));
        assert!(matches!(
            source.read_raw(RawTable::MarketEquity),
            Err(SourceError::Unavailable(_))
        ));
    }
}

use metrics_exporter_prometheus::PrometheusHandle;
use refi_ready::config::{AppConfig, DataConfig};
use refi_ready::workflows::refinance::{
    ClassificationMode, DataSource, DataSourceResolver, DirectorySource, EligibilityEngine,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type SharedResolver = Arc<DataSourceResolver<Arc<dyn DataSource>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) resolver: SharedResolver,
    pub(crate) top_n: usize,
    pub(crate) fetch_timeout: Duration,
}

impl AppState {
    pub(crate) fn new(config: &AppConfig, metrics: PrometheusHandle) -> Self {
        let source = Arc::new(directory_source(&config.data, None));
        Self::with_source(
            source,
            metrics,
            config.report.top_n,
            config.data.fetch_timeout,
        )
    }

    pub(crate) fn with_source(
        source: Arc<dyn DataSource>,
        metrics: PrometheusHandle,
        top_n: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(metrics),
            resolver: Arc::new(DataSourceResolver::new(source, EligibilityEngine::default())),
            top_n,
            fetch_timeout,
        }
    }
}

/// Directory source for the configured layout, with `root_override` taking
/// precedence over the configured data root.
pub(crate) fn directory_source(data: &DataConfig, root_override: Option<PathBuf>) -> DirectorySource {
    let root = root_override.unwrap_or_else(|| data.root.clone());
    DirectorySource::new(root).with_prefixes(data.raw_prefix.clone(), data.output_prefix.clone())
}

pub(crate) fn build_resolver(
    data: &DataConfig,
    root_override: Option<PathBuf>,
) -> DataSourceResolver<DirectorySource> {
    DataSourceResolver::new(
        directory_source(data, root_override),
        EligibilityEngine::default(),
    )
}

pub(crate) fn parse_mode(raw: &str) -> Result<ClassificationMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "audience" | "eligible" => Ok(ClassificationMode::Audience),
        "population" | "full_population" | "full" => Ok(ClassificationMode::FullPopulation),
        other => Err(format!(
            "unknown mode '{other}' (expected 'audience' or 'population')"
        )),
    }
}

pub(crate) fn deserialize_optional_mode<'de, D>(
    deserializer: D,
) -> Result<Option<ClassificationMode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = <Option<String> as serde::Deserialize>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_mode(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_accept_cli_and_wire_spellings() {
        assert_eq!(parse_mode("audience"), Ok(ClassificationMode::Audience));
        assert_eq!(parse_mode(" Population "), Ok(ClassificationMode::FullPopulation));
        assert_eq!(
            parse_mode("full_population"),
            Ok(ClassificationMode::FullPopulation)
        );
        assert!(parse_mode("everyone").is_err());
    }
}

use crate::infra::{build_resolver, parse_mode};
use chrono::{DateTime, Utc};
use clap::Args;
use refi_ready::config::AppConfig;
use refi_ready::error::AppError;
use refi_ready::telemetry;
use refi_ready::workflows::refinance::quality::{DataQualityIssue, DataQualitySummary};
use refi_ready::workflows::refinance::report::views::{
    AudienceInsights, BucketMatrix, CategoryCountEntry, KpiSummary, RankedBorrowerView,
    SignalBreakdownEntry,
};
use refi_ready::workflows::refinance::{
    ClassificationMode, DataProvenance, ResolveRequest, ResolvedAudience,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Presentation payload shared by the HTTP dashboard and `report --json`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DashboardPayload {
    pub(crate) data_source: &'static str,
    pub(crate) provenance: DataProvenance,
    pub(crate) mode: ClassificationMode,
    pub(crate) mode_label: &'static str,
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) kpis: KpiSummary,
    pub(crate) category_distribution: Vec<CategoryCountEntry>,
    pub(crate) top_opportunities: Vec<RankedBorrowerView>,
    pub(crate) ltv_spread_matrix: BucketMatrix,
    pub(crate) engagement_breakdown: Vec<SignalBreakdownEntry>,
    pub(crate) population_count: usize,
    pub(crate) insights: AudienceInsights,
    pub(crate) data_quality: DataQualitySummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) issues: Vec<DataQualityIssue>,
}

impl DashboardPayload {
    pub(crate) fn build(resolved: &ResolvedAudience, top_n: usize, generated_at: DateTime<Utc>) -> Self {
        let summary = resolved.summary(top_n);
        let insights = summary.insights();

        Self {
            data_source: resolved.provenance.label(),
            provenance: resolved.provenance.clone(),
            mode: resolved.mode,
            mode_label: resolved.mode.label(),
            generated_at,
            kpis: summary.kpis,
            category_distribution: summary.category_distribution,
            top_opportunities: summary.top_opportunities,
            ltv_spread_matrix: summary.ltv_spread_matrix,
            engagement_breakdown: summary.engagement_breakdown,
            population_count: summary.population_count,
            insights,
            data_quality: resolved.quality.summary(),
            issues: resolved.quality.issues().to_vec(),
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Data root containing the raw/ and output/ folders (defaults to REFI_DATA_ROOT)
    #[arg(long)]
    pub(crate) data_root: Option<PathBuf>,
    /// Number of borrowers in the top opportunities list (defaults to REFI_TOP_N)
    #[arg(long)]
    pub(crate) top_n: Option<usize>,
    /// Classify the eligible audience or the full population
    #[arg(long, value_parser = parse_mode, default_value = "audience")]
    pub(crate) mode: ClassificationMode,
    /// Print the dashboard payload as JSON
    #[arg(long)]
    pub(crate) json: bool,
    /// Ignore precomputed extracts and derive from the raw tables
    #[arg(long)]
    pub(crate) force_raw: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct VerifyArgs {
    /// Data root containing the raw/ folder (defaults to REFI_DATA_ROOT)
    #[arg(long)]
    pub(crate) data_root: Option<PathBuf>,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        data_root,
        top_n,
        mode,
        json,
        force_raw,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let top_n = top_n.unwrap_or(config.report.top_n);
    if top_n == 0 {
        return Err(AppError::InvalidRequest("--top-n must be at least 1".to_string()));
    }

    let resolver = build_resolver(&config.data, data_root);
    let resolved = resolver.resolve(ResolveRequest { mode, force_raw })?;
    let payload = DashboardPayload::build(&resolved, top_n, Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render_dashboard(&payload));
    }
    Ok(())
}

/// Re-derives the audience from the raw tables and fails when nobody qualifies.
pub(crate) fn run_verify(args: VerifyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let resolver = build_resolver(&config.data, args.data_root);
    let resolved = resolver.resolve(ResolveRequest {
        mode: ClassificationMode::Audience,
        force_raw: true,
    })?;
    let payload = DashboardPayload::build(&resolved, 5, Utc::now());

    print!("{}", render_verification(&payload));

    if payload.kpis.audience_count == 0 {
        return Err(AppError::Verification(
            "no borrowers meet the refinance criteria".to_string(),
        ));
    }
    Ok(())
}

fn describe_provenance(provenance: &DataProvenance) -> String {
    match provenance {
        DataProvenance::Precomputed {
            extract_key,
            last_modified,
            enriched,
            matched_rows,
            unmatched_rows,
        } => {
            let enrichment = if !*enriched {
                "raw tables unavailable, not enriched".to_string()
            } else if *unmatched_rows > 0 {
                format!(
                    "{matched_rows} rows enriched from raw tables, {unmatched_rows} without a raw match"
                )
            } else {
                "enriched from raw tables".to_string()
            };
            format!(
                "precomputed extract {extract_key} ({}, {enrichment})",
                last_modified.format("%Y-%m-%d %H:%M UTC")
            )
        }
        DataProvenance::Derived {
            raw_location,
            reason,
        } => format!("derived from {raw_location} ({})", reason.describe()),
        DataProvenance::Inline => "inline tables".to_string(),
    }
}

fn or_no_data(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(value) => format!("{value:.2}{suffix}"),
        None => "no data".to_string(),
    }
}

pub(crate) fn render_dashboard(payload: &DashboardPayload) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Refinance readiness dashboard");
    let _ = writeln!(out, "Data source: {}", describe_provenance(&payload.provenance));
    let _ = writeln!(out, "Mode: {}", payload.mode_label);

    let kpis = &payload.kpis;
    let _ = writeln!(out, "\nKey metrics");
    let _ = writeln!(out, "- Eligible borrowers: {}", kpis.audience_count);
    let _ = writeln!(
        out,
        "- Monthly savings potential: ${:.2}",
        kpis.total_monthly_savings
    );
    let _ = writeln!(
        out,
        "- Average rate spread: {}",
        or_no_data(kpis.average_rate_spread, " pts")
    );
    let average_ltv = match kpis.average_ltv_ratio {
        None if kpis.ltv_sample_size > 0 => format!(
            "partial data ({} of {} borrowers have an LTV ratio)",
            kpis.ltv_sample_size, kpis.audience_count
        ),
        value => or_no_data(value, "%"),
    };
    let _ = writeln!(out, "- Average LTV ratio: {average_ltv}");

    let _ = writeln!(out, "\nMarketing categories");
    for entry in &payload.category_distribution {
        let _ = writeln!(out, "- {}: {}", entry.category_label, entry.count);
    }

    if payload.top_opportunities.is_empty() {
        let _ = writeln!(out, "\nTop opportunities: none");
    } else {
        let _ = writeln!(out, "\nTop opportunities");
        for view in &payload.top_opportunities {
            let _ = writeln!(
                out,
                "{:>3}. {} ({}) ${:.2}/mo, spread {:.2}, {}",
                view.rank,
                view.full_name,
                view.borrower_id,
                view.monthly_savings_est,
                view.rate_spread,
                view.category_label
            );
        }
    }

    if payload.population_count == 0 {
        let _ = writeln!(out, "\nLTV x spread distribution: no data");
    } else {
        let _ = writeln!(out, "\nLTV x spread distribution");
        for cell in payload
            .ltv_spread_matrix
            .cells
            .iter()
            .filter(|cell| cell.count > 0)
        {
            let _ = writeln!(
                out,
                "- LTV {} / spread {}: {}",
                cell.ltv_label, cell.spread_label, cell.count
            );
        }

        let _ = writeln!(out, "\nEngagement signals");
        for entry in &payload.engagement_breakdown {
            let _ = writeln!(
                out,
                "- {}: {} yes / {} no ({})",
                entry.signal_label,
                entry.yes,
                entry.no,
                or_no_data(entry.yes_pct, "% yes")
            );
        }
    }

    render_insights(&mut out, payload);
    out
}

pub(crate) fn render_verification(payload: &DashboardPayload) -> String {
    let mut out = String::new();
    let insights = &payload.insights;
    let _ = writeln!(out, "Refinance readiness verification");
    let _ = writeln!(out, "Data source: {}", describe_provenance(&payload.provenance));
    let _ = writeln!(out, "- Borrowers on file: {}", insights.borrowers_on_file);
    let _ = writeln!(
        out,
        "- Borrowers analysed (joined, valid values): {}",
        insights.population_count
    );
    let _ = writeln!(out, "- Eligible borrowers: {}", insights.audience_count);
    let _ = writeln!(
        out,
        "- Eligibility rate: {}",
        or_no_data(insights.eligibility_rate_pct, "%")
    );
    for entry in payload
        .category_distribution
        .iter()
        .filter(|entry| entry.count > 0)
    {
        let _ = writeln!(out, "- {}: {}", entry.category_label, entry.count);
    }

    render_insights(&mut out, payload);
    out
}

fn render_insights(out: &mut String, payload: &DashboardPayload) {
    let insights = &payload.insights;
    if !insights.top_opportunities.is_empty() {
        let _ = writeln!(out, "\nTop refinance opportunities");
        for line in &insights.top_opportunities {
            let _ = writeln!(out, "- {line}");
        }
    }

    if !insights.observations.is_empty() {
        let _ = writeln!(out, "\nObservations");
        for note in &insights.observations {
            let _ = writeln!(out, "- {note}");
        }
    }

    let quality = &payload.data_quality;
    if quality.total() > 0 {
        let _ = writeln!(
            out,
            "\nData quality: {} join mismatches, {} duplicate keys, {} invalid numbers, {} invalid flags",
            quality.join_key_mismatches,
            quality.duplicate_keys,
            quality.invalid_numeric_fields,
            quality.invalid_boolean_fields
        );
    }
}

mod analysis;
mod charts;
mod common;
mod config;
mod output;
mod parsing;

use argh::FromArgs;
use config::{ReportConfig, ServedMode};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use analysis::{
    aggregate_epp_by_experiment, aggregate_per_qps, build_summary_across_qps, merge_epp_metrics,
    without_stage_zero,
};
use charts::{render_epp_charts, render_stage_charts};
use output::{
    format_summary_table, format_written, write_analysis_metrics, write_epp_samples,
    write_epp_summaries, write_markdown_report, ReportInputs, WrittenFiles,
};
use parsing::{build_epp_samples, build_stage_records, discover_epp_configs, discover_profile_yaml};

/// Aggregates inference-perf benchmark runs into CSVs, charts and a markdown report
#[derive(FromArgs, Debug)]
struct Args {
    /// root folder with one sub-folder per experiment
    #[argh(option, short = 'b')]
    base_dir: PathBuf,

    /// output folder (default: the base folder)
    #[argh(option, short = 'o')]
    out_dir: Option<PathBuf>,

    /// profile folder under workload/profiles/ to include in the report
    #[argh(option)]
    profile_name: Option<String>,

    /// width of embedded chart images in pixels (default: 720)
    #[argh(option, default = "config::DEFAULT_IMG_WIDTH")]
    img_width: u32,

    /// basis for completed requests/sec: total, successes or json (default: total)
    #[argh(option, default = "ServedMode::Total")]
    served_mode: ServedMode,

    /// accepted for compatibility, has no effect
    #[argh(switch)]
    no_cap_served: bool,

    /// experiment whose overall TTFT the others are compared against
    #[argh(option)]
    baseline: Option<String>,

    /// drop stage 0 (warm-up) from every experiment
    #[argh(switch)]
    skip_stage0: bool,

    /// only keep EPP samples for this pod address (repeatable)
    #[argh(option)]
    target_addresses: Vec<String>,

    /// log at debug level unless RUST_LOG is set
    #[argh(switch, short = 'v')]
    verbose: bool,
}

impl From<Args> for ReportConfig {
    fn from(args: Args) -> Self {
        let out_dir = args.out_dir.unwrap_or_else(|| args.base_dir.clone());
        let target_addresses = (!args.target_addresses.is_empty())
            .then(|| args.target_addresses.into_iter().collect::<HashSet<_>>());

        Self {
            profile_name: args.profile_name,
            img_width: args.img_width,
            served_mode: args.served_mode,
            baseline: args.baseline,
            skip_stage0: args.skip_stage0,
            target_addresses,
            ..ReportConfig::new(args.base_dir, out_dir)
        }
    }
}

/// Errors that can occur during a run
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Parsing error: {0}")]
    Parsing(#[from] parsing::ParsingError),

    #[error("Chart error: {0}")]
    Plot(#[from] common::PlotError),

    #[error("Report error: {0}")]
    Report(#[from] output::ReportError),

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = core::result::Result<T, AnalysisError>;

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("analyze_inference_perf={}", level).into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_tracing(args.verbose);
    debug!(no_cap_served = args.no_cap_served, "parsed arguments");

    if !args.base_dir.is_dir() {
        eprintln!("Error: Base directory does not exist: {}", args.base_dir.display());
        std::process::exit(1);
    }

    run(&ReportConfig::from(args))
}

fn run(config: &ReportConfig) -> Result<()> {
    let out_dir = config.out_dir.as_path();
    std::fs::create_dir_all(out_dir).map_err(|source| AnalysisError::OutputDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    // Stage metrics
    let mut records = build_stage_records(&config.base_dir)?;
    if config.skip_stage0 {
        records = without_stage_zero(records);
    }
    let mut rows = aggregate_per_qps(&records, config.served_mode);
    info!(records = records.len(), rows = rows.len(), "aggregated stage metrics");

    // Scheduler logs
    if let Some(addresses) = &config.target_addresses {
        let mut sorted: Vec<_> = addresses.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        info!(addresses = ?sorted, "Filtering EPP logs for addresses");
    }
    let samples = build_epp_samples(&config.base_dir, config.target_addresses.as_ref())?;
    let epp_summaries = aggregate_epp_by_experiment(&samples);
    if epp_summaries.is_empty() {
        info!("No EPP log data found");
    } else {
        merge_epp_metrics(&mut rows, &epp_summaries);
        let experiments: Vec<_> = epp_summaries.iter().map(|s| s.experiment.as_str()).collect();
        info!(?experiments, "Found EPP metrics for experiments");
    }

    // Tables
    let analysis_csv = out_dir.join("analysis_metrics.csv");
    write_analysis_metrics(&rows, &analysis_csv)?;

    let mut epp_csv = None;
    if !samples.is_empty() {
        let path = out_dir.join("epp_log_metrics.csv");
        write_epp_samples(&samples, &path)?;
        epp_csv = Some(path);
    }

    let mut epp_summary_csv = None;
    if !epp_summaries.is_empty() {
        let path = out_dir.join("epp_log_metrics_summary.csv");
        write_epp_summaries(&epp_summaries, &path)?;
        epp_summary_csv = Some(path);
    }

    // Charts
    let mut charts = render_stage_charts(&rows, out_dir)?;
    let (epp_charts, per_pod_charts) = render_epp_charts(&samples, out_dir)?;
    charts.extend(epp_charts);

    // Report
    let profile_yaml = discover_profile_yaml(&config.base_dir, config.profile_name.as_deref());
    let epp_configs = discover_epp_configs(&config.base_dir);
    let report = write_markdown_report(
        &ReportInputs {
            rows: &rows,
            epp_summaries: &epp_summaries,
            charts: &charts,
            per_pod_charts: &per_pod_charts,
            profile_yaml: profile_yaml.as_deref(),
            epp_configs: &epp_configs,
            img_width: config.img_width,
            served_mode: config.served_mode,
            baseline: config.baseline.as_deref(),
        },
        out_dir,
    )?;

    let summary = build_summary_across_qps(&rows, config.served_mode, config.baseline.as_deref());
    println!("{}\n", format_summary_table(&summary, Some("Summary across QPS")));

    let written = WrittenFiles {
        analysis_csv,
        epp_csv,
        epp_summary_csv,
        charts,
        per_pod_chart_count: per_pod_charts.values().map(Vec::len).sum(),
        out_dir: out_dir.to_path_buf(),
        report,
    };
    println!("{}", format_written(&written));

    Ok(())
}

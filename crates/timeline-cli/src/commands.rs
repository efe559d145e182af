//! Subcommand handlers. Each command is self-contained: it imports the
//! source file(s) fresh into an in-process registry, runs the requested
//! operation, and prints JSON to stdout. There is no daemon — every
//! invocation is a cold start, which keeps the CLI a thin, stateless
//! front end over `timeline-core` rather than a second copy of session
//! state.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timeline_core::filter::FilterModel;
use timeline_core::intake::{import_one, stage, IntakeRequest};
use timeline_core::scheduler::Scheduler;
use timeline_core::tab::{Tab, TabId, TabRegistry};
use timeline_core::TimelineConfig;

pub async fn import_tab(
    registry: &Arc<TabRegistry>,
    config: &TimelineConfig,
    name: &str,
    path: &Path,
    sheet: Option<&str>,
) -> Result<TabId> {
    let request = IntakeRequest {
        name: name.to_string(),
        path: path.to_path_buf(),
        sheet_name: sheet.map(str::to_string),
    };
    let tab_id = stage(registry, &request).context("staging tab")?;

    let scheduler = Scheduler::new(registry.clone(), config.clone());
    scheduler.enqueue_import(tab_id);
    let path = request.path.clone();
    let sheet_name = request.sheet_name.clone();
    scheduler
        .drain(|id| {
            let registry = registry.clone();
            let config = config.clone();
            let path = path.clone();
            let sheet_name = sheet_name.clone();
            async move { import_one(&registry, &config, id, &path, sheet_name.as_deref()).await }
        })
        .await;

    let tab = registry.get(tab_id).context("tab vanished after import")?;
    tracing::info!(tab = %tab.id, rows = tab.store.row_count().unwrap_or(-1), "import complete");
    Ok(tab_id)
}

pub fn load_filter(path: Option<&Path>) -> Result<FilterModel> {
    match path {
        None => Ok(FilterModel::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading filter file {}", path.display()))?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn cmd_query(
    config: &TimelineConfig,
    path: &Path,
    sheet: Option<&str>,
    filter: Option<&Path>,
    sort_column: Option<&str>,
    desc: bool,
    offset: i64,
    limit: i64,
) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "query", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;

    let sort = sort_column.map(|column| timeline_core::query::SortSpec {
        column: tab
            .headers
            .safe_for(column)
            .map(str::to_string)
            .unwrap_or_else(|| column.to_string()),
        direction: if desc {
            timeline_core::query::SortDirection::Desc
        } else {
            timeline_core::query::SortDirection::Asc
        },
    });

    let response = timeline_core::query::windowed_fetch(&tab, &filter, sort.as_ref(), offset, limit, config.annotation_batch_rows)?;
    print_json(&response)
}

pub async fn cmd_histogram(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, column: &str, hourly: bool) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "histogram", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let safe = resolve_column(&tab, column)?;
    let granularity = if hourly {
        timeline_core::analytics::histogram::Granularity::Hour
    } else {
        timeline_core::analytics::histogram::Granularity::Day
    };
    let buckets = timeline_core::analytics::histogram::histogram(&tab, &filter, &safe, granularity)?;
    print_json(&buckets)
}

pub async fn cmd_gaps(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, column: &str, threshold_minutes: i64) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "gaps", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let safe = resolve_column(&tab, column)?;
    let result = timeline_core::analytics::gaps::gap_analysis(&tab, &filter, &safe, threshold_minutes)?;
    print_json(&result)
}

pub async fn cmd_bursts(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, column: &str, window_minutes: i64, multiplier: f64) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "bursts", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let safe = resolve_column(&tab, column)?;
    let result = timeline_core::analytics::bursts::burst_analysis(&tab, &filter, &safe, window_minutes, multiplier)?;
    print_json(&result)
}

pub async fn cmd_coverage(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, source_column: &str, timestamp_column: &str) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "coverage", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let source_safe = resolve_column(&tab, source_column)?;
    let ts_safe = resolve_column(&tab, timestamp_column)?;
    let result = timeline_core::analytics::coverage::log_source_coverage(&tab, &filter, &source_safe, &ts_safe)?;
    print_json(&result)
}

pub async fn cmd_stack(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, column: &str) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "stack", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let safe = resolve_column(&tab, column)?;
    let result = timeline_core::analytics::stacking::stack(
        &tab,
        &filter,
        &safe,
        timeline_core::analytics::stacking::StackOrder::CountDescending,
        config.stacking_value_cap,
    )?;
    print_json(&result)
}

pub async fn cmd_ioc(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, patterns: &[String]) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "ioc", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let result = timeline_core::analytics::ioc::ioc_match(&tab, &filter, patterns, config.ioc_pattern_batch, config.ioc_hit_page_rows)?;
    print_json(&result)
}

pub async fn cmd_process_tree(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "processtree", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let result = timeline_core::processtree::reconstruct(&tab, &filter, config.process_tree_row_cap)?;
    print_json(&result)
}

pub async fn cmd_lateral(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, event_ids: &[String]) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "lateral", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let ids: Vec<String> = if event_ids.is_empty() {
        timeline_core::lateral::DEFAULT_EVENT_IDS.iter().map(|s| s.to_string()).collect()
    } else {
        event_ids.to_vec()
    };
    let result = timeline_core::lateral::reconstruct(
        &tab,
        &filter,
        &ids,
        config.lateral_movement_row_cap,
        config.lateral_movement_chain_cap,
        true,
    )?;
    print_json(&result)
}

pub async fn cmd_rdp(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "rdp", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;
    let result = timeline_core::lateral::rdp_sessions(&tab, &filter, config.lateral_movement_row_cap)?;
    print_json(&result)
}

pub async fn cmd_persistence(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "persistence", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;

    let findings = match timeline_core::persistence::detect_mode(&tab) {
        Some(timeline_core::persistence::ScanMode::EventLog) => timeline_core::persistence::scan_event_log(&tab, &filter, &[], &[])?,
        Some(timeline_core::persistence::ScanMode::Registry) => timeline_core::persistence::scan_registry(&tab, &filter, &[], &[])?,
        None => bail!("could not detect event-log or registry columns in {}", path.display()),
    };
    print_json(&findings)
}

pub async fn cmd_export(config: &TimelineConfig, path: &Path, sheet: Option<&str>, filter: Option<&Path>, format: &str, output: &Path) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "export", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let filter = load_filter(filter)?;

    let export_format = match format {
        "csv" => timeline_core::export::ExportFormat::Csv,
        "tsv" => timeline_core::export::ExportFormat::Tsv,
        "xlsx" => timeline_core::export::ExportFormat::Xlsx,
        other => bail!("unsupported export format: {other}"),
    };
    timeline_core::export::export(&tab, &filter, export_format, output)?;
    tracing::info!(output = %output.display(), "export complete");
    Ok(())
}

pub async fn cmd_report(config: &TimelineConfig, path: &Path, sheet: Option<&str>, title: Option<&str>, output: &Path) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let tab_id = import_tab(&registry, config, "report", path, sheet).await?;
    let tab = registry.get(tab_id)?;
    let options = timeline_core::report::ReportOptions {
        title: title.map(str::to_string).unwrap_or_else(|| tab.name.clone()),
    };
    timeline_core::report::write_to_file(&tab, &options, output)?;
    tracing::info!(output = %output.display(), "report written");
    Ok(())
}

pub async fn cmd_merge(config: &TimelineConfig, sources: &[PathBuf], timestamp_column: &str, output_name: &str) -> Result<()> {
    let registry = Arc::new(TabRegistry::new());
    let mut merge_sources = Vec::new();
    for source in sources {
        let display_name = source.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| source.display().to_string());
        let tab_id = import_tab(&registry, config, &display_name, source, None).await?;
        merge_sources.push(timeline_core::merge::MergeSource {
            tab_id,
            display_name,
            timestamp_column: timestamp_column.to_string(),
        });
    }

    let tab_id = timeline_core::merge::merge_tabs(&registry, config, output_name.to_string(), &merge_sources, |progress| {
        tracing::debug!(?progress, "merge progress");
    })?;
    let tab = registry.get(tab_id)?;
    println!("{{\"tab_id\": \"{}\", \"rows\": {}}}", tab.id, tab.store.row_count().unwrap_or(-1));
    Ok(())
}

pub async fn cmd_session_restore(config: &TimelineConfig, session_path: &Path) -> Result<()> {
    let session = timeline_core::session::load(session_path)?;
    let registry = Arc::new(TabRegistry::new());
    let report = timeline_core::session::restore(&registry, config, &session);
    print_json_restore(&report)
}

fn print_json_restore(report: &timeline_core::session::RestoreReport) -> Result<()> {
    println!(
        "{{\"restored\": {}, \"failed\": {}}}",
        report.restored.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        eprintln!("tab '{}' failed to restore: {}", failure.name, failure.error);
    }
    Ok(())
}

fn resolve_column(tab: &Tab, original_or_safe: &str) -> Result<String> {
    if let Some(safe) = tab.headers.safe_for(original_or_safe) {
        return Ok(safe.to_string());
    }
    if tab.headers.safe_columns().iter().any(|c| c == original_or_safe) {
        return Ok(original_or_safe.to_string());
    }
    bail!("unknown column: {original_or_safe}")
}

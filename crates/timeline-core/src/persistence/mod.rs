//! Persistence mechanism scanner (§4.11): auto-detect event-log vs registry
//! input, run a rule engine with suppression lists and cross-event
//! correlation, and score findings by risk.

mod rules;

pub use rules::{EventLogRule, RegistryRule, Severity};

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::tab::Tab;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    EventLog,
    Registry,
}

pub fn detect_mode(tab: &Tab) -> Option<ScanMode> {
    let has = |pattern: &str| {
        tab.headers
            .original_headers()
            .iter()
            .any(|h| h.to_ascii_lowercase().contains(pattern))
    };
    if has("keypath") && has("valuename") {
        Some(ScanMode::Registry)
    } else if has("eventid") || has("event id") {
        Some(ScanMode::EventLog)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub row_id: i64,
    pub rule_name: String,
    pub category: String,
    pub severity: Severity,
    pub risk_score: u8,
    pub reasons: Vec<String>,
    pub extracted: HashMap<String, String>,
    pub timestamp: Option<String>,
}

fn fetch_all_columns(tab: &Tab, filter: &FilterModel) -> AnalyticsResult<(Vec<String>, Vec<(i64, Vec<Option<String>>)>)> {
    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let columns = tab.headers.safe_columns().to_vec();
    let col_list = columns.join(", ");
    let sql = format!("SELECT id, {col_list} FROM rows{where_sql}");

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let n = columns.len();
    let rows: Vec<(i64, Vec<Option<String>>)> = stmt
        .query_map(bind_params(&compiled.params).as_slice(), move |r| {
            let id: i64 = r.get(0)?;
            let mut values = Vec::with_capacity(n);
            for i in 0..n {
                values.push(r.get::<_, Option<String>>(i + 1)?);
            }
            Ok((id, values))
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok((columns, rows))
}

fn column_value<'a>(tab: &Tab, columns: &[String], values: &'a [Option<String>], original_header: &str) -> Option<&'a str> {
    let safe = tab.headers.safe_for(original_header)?;
    let idx = columns.iter().position(|c| c == safe)?;
    values[idx].as_deref()
}

pub fn scan_event_log(
    tab: &Tab,
    filter: &FilterModel,
    custom_rules: &[EventLogRule],
    disabled: &[usize],
) -> AnalyticsResult<Vec<Finding>> {
    let (columns, rows) = fetch_all_columns(tab, filter)?;
    let active_rules = rules::active_event_log_rules(custom_rules, disabled);

    let event_id_header = ["EventID", "Event ID"].into_iter().find(|h| tab.headers.safe_for(h).is_some());
    let channel_header = ["Channel", "LogChannel"].into_iter().find(|h| tab.headers.safe_for(h).is_some());
    let timestamp_header = tab
        .timestamp_columns
        .read()
        .unwrap()
        .first()
        .cloned();

    let mut findings = Vec::new();
    let mut task_created_images: HashMap<String, String> = HashMap::new();

    // First pass: index "Task Process Created" / "Task Action Started" rows
    // by task name so correlation can enrich earlier registration findings.
    for (_, values) in &rows {
        let task_name = column_value(tab, &columns, values, "TaskName")
            .or_else(|| column_value(tab, &columns, values, "Task Name"));
        let op = column_value(tab, &columns, values, "EventData")
            .or_else(|| column_value(tab, &columns, values, "Message"));
        if let (Some(task), Some(op)) = (task_name, op) {
            if op.contains("Process Created") || op.contains("Action Started") {
                if let Some(exe) = column_value(tab, &columns, values, "ExecutableInfo")
                    .or_else(|| column_value(tab, &columns, values, "NewProcessName"))
                {
                    task_created_images.insert(task.to_string(), exe.to_string());
                }
            }
        }
    }

    for (row_id, values) in &rows {
        let event_id = event_id_header.and_then(|h| column_value(tab, &columns, values, h));
        let channel = channel_header.and_then(|h| column_value(tab, &columns, values, h)).unwrap_or_default();
        let timestamp = timestamp_header
            .as_deref()
            .and_then(|h| tab.headers.safe_for(h))
            .and_then(|safe| columns.iter().position(|c| c == safe))
            .and_then(|idx| values[idx].clone());

        let haystack: String = values.iter().filter_map(|v| v.as_deref()).collect::<Vec<_>>().join("|");

        for rule in &active_rules {
            let Some(event_id) = event_id else { continue };
            if !rule.event_ids.contains(&event_id.to_string()) {
                continue;
            }
            if !rule.log_channels.is_empty() && !rule.log_channels.iter().any(|c| channel.contains(c.as_str())) {
                continue;
            }
            if let Some(payload_re) = &rule.payload_regex {
                if !payload_re.is_match(&haystack) {
                    continue;
                }
            }

            if rules::is_suppressed(rule, &haystack) {
                continue;
            }

            let mut extracted = HashMap::new();
            for (field, re) in &rule.extractors {
                if let Some(caps) = re.captures(&haystack) {
                    if let Some(m) = caps.get(1) {
                        extracted.insert(field.clone(), m.as_str().to_string());
                    }
                }
            }

            if rule.name.contains("Task") && rule.name.contains("Registered") {
                if let Some(task) = extracted.get("TaskName").or_else(|| extracted.get("task_name")) {
                    if let Some(exe) = task_created_images.get(task) {
                        extracted.insert("correlated_executable".to_string(), exe.clone());
                    }
                }
            }

            let (risk_score, reasons) = rules::score_event_log_finding(rule, &haystack, &extracted);

            findings.push(Finding {
                row_id: *row_id,
                rule_name: rule.name.clone(),
                category: rule.category.clone(),
                severity: rule.severity,
                risk_score,
                reasons,
                extracted,
                timestamp: timestamp.clone(),
            });
        }
    }

    findings.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then_with(|| a.timestamp.cmp(&b.timestamp)));
    Ok(findings)
}

pub fn scan_registry(
    tab: &Tab,
    filter: &FilterModel,
    custom_rules: &[RegistryRule],
    disabled: &[usize],
) -> AnalyticsResult<Vec<Finding>> {
    let (columns, rows) = fetch_all_columns(tab, filter)?;
    let active_rules = rules::active_registry_rules(custom_rules, disabled);
    let timestamp_header = tab.timestamp_columns.read().unwrap().first().cloned();

    let mut findings = Vec::new();
    for (row_id, values) in &rows {
        let Some(key_path) = column_value(tab, &columns, values, "KeyPath") else { continue };
        let value_name = column_value(tab, &columns, values, "ValueName").unwrap_or_default();
        let timestamp = timestamp_header
            .as_deref()
            .and_then(|h| tab.headers.safe_for(h))
            .and_then(|safe| columns.iter().position(|c| c == safe))
            .and_then(|idx| values[idx].clone());

        for rule in &active_rules {
            if !rule.key_path_regex.is_match(key_path) {
                continue;
            }
            if let Some(value_re) = &rule.value_name_regex {
                if !value_re.is_match(value_name) {
                    continue;
                }
            }

            findings.push(Finding {
                row_id: *row_id,
                rule_name: rule.name.clone(),
                category: rule.category.clone(),
                severity: rule.severity,
                risk_score: rules::base_score(rule.severity),
                reasons: vec![rule.description.clone()],
                extracted: HashMap::new(),
                timestamp: timestamp.clone(),
            });
        }
    }

    findings.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then_with(|| a.timestamp.cmp(&b.timestamp)));
    Ok(findings)
}

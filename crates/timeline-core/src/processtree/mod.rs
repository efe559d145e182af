//! Process-tree reconstruction (§4.9): auto-detect process/parent columns
//! by header name, link children to parents by GUID or by PID-with-
//! timestamp, compute depth by BFS with a cycle guard, and flag suspicious
//! chains against a small rule taxonomy.

mod taxonomy;

pub use taxonomy::{Severity, TaxonomyHit};

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::storage::temporal::sort_datetime;
use crate::tab::Tab;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
struct ColumnMap {
    pid: Option<String>,
    ppid: Option<String>,
    guid: Option<String>,
    parent_guid: Option<String>,
    image: Option<String>,
    parent_image: Option<String>,
    command_line: Option<String>,
    user: Option<String>,
    timestamp: Option<String>,
    event_id: Option<String>,
}

fn header_matches(tab: &Tab, pattern: &regex::Regex) -> Option<String> {
    tab.headers
        .original_headers()
        .iter()
        .find(|h| pattern.is_match(h))
        .and_then(|h| tab.headers.safe_for(h))
        .map(str::to_string)
}

macro_rules! field_re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static RE: OnceLock<regex::Regex> = OnceLock::new();
            RE.get_or_init(|| regex::RegexBuilder::new($pat).case_insensitive(true).build().unwrap())
        }
    };
}

field_re!(pid_re, r"^(process\s?id|pid|newprocessid|new process id)$");
field_re!(ppid_re, r"^(parent\s?process\s?id|ppid|parentprocessid)$");
field_re!(guid_re, r"^(process\s?guid|processguid)$");
field_re!(parent_guid_re, r"^(parent\s?process\s?guid|parentprocessguid)$");
field_re!(image_re, r"^(image|new\s?process\s?name|process\s?name)$");
field_re!(parent_image_re, r"^(parent\s?image|parent\s?process\s?name)$");
field_re!(command_line_re, r"^(command\s?line|commandline)$");
field_re!(user_re, r"^(user|account\s?name|subject\s?user\s?name)$");
field_re!(event_id_re, r"^(event\s?id|eventid)$");

fn detect_columns(tab: &Tab) -> ColumnMap {
    ColumnMap {
        pid: header_matches(tab, pid_re()),
        ppid: header_matches(tab, ppid_re()),
        guid: header_matches(tab, guid_re()),
        parent_guid: header_matches(tab, parent_guid_re()),
        image: header_matches(tab, image_re()),
        parent_image: header_matches(tab, parent_image_re()),
        command_line: header_matches(tab, command_line_re()),
        user: header_matches(tab, user_re()),
        timestamp: tab.timestamp_columns.read().unwrap().first().cloned(),
        event_id: header_matches(tab, event_id_re()),
    }
}

fn is_forensic_payload_variant(tab: &Tab) -> bool {
    let has = |name: &str| tab.headers.original_headers().iter().any(|h| h.eq_ignore_ascii_case(name));
    has("PayloadData1") && has("ExecutableInfo")
}

field_re!(payload_process_id_re, r"ProcessID:\s*(\d+)");
field_re!(payload_process_guid_re, r"ProcessGUID:\s*(\{[0-9A-Fa-f-]+\})");
field_re!(payload_parent_process_id_re, r"ParentProcessID:\s*(\d+)");
field_re!(payload_parent_process_guid_re, r"ParentProcessGUID:\s*(\{[0-9A-Fa-f-]+\})");

fn capture1(re: &regex::Regex, haystack: &str) -> Option<String> {
    re.captures(haystack).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// `0x1a2c` → `"6700"`. Values without a hex prefix pass through unchanged.
fn hex_pid_to_decimal(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if let Ok(n) = u64::from_str_radix(hex, 16) {
            return n.to_string();
        }
    }
    trimmed.to_string()
}

/// First token of a command line, quoted-first-token aware:
/// `"C:\Program Files\a.exe" --flag` → `C:\Program Files\a.exe`.
fn first_command_token(command_line: &str) -> Option<String> {
    let trimmed = command_line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }
    trimmed.split_whitespace().next().map(str::to_string)
}

#[derive(Debug, Clone)]
struct RawRow {
    row_id: i64,
    pid: Option<String>,
    ppid: Option<String>,
    guid: Option<String>,
    parent_guid: Option<String>,
    image: Option<String>,
    parent_image: Option<String>,
    command_line: Option<String>,
    user: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessNode {
    pub row_id: i64,
    pub key: String,
    pub parent_key: Option<String>,
    pub image: Option<String>,
    pub parent_image: Option<String>,
    pub command_line: Option<String>,
    pub user: Option<String>,
    pub timestamp: Option<String>,
    pub depth: usize,
    pub child_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessTreeStats {
    pub total: usize,
    pub root_count: usize,
    pub max_depth: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessTreeResult {
    pub nodes: Vec<ProcessNode>,
    pub stats: ProcessTreeStats,
    pub taxonomy_hits: Vec<TaxonomyHit>,
}

fn fetch_rows(tab: &Tab, filter: &FilterModel, columns: &ColumnMap, row_cap: usize) -> AnalyticsResult<Vec<RawRow>> {
    let forensic = is_forensic_payload_variant(tab);
    let payload_col = forensic.then(|| tab.headers.safe_for("PayloadData1")).flatten().map(str::to_string);

    let wanted = [
        &columns.pid, &columns.ppid, &columns.guid, &columns.parent_guid,
        &columns.image, &columns.parent_image, &columns.command_line,
        &columns.user, &columns.timestamp, &columns.event_id,
    ];
    let mut select_cols: Vec<String> = vec!["id".to_string()];
    for col in wanted.iter().chain(std::iter::once(&&payload_col)) {
        if let Some(c) = col {
            select_cols.push(c.clone());
        } else {
            select_cols.push("NULL".to_string());
        }
    }

    let compiled = compiled_filter(tab, filter);
    let where_sql = if compiled.where_clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", compiled.where_clause)
    };
    let sql = format!("SELECT {} FROM rows{where_sql} LIMIT {row_cap}", select_cols.join(", "));

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let n = select_cols.len();
    let rows = stmt.query_map(bind_params(&compiled.params).as_slice(), move |r| {
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(r.get::<_, Option<String>>(i)?);
        }
        Ok(values)
    })?;

    let mut out = Vec::new();
    for row in rows.filter_map(|r| r.ok()) {
        let row_id: i64 = row[0].as_deref().and_then(|s| s.parse().ok()).unwrap_or_default();
        let mut pid = row[1].clone();
        let mut ppid = row[2].clone();
        let mut guid = row[3].clone();
        let mut parent_guid = row[4].clone();
        let mut image = row[5].clone();
        let parent_image = row[6].clone();
        let command_line = row[7].clone();
        let user = row[8].clone();
        let timestamp = row[9].clone();
        let event_id = row[10].clone();
        let payload = row.get(11).cloned().flatten();

        if forensic {
            if let Some(payload) = &payload {
                pid = capture1(payload_process_id_re(), payload).or(pid);
                ppid = capture1(payload_parent_process_id_re(), payload).or(ppid);
                guid = capture1(payload_process_guid_re(), payload).or(guid);
                parent_guid = capture1(payload_parent_process_guid_re(), payload).or(parent_guid);
            }
        }
        if let Some(p) = &pid {
            pid = Some(hex_pid_to_decimal(p));
        }
        if let Some(p) = &ppid {
            ppid = Some(hex_pid_to_decimal(p));
        }
        if image.is_none() {
            image = command_line.as_deref().and_then(first_command_token);
        }

        // Security event 4688 swaps PID semantics: the logged "process id"
        // is the parent, "new process id" is the child (§4.9).
        if event_id.as_deref() == Some("4688") {
            std::mem::swap(&mut pid, &mut ppid);
        }

        out.push(RawRow {
            row_id,
            pid,
            ppid,
            guid,
            parent_guid,
            image,
            parent_image,
            command_line,
            user,
            timestamp,
        });
    }

    Ok(out)
}

pub fn reconstruct(
    tab: &Tab,
    filter: &FilterModel,
    row_cap: usize,
) -> AnalyticsResult<ProcessTreeResult> {
    let columns = detect_columns(tab);
    let truncated_candidate_count = {
        let compiled = compiled_filter(tab, filter);
        let where_sql = if compiled.where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", compiled.where_clause)
        };
        let reader = tab.store.reader();
        let sql = format!("SELECT COUNT(*) FROM rows{where_sql}");
        reader.query_row(&sql, bind_params(&compiled.params).as_slice(), |r| r.get::<_, i64>(0))? as usize
    };
    let rows = fetch_rows(tab, filter, &columns, row_cap)?;

    // pid -> candidates (key, timestamp sortable, row index), used only
    // when GUIDs aren't populated.
    let mut pid_candidates: HashMap<String, Vec<(usize, String, String)>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if let Some(pid) = &row.pid {
            let key = row.guid.clone().unwrap_or_else(|| format!("pid:{pid}:{idx}"));
            let sortable = row.timestamp.as_deref().map(sort_datetime).unwrap_or_default();
            pid_candidates.entry(pid.clone()).or_default().push((idx, sortable, key));
        }
    }

    let mut nodes: Vec<ProcessNode> = Vec::with_capacity(rows.len());
    let mut key_to_index: HashMap<String, usize> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let key = if let Some(guid) = &row.guid {
            guid.clone()
        } else if let Some(pid) = &row.pid {
            format!("pid:{pid}:{idx}")
        } else {
            format!("row:{}", row.row_id)
        };

        let parent_key = if row.guid.is_some() && row.parent_guid.is_some() {
            row.parent_guid.clone()
        } else if let Some(ppid) = &row.ppid {
            let child_sortable = row.timestamp.as_deref().map(sort_datetime).unwrap_or_default();
            pid_candidates
                .get(ppid)
                .into_iter()
                .flatten()
                .filter(|(cand_idx, ts, _)| *cand_idx != idx && *ts < child_sortable)
                .max_by(|a, b| a.1.cmp(&b.1))
                .map(|(_, _, key)| key.clone())
        } else {
            None
        };

        nodes.push(ProcessNode {
            row_id: row.row_id,
            key: key.clone(),
            parent_key,
            image: row.image.clone(),
            parent_image: row.parent_image.clone(),
            command_line: row.command_line.clone(),
            user: row.user.clone(),
            timestamp: row.timestamp.clone(),
            depth: 0,
            child_count: 0,
        });
        key_to_index.insert(key, idx);
    }

    // Child counts.
    let mut child_counts: HashMap<String, usize> = HashMap::new();
    for node in &nodes {
        if let Some(parent) = &node.parent_key {
            *child_counts.entry(parent.clone()).or_insert(0) += 1;
        }
    }
    for node in &mut nodes {
        node.child_count = child_counts.get(&node.key).copied().unwrap_or(0);
    }

    // BFS depth from roots, cycle guard via a visited set.
    let roots: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.parent_key.as_ref().is_none_or(|p| !key_to_index.contains_key(p)))
        .map(|(i, _)| i)
        .collect();

    let children_of: HashMap<usize, Vec<usize>> = {
        let mut map: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            if let Some(parent_key) = &node.parent_key {
                if let Some(&parent_idx) = key_to_index.get(parent_key) {
                    map.entry(parent_idx).or_default().push(idx);
                }
            }
        }
        map
    };

    let mut visited: HashSet<usize> = HashSet::new();
    let mut max_depth = 0usize;
    let mut queue: std::collections::VecDeque<(usize, usize)> =
        roots.iter().map(|&r| (r, 0)).collect();
    for &r in &roots {
        visited.insert(r);
    }
    while let Some((idx, depth)) = queue.pop_front() {
        nodes[idx].depth = depth;
        max_depth = max_depth.max(depth);
        if let Some(children) = children_of.get(&idx) {
            for &child in children {
                if visited.insert(child) {
                    queue.push_back((child, depth + 1));
                }
            }
        }
    }

    let taxonomy_hits = taxonomy::scan(&nodes);

    Ok(ProcessTreeResult {
        stats: ProcessTreeStats {
            total: nodes.len(),
            root_count: roots.len(),
            max_depth,
            truncated: truncated_candidate_count > row_cap,
        },
        nodes,
        taxonomy_hits,
    })
}

//! Lateral-movement graph reconstruction (§4.10): aggregate logon/session
//! events into source→target edges, flag outlier hostnames, find temporal
//! chains across hosts, and correlate RDP session lifecycles.

mod chains;
mod rdp;

pub use chains::Chain;
pub use rdp::{RdpSession, SessionStatus};

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::query::{bind_params, compiled_filter};
use crate::storage::temporal::sort_datetime;
use crate::tab::Tab;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Event ids that represent logon activity worth graphing, absent an
/// explicit caller-supplied set.
pub const DEFAULT_EVENT_IDS: &[&str] = &["4624", "4625", "4648", "4778", "4779", "21", "22", "25"];

#[derive(Debug, Clone, Default)]
struct ColumnMap {
    source: Option<String>,
    target: Option<String>,
    user: Option<String>,
    logon_type: Option<String>,
    event_id: Option<String>,
    timestamp: Option<String>,
    client_name: Option<String>,
    client_address: Option<String>,
    remote_host: Option<String>,
}

macro_rules! field_re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static RE: OnceLock<regex::Regex> = OnceLock::new();
            RE.get_or_init(|| regex::RegexBuilder::new($pat).case_insensitive(true).build().unwrap())
        }
    };
}

field_re!(source_re, r"^(source\s?(network\s?)?address|workstation\s?name|ip\s?address)$");
field_re!(target_re, r"^(target\s?(server|computer)|computer)$");
field_re!(user_re, r"^(account\s?name|target\s?user\s?name|user)$");
field_re!(logon_type_re, r"^logon\s?type$");
field_re!(event_id_re, r"^(event\s?id|eventid)$");
field_re!(client_name_re, r"^(client\s?name)$");
field_re!(client_address_re, r"^(client\s?address)$");
field_re!(remote_host_re, r"^(remotehost|remote\s?host)$");
field_re!(payload_user_re, r"User:\s*([^\s,|]+)");
field_re!(payload_logon_type_re, r"LogonType\s*(\d+)");
field_re!(payload_client_name_re, r"ClientName:\s*([^\s,|]+)");
field_re!(payload_client_address_re, r"ClientAddress:\s*([^\s,|]+)");
field_re!(remote_host_pair_re, r"^(.*?)\s*\(([\d.]+)\)\s*$");

fn header_matches(tab: &Tab, pattern: &regex::Regex) -> Option<String> {
    tab.headers
        .original_headers()
        .iter()
        .find(|h| pattern.is_match(h))
        .and_then(|h| tab.headers.safe_for(h))
        .map(str::to_string)
}

fn detect_columns(tab: &Tab) -> ColumnMap {
    ColumnMap {
        source: header_matches(tab, source_re()),
        target: header_matches(tab, target_re()),
        user: header_matches(tab, user_re()),
        logon_type: header_matches(tab, logon_type_re()),
        event_id: header_matches(tab, event_id_re()),
        timestamp: tab.timestamp_columns.read().unwrap().first().cloned(),
        client_name: header_matches(tab, client_name_re()),
        client_address: header_matches(tab, client_address_re()),
        remote_host: header_matches(tab, remote_host_re()),
    }
}

const SERVICE_ACCOUNT_EXACT: &[&str] = &["SYSTEM", "LOCAL SERVICE", "NETWORK SERVICE"];

fn is_service_account(user: &str) -> bool {
    let upper = user.to_ascii_uppercase();
    SERVICE_ACCOUNT_EXACT.contains(&upper.as_str())
        || upper.starts_with("DWM-")
        || upper.starts_with("UMFD-")
        || upper.ends_with('$')
}

fn is_loopback(addr: &str) -> bool {
    matches!(addr, "127.0.0.1" | "::1" | "localhost" | "-" | "")
}

field_re!(outlier_desktop_re, r"^DESKTOP-[A-Z0-9]{5,}$");
field_re!(outlier_win_re, r"^WIN-[A-Z0-9]{5,}$");
field_re!(outlier_generic_re, r"^(TEST|TEMP|DEMO|SANDBOX)[-_]?\w*$");

const DISTRO_DEFAULT_HOSTNAMES: &[&str] =
    &["UBUNTU", "DEBIAN", "KALI", "RASPBERRYPI", "METASPLOITABLE", "LOCALHOST", "LOCALHOST.LOCALDOMAIN"];

#[derive(Debug, Clone, Serialize)]
pub struct OutlierHost {
    pub host: String,
    pub reason: String,
}

fn classify_outlier(host: &str) -> Option<OutlierHost> {
    let upper = host.to_ascii_uppercase();
    if outlier_desktop_re().is_match(&upper) {
        return Some(OutlierHost { host: host.to_string(), reason: "default Windows desktop hostname pattern".into() });
    }
    if outlier_win_re().is_match(&upper) {
        return Some(OutlierHost { host: host.to_string(), reason: "default Windows Server hostname pattern".into() });
    }
    if outlier_generic_re().is_match(&upper) {
        return Some(OutlierHost { host: host.to_string(), reason: "generic or test hostname".into() });
    }
    if DISTRO_DEFAULT_HOSTNAMES.contains(&upper.as_str()) {
        return Some(OutlierHost { host: host.to_string(), reason: "default Linux distro hostname".into() });
    }
    if !host.is_ascii() {
        return Some(OutlierHost { host: host.to_string(), reason: "non-ASCII hostname".into() });
    }
    None
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub count: i64,
    pub users: Vec<String>,
    pub logon_types: Vec<String>,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub has_failures: bool,
    pub client_names: Vec<String>,
    pub client_addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStats {
    pub host: String,
    pub is_source: bool,
    pub is_target: bool,
    pub event_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LateralMovementResult {
    pub edges: Vec<Edge>,
    pub hosts: Vec<HostStats>,
    pub outliers: Vec<OutlierHost>,
    pub chains: Vec<Chain>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawEvent {
    pub source: Option<String>,
    pub target: Option<String>,
    pub user: Option<String>,
    pub logon_type: Option<String>,
    pub event_id: Option<String>,
    pub timestamp: Option<String>,
    pub timestamp_sortable: String,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
}

fn fetch_events(
    tab: &Tab,
    filter: &FilterModel,
    columns: &ColumnMap,
    event_ids: &[String],
    row_cap: usize,
) -> AnalyticsResult<Vec<RawEvent>> {
    let forensic_remote_host = columns.remote_host.is_some() && columns.source.is_none();
    let payload_col = tab.headers.safe_columns().iter().find(|c| {
        tab.headers
            .original_for(c)
            .is_some_and(|h| h.eq_ignore_ascii_case("PayloadData1") || h.eq_ignore_ascii_case("PayloadData"))
    });

    let mut select_cols: Vec<String> = vec!["id".to_string()];
    let slots = [
        &columns.source, &columns.target, &columns.user, &columns.logon_type,
        &columns.event_id, &columns.timestamp, &columns.client_name, &columns.client_address,
        &columns.remote_host,
    ];
    for col in slots {
        select_cols.push(col.clone().unwrap_or_else(|| "NULL".to_string()));
    }
    select_cols.push(payload_col.cloned().unwrap_or_else(|| "NULL".to_string()));

    let compiled = compiled_filter(tab, filter);
    let mut where_parts = Vec::new();
    if !compiled.where_clause.is_empty() {
        where_parts.push(compiled.where_clause.clone());
    }
    let mut params = compiled.params.clone();
    if let (Some(event_col), false) = (&columns.event_id, event_ids.is_empty()) {
        let placeholders = vec!["?"; event_ids.len()].join(", ");
        where_parts.push(format!("{event_col} IN ({placeholders})"));
        params.extend(event_ids.iter().map(|id| rusqlite::types::Value::Text(id.clone())));
    }
    let where_sql = if where_parts.is_empty() { String::new() } else { format!(" WHERE {}", where_parts.join(" AND ")) };
    let sql = format!("SELECT {} FROM rows{where_sql} LIMIT {row_cap}", select_cols.join(", "));

    let reader = tab.store.reader();
    let mut stmt = reader.prepare(&sql)?;
    let n = select_cols.len();
    let rows = stmt.query_map(bind_params(&params).as_slice(), move |r| {
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(r.get::<_, Option<String>>(i)?);
        }
        Ok(values)
    })?;

    let mut out = Vec::new();
    for row in rows.filter_map(|r| r.ok()) {
        let mut source = row[1].clone();
        let mut target = row[2].clone();
        let mut user = row[3].clone();
        let mut logon_type = row[4].clone();
        let event_id = row[5].clone();
        let timestamp = row[6].clone();
        let mut client_name = row[7].clone();
        let mut client_address = row[8].clone();
        let remote_host = row[9].clone();
        let payload = row.get(10).cloned().flatten();

        if forensic_remote_host {
            if let Some(rh) = &remote_host {
                if let Some(caps) = remote_host_pair_re().captures(rh) {
                    source = Some(caps[1].trim().to_string());
                    target = target.or_else(|| Some(caps[2].to_string()));
                } else {
                    source = Some(rh.clone());
                }
            }
        }
        if let Some(payload) = &payload {
            user = user.or_else(|| capture1(payload_user_re(), payload));
            logon_type = logon_type.or_else(|| capture1(payload_logon_type_re(), payload));
            client_name = client_name.or_else(|| capture1(payload_client_name_re(), payload));
            client_address = client_address.or_else(|| capture1(payload_client_address_re(), payload));
        }

        let timestamp_sortable = timestamp.as_deref().map(sort_datetime).unwrap_or_default();
        out.push(RawEvent {
            source,
            target,
            user,
            logon_type,
            event_id,
            timestamp,
            timestamp_sortable,
            client_name,
            client_address,
        });
    }

    Ok(out)
}

fn capture1(re: &regex::Regex, haystack: &str) -> Option<String> {
    re.captures(haystack).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Event ids whose presence marks a logon failure, for the `has_failures`
/// edge flag.
const FAILURE_EVENT_IDS: &[&str] = &["4625", "25"];

pub fn reconstruct(
    tab: &Tab,
    filter: &FilterModel,
    event_ids: &[String],
    row_cap: usize,
    chain_cap: usize,
    exclude_self_loops: bool,
) -> AnalyticsResult<LateralMovementResult> {
    let columns = detect_columns(tab);
    let events = fetch_events(tab, filter, &columns, event_ids, row_cap)?;

    let mut edge_map: HashMap<(String, String), Edge> = HashMap::new();
    let mut host_event_counts: HashMap<String, (i64, bool, bool)> = HashMap::new();
    let mut all_hosts: HashSet<String> = HashSet::new();

    for event in &events {
        let Some(source) = &event.source else { continue };
        let Some(target) = &event.target else { continue };
        if source.is_empty() || is_loopback(source) {
            continue;
        }
        if exclude_self_loops && source.eq_ignore_ascii_case(target) {
            continue;
        }
        if let Some(user) = &event.user {
            if is_service_account(user) {
                continue;
            }
        }

        all_hosts.insert(source.clone());
        all_hosts.insert(target.clone());

        let src_entry = host_event_counts.entry(source.clone()).or_insert((0, false, false));
        src_entry.0 += 1;
        src_entry.1 = true;
        let tgt_entry = host_event_counts.entry(target.clone()).or_insert((0, false, false));
        tgt_entry.0 += 1;
        tgt_entry.2 = true;

        let key = (source.clone(), target.clone());
        let edge = edge_map.entry(key).or_insert_with(|| Edge {
            source: source.clone(),
            target: target.clone(),
            count: 0,
            users: Vec::new(),
            logon_types: Vec::new(),
            first_seen: None,
            last_seen: None,
            has_failures: false,
            client_names: Vec::new(),
            client_addresses: Vec::new(),
        });
        edge.count += 1;
        if let Some(user) = &event.user {
            if !edge.users.contains(user) {
                edge.users.push(user.clone());
            }
        }
        if let Some(lt) = &event.logon_type {
            if !edge.logon_types.contains(lt) {
                edge.logon_types.push(lt.clone());
            }
        }
        if let Some(cn) = &event.client_name {
            if !edge.client_names.contains(cn) {
                edge.client_names.push(cn.clone());
            }
        }
        if let Some(ca) = &event.client_address {
            if !edge.client_addresses.contains(ca) {
                edge.client_addresses.push(ca.clone());
            }
        }
        if event.event_id.as_deref().is_some_and(|id| FAILURE_EVENT_IDS.contains(&id)) {
            edge.has_failures = true;
        }
        match (&edge.first_seen, &event.timestamp) {
            (None, Some(_)) => edge.first_seen = event.timestamp.clone(),
            (Some(existing), Some(ts)) if sort_datetime(ts) < sort_datetime(existing) => edge.first_seen = event.timestamp.clone(),
            _ => {}
        }
        match (&edge.last_seen, &event.timestamp) {
            (None, Some(_)) => edge.last_seen = event.timestamp.clone(),
            (Some(existing), Some(ts)) if sort_datetime(ts) > sort_datetime(existing) => edge.last_seen = event.timestamp.clone(),
            _ => {}
        }
    }

    let mut edges: Vec<Edge> = edge_map.into_values().collect();
    edges.sort_by(|a, b| (a.source.as_str(), a.target.as_str()).cmp(&(b.source.as_str(), b.target.as_str())));

    let mut hosts: Vec<HostStats> = host_event_counts
        .into_iter()
        .map(|(host, (count, is_source, is_target))| HostStats { host, is_source, is_target, event_count: count })
        .collect();
    hosts.sort_by(|a, b| a.host.cmp(&b.host));

    let mut outliers: Vec<OutlierHost> = all_hosts.iter().filter_map(|h| classify_outlier(h)).collect();
    outliers.sort_by(|a, b| a.host.cmp(&b.host));

    let chains = chains::find_chains(&events, chain_cap);

    Ok(LateralMovementResult { edges, hosts, outliers, chains })
}

/// RDP session lifecycle correlation, independent of the edge/chain graph
/// above since it keys on a different event-id set and time-window logic.
pub fn rdp_sessions(tab: &Tab, filter: &FilterModel, row_cap: usize) -> AnalyticsResult<Vec<RdpSession>> {
    let columns = detect_columns(tab);
    let rdp_event_ids = ["1149", "21", "24", "23", "4634", "25"].map(str::to_string).to_vec();
    let events = fetch_events(tab, filter, &columns, &rdp_event_ids, row_cap)?;
    Ok(rdp::correlate(&events))
}

//! Temporal chain detection (§4.10): from every host that ever sources a
//! connection, DFS forward along edges whose timestamps are non-decreasing,
//! collecting hop sequences of length two or more.

use super::RawEvent;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct Chain {
    pub hosts: Vec<String>,
    pub hop_count: usize,
}

struct Hop<'a> {
    target: &'a str,
    timestamp_sortable: &'a str,
}

fn adjacency(events: &[RawEvent]) -> HashMap<&str, Vec<Hop<'_>>> {
    let mut map: HashMap<&str, Vec<Hop<'_>>> = HashMap::new();
    for event in events {
        let (Some(source), Some(target)) = (&event.source, &event.target) else { continue };
        if source == target {
            continue;
        }
        map.entry(source.as_str())
            .or_default()
            .push(Hop { target: target.as_str(), timestamp_sortable: &event.timestamp_sortable });
    }
    for hops in map.values_mut() {
        hops.sort_by(|a, b| a.timestamp_sortable.cmp(b.timestamp_sortable));
    }
    map
}

fn dfs<'a>(
    host: &'a str,
    min_ts: &str,
    adj: &HashMap<&'a str, Vec<Hop<'a>>>,
    path: &mut Vec<String>,
    visited: &mut HashSet<&'a str>,
    out: &mut Vec<Chain>,
) {
    let Some(hops) = adj.get(host) else { return };
    for hop in hops {
        if hop.timestamp_sortable < min_ts || visited.contains(hop.target) {
            continue;
        }
        visited.insert(hop.target);
        path.push(hop.target.to_string());
        if path.len() >= 2 {
            out.push(Chain { hosts: path.clone(), hop_count: path.len() - 1 });
        }
        dfs(hop.target, hop.timestamp_sortable, adj, path, visited, out);
        path.pop();
        visited.remove(hop.target);
    }
}

pub(super) fn find_chains(events: &[RawEvent], cap: usize) -> Vec<Chain> {
    let adj = adjacency(events);
    let mut chains = Vec::new();

    for &host in adj.keys() {
        let mut path = vec![host.to_string()];
        let mut visited = HashSet::from([host]);
        dfs(host, "", &adj, &mut path, &mut visited, &mut chains);
    }

    chains.sort_by(|a, b| b.hop_count.cmp(&a.hop_count));
    chains.truncate(cap);
    chains
}

//! Burst analysis (§4.7): minute buckets aggregated into fixed-width
//! windows; a window bursts when its count exceeds `baseline × multiplier`
//! (baseline = median window count, floored at 1). Adjacent burst windows
//! merge into reported periods.

use crate::error::AnalyticsResult;
use crate::filter::FilterModel;
use crate::tab::Tab;
use chrono::DateTime;
use serde::Serialize;

use super::gaps::minute_buckets_with_ts;

#[derive(Debug, Clone, Serialize)]
pub struct BurstWindow {
    pub start: String,
    pub event_count: i64,
    pub is_burst: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BurstPeriod {
    pub start: String,
    pub end: String,
    pub event_count: i64,
    pub peak_rate: f64,
    pub burst_factor: f64,
    pub duration_minutes: i64,
    pub window_count: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BurstAnalysis {
    pub baseline: f64,
    pub windows: Vec<BurstWindow>,
    pub periods: Vec<BurstPeriod>,
}

fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

fn window_label(minute: i64) -> String {
    DateTime::from_timestamp(minute * 60, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

pub fn burst_analysis(
    tab: &Tab,
    filter: &FilterModel,
    column: &str,
    window_minutes: i64,
    multiplier: f64,
) -> AnalyticsResult<BurstAnalysis> {
    let buckets = minute_buckets_with_ts(tab, filter, column)?;
    let mut result = BurstAnalysis::default();
    if buckets.is_empty() {
        return Ok(result);
    }

    let min_m = buckets.first().unwrap().0;
    let max_m = buckets.last().unwrap().0;
    let num_windows = ((max_m - min_m) / window_minutes + 1).max(1) as usize;
    let mut window_counts = vec![0i64; num_windows];
    for (ts, count) in &buckets {
        let idx = ((ts - min_m) / window_minutes) as usize;
        window_counts[idx] += count;
    }

    let baseline = median(&window_counts).max(1.0);
    let threshold = baseline * multiplier;

    let windows: Vec<BurstWindow> = window_counts
        .iter()
        .enumerate()
        .map(|(idx, &count)| BurstWindow {
            start: window_label(min_m + idx as i64 * window_minutes),
            event_count: count,
            is_burst: (count as f64) > threshold,
        })
        .collect();

    let mut idx = 0;
    while idx < windows.len() {
        if !windows[idx].is_burst {
            idx += 1;
            continue;
        }
        let period_start_idx = idx;
        let mut total_events = 0i64;
        let mut peak_rate = 0i64;
        while idx < windows.len() && windows[idx].is_burst {
            total_events += windows[idx].event_count;
            peak_rate = peak_rate.max(windows[idx].event_count);
            idx += 1;
        }
        let period_window_count = idx - period_start_idx;
        result.periods.push(BurstPeriod {
            start: windows[period_start_idx].start.clone(),
            end: windows[idx - 1].start.clone(),
            event_count: total_events,
            peak_rate: peak_rate as f64,
            burst_factor: total_events as f64 / (period_window_count as f64 * baseline),
            duration_minutes: period_window_count as i64 * window_minutes,
            window_count: period_window_count,
        });
    }

    result.baseline = baseline;
    result.windows = windows;
    Ok(result)
}

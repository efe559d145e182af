//! RDP session lifecycle correlation (§4.10): group connect/disconnect/
//! logoff events keyed by `(source, target, user)` and match candidate
//! events into a session by time-window proximity.

use super::RawEvent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Active,
    NoLogoff,
    Disconnected,
    Ended,
    Failed,
    Connecting,
    Incomplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct RdpSession {
    pub source: String,
    pub target: String,
    pub user: Option<String>,
    pub connect_time: Option<String>,
    pub logon_time: Option<String>,
    pub disconnect_time: Option<String>,
    pub logoff_time: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy)]
enum LifecycleKind {
    Connecting,
    Logon,
    Disconnect,
    Logoff,
    Failed,
}

fn classify_event_id(event_id: &str) -> Option<LifecycleKind> {
    match event_id {
        "1149" => Some(LifecycleKind::Connecting),
        "21" => Some(LifecycleKind::Logon),
        "24" => Some(LifecycleKind::Disconnect),
        "23" | "4634" => Some(LifecycleKind::Logoff),
        "25" => Some(LifecycleKind::Failed),
        _ => None,
    }
}

/// Seconds of tolerance for matching a candidate event into an in-progress
/// session, keyed by lifecycle stage per §4.10.
fn window_seconds(kind: LifecycleKind) -> i64 {
    match kind {
        LifecycleKind::Connecting | LifecycleKind::Failed => 5,
        LifecycleKind::Logon => 30,
        LifecycleKind::Disconnect | LifecycleKind::Logoff => 60,
    }
}

fn seconds_between(earlier_sortable: &str, later_sortable: &str) -> i64 {
    use chrono::NaiveDateTime;
    let parse = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok();
    match (parse(earlier_sortable), parse(later_sortable)) {
        (Some(a), Some(b)) => (b - a).num_seconds().abs(),
        _ => i64::MAX,
    }
}

struct Stage {
    kind: LifecycleKind,
    timestamp: Option<String>,
    timestamp_sortable: String,
}

pub(super) fn correlate(events: &[RawEvent]) -> Vec<RdpSession> {
    let mut by_key: std::collections::HashMap<(String, String, Option<String>), Vec<Stage>> = std::collections::HashMap::new();

    for event in events {
        let (Some(source), Some(target)) = (&event.source, &event.target) else { continue };
        let Some(kind) = event.event_id.as_deref().and_then(classify_event_id) else { continue };
        by_key
            .entry((source.clone(), target.clone(), event.user.clone()))
            .or_default()
            .push(Stage { kind, timestamp: event.timestamp.clone(), timestamp_sortable: event.timestamp_sortable.clone() });
    }

    let mut sessions = Vec::new();
    for ((source, target, user), mut stages) in by_key {
        stages.sort_by(|a, b| a.timestamp_sortable.cmp(&b.timestamp_sortable));

        let mut current: Option<RdpSession> = None;
        let mut last_ts: Option<String> = None;
        for stage in stages {
            let within_window = match &last_ts {
                Some(prev) => seconds_between(prev, &stage.timestamp_sortable) <= window_seconds(stage.kind),
                None => false,
            };
            last_ts = Some(stage.timestamp_sortable.clone());

            match stage.kind {
                LifecycleKind::Connecting if current.is_none() || !within_window => {
                    if let Some(session) = current.take() {
                        sessions.push(finalize(session));
                    }
                    current = Some(RdpSession {
                        source: source.clone(),
                        target: target.clone(),
                        user: user.clone(),
                        connect_time: stage.timestamp,
                        logon_time: None,
                        disconnect_time: None,
                        logoff_time: None,
                        status: SessionStatus::Connecting,
                    });
                }
                LifecycleKind::Connecting => {
                    if let Some(session) = current.as_mut() {
                        session.connect_time = session.connect_time.clone().or(stage.timestamp);
                    }
                }
                LifecycleKind::Logon => {
                    let session = current.get_or_insert_with(|| RdpSession {
                        source: source.clone(),
                        target: target.clone(),
                        user: user.clone(),
                        connect_time: None,
                        logon_time: None,
                        disconnect_time: None,
                        logoff_time: None,
                        status: SessionStatus::Active,
                    });
                    session.logon_time = stage.timestamp;
                    session.status = SessionStatus::Active;
                }
                LifecycleKind::Disconnect => {
                    if let Some(session) = current.as_mut() {
                        session.disconnect_time = stage.timestamp;
                        session.status = SessionStatus::Disconnected;
                    }
                }
                LifecycleKind::Logoff => {
                    if let Some(session) = current.as_mut() {
                        session.logoff_time = stage.timestamp;
                        session.status = SessionStatus::Ended;
                    }
                    if let Some(session) = current.take() {
                        sessions.push(finalize(session));
                    }
                }
                LifecycleKind::Failed => {
                    if let Some(session) = current.take() {
                        sessions.push(finalize(session));
                    }
                    sessions.push(RdpSession {
                        source: source.clone(),
                        target: target.clone(),
                        user: user.clone(),
                        connect_time: stage.timestamp,
                        logon_time: None,
                        disconnect_time: None,
                        logoff_time: None,
                        status: SessionStatus::Failed,
                    });
                }
            }
        }
        if let Some(session) = current {
            sessions.push(finalize(session));
        }
    }

    sessions
}

fn finalize(mut session: RdpSession) -> RdpSession {
    session.status = match session.status {
        SessionStatus::Failed | SessionStatus::Ended => session.status,
        _ if session.logoff_time.is_some() => SessionStatus::Ended,
        _ if session.disconnect_time.is_some() => SessionStatus::Disconnected,
        _ if session.logon_time.is_some() => SessionStatus::NoLogoff,
        _ if session.connect_time.is_some() => SessionStatus::Incomplete,
        other => other,
    };
    session
}

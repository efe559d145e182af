//! Built-in persistence rule tables. A representative sample of common
//! Windows persistence techniques, not an exhaustive detection engine.

use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

pub struct EventLogRule {
    pub name: String,
    pub category: String,
    pub event_ids: Vec<String>,
    pub log_channels: Vec<String>,
    pub severity: Severity,
    pub extractors: Vec<(String, regex::Regex)>,
    pub payload_regex: Option<regex::Regex>,
    pub suppressed_service_names: Vec<&'static str>,
    pub expected_install_root: Option<&'static str>,
}

pub struct RegistryRule {
    pub name: String,
    pub category: String,
    pub key_path_regex: regex::Regex,
    pub value_name_regex: Option<regex::Regex>,
    pub severity: Severity,
    pub description: String,
}

fn ex(field: &str, pattern: &str) -> (String, regex::Regex) {
    (field.to_string(), regex::RegexBuilder::new(pattern).case_insensitive(true).build().unwrap())
}

fn re(pattern: &str) -> regex::Regex {
    regex::RegexBuilder::new(pattern).case_insensitive(true).build().unwrap()
}

fn builtin_event_log_rules() -> &'static Vec<EventLogRule> {
    static RULES: OnceLock<Vec<EventLogRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            EventLogRule {
                name: "Scheduled Task Registered".to_string(),
                category: "Scheduled Task".to_string(),
                event_ids: vec!["4698".to_string()],
                log_channels: vec!["Microsoft-Windows-TaskScheduler".to_string(), "Security".to_string()],
                severity: Severity::Medium,
                extractors: vec![ex("TaskName", r"Task Name:\s*([^\r\n|]+)")],
                payload_regex: None,
                suppressed_service_names: vec![],
                expected_install_root: None,
            },
            EventLogRule {
                name: "Scheduled Task Updated".to_string(),
                category: "Scheduled Task".to_string(),
                event_ids: vec!["4702".to_string()],
                log_channels: vec!["Microsoft-Windows-TaskScheduler".to_string(), "Security".to_string()],
                severity: Severity::Medium,
                extractors: vec![ex("TaskName", r"Task Name:\s*([^\r\n|]+)")],
                payload_regex: None,
                suppressed_service_names: vec![],
                expected_install_root: None,
            },
            EventLogRule {
                name: "Scheduled Task Deleted".to_string(),
                category: "Anti-Forensics".to_string(),
                event_ids: vec!["4699".to_string()],
                log_channels: vec!["Microsoft-Windows-TaskScheduler".to_string(), "Security".to_string()],
                severity: Severity::High,
                extractors: vec![ex("TaskName", r"Task Name:\s*([^\r\n|]+)")],
                payload_regex: None,
                suppressed_service_names: vec![],
                expected_install_root: None,
            },
            EventLogRule {
                name: "New Service Installed".to_string(),
                category: "Service".to_string(),
                event_ids: vec!["7045".to_string(), "4697".to_string()],
                log_channels: vec!["System".to_string(), "Security".to_string()],
                severity: Severity::High,
                extractors: vec![
                    ex("ServiceName", r"Service Name:\s*([^\r\n|]+)"),
                    ex("ImagePath", r"Service File Name:\s*([^\r\n|]+)"),
                ],
                payload_regex: None,
                suppressed_service_names: vec!["WinDefend", "Sense", "wuauserv", "GoogleUpdate", "MicrosoftEdgeUpdate"],
                expected_install_root: Some(r"C:\Program Files"),
            },
            EventLogRule {
                name: "Run Key Modified".to_string(),
                category: "Registry Run Key".to_string(),
                event_ids: vec!["13".to_string()],
                log_channels: vec!["Microsoft-Windows-Sysmon".to_string()],
                severity: Severity::High,
                extractors: vec![
                    ex("TargetObject", r"TargetObject:\s*([^\r\n|]+)"),
                    ex("Details", r"Details:\s*([^\r\n|]+)"),
                ],
                payload_regex: Some(re(r"(?i)\\(CurrentVersion\\Run|RunOnce)\\")),
                suppressed_service_names: vec![],
                expected_install_root: None,
            },
            EventLogRule {
                name: "WMI Event Subscription".to_string(),
                category: "WMI".to_string(),
                event_ids: vec!["19".to_string(), "20".to_string(), "21".to_string()],
                log_channels: vec!["Microsoft-Windows-Sysmon".to_string()],
                severity: Severity::Critical,
                extractors: vec![ex("Name", r"Name:\s*([^\r\n|]+)")],
                payload_regex: None,
                suppressed_service_names: vec![],
                expected_install_root: None,
            },
        ]
    })
}

fn builtin_registry_rules() -> &'static Vec<RegistryRule> {
    static RULES: OnceLock<Vec<RegistryRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            RegistryRule {
                name: "Run Key".to_string(),
                category: "Registry Run Key".to_string(),
                key_path_regex: re(r"\\(CurrentVersion\\Run|RunOnce)(\\|$)"),
                value_name_regex: None,
                severity: Severity::High,
                description: "Value added under a Run/RunOnce autostart key".to_string(),
            },
            RegistryRule {
                name: "Winlogon Shell/Userinit".to_string(),
                category: "Winlogon".to_string(),
                key_path_regex: re(r"\\Winlogon$"),
                value_name_regex: Some(re(r"^(Shell|Userinit)$")),
                severity: Severity::Critical,
                description: "Winlogon Shell or Userinit value modified".to_string(),
            },
            RegistryRule {
                name: "Image File Execution Options Debugger".to_string(),
                category: "IFEO".to_string(),
                key_path_regex: re(r"\\Image File Execution Options\\"),
                value_name_regex: Some(re(r"^Debugger$")),
                severity: Severity::Critical,
                description: "Debugger value set under Image File Execution Options, a common hijack technique".to_string(),
            },
            RegistryRule {
                name: "Services ImagePath".to_string(),
                category: "Service".to_string(),
                key_path_regex: re(r"\\Services\\[^\\]+$"),
                value_name_regex: Some(re(r"^ImagePath$")),
                severity: Severity::High,
                description: "Service ImagePath value modified".to_string(),
            },
            RegistryRule {
                name: "AppInit DLLs".to_string(),
                category: "AppInit".to_string(),
                key_path_regex: re(r"\\Windows\\AppInit_DLLs$"),
                value_name_regex: None,
                severity: Severity::Critical,
                description: "AppInit_DLLs value modified, loads into every process that links user32".to_string(),
            },
        ]
    })
}

pub(crate) fn active_event_log_rules<'a>(custom: &'a [EventLogRule], disabled: &[usize]) -> Vec<&'a EventLogRule> {
    builtin_event_log_rules()
        .iter()
        .enumerate()
        .filter(|(i, _)| !disabled.contains(i))
        .map(|(_, r)| r)
        .chain(custom.iter())
        .collect()
}

pub(crate) fn active_registry_rules<'a>(custom: &'a [RegistryRule], disabled: &[usize]) -> Vec<&'a RegistryRule> {
    builtin_registry_rules()
        .iter()
        .enumerate()
        .filter(|(i, _)| !disabled.contains(i))
        .map(|(_, r)| r)
        .chain(custom.iter())
        .collect()
}

/// A suppressed rule is retained (not actually filtered) when the image
/// path in the haystack doesn't match the expected install root — that
/// mismatch is "browser mimicry" and is a stronger signal than the
/// original event, so suppression never applies in that case.
pub(crate) fn is_suppressed(rule: &EventLogRule, haystack: &str) -> bool {
    if rule.suppressed_service_names.is_empty() {
        return false;
    }
    let Some(name) = rule.suppressed_service_names.iter().find(|n| haystack.contains(**n)) else {
        return false;
    };
    let _ = name;
    match rule.expected_install_root {
        Some(root) => haystack.contains(root),
        None => true,
    }
}

pub(crate) fn base_score(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 8,
        Severity::High => 6,
        Severity::Medium => 4,
        Severity::Low => 2,
    }
}

const SUSPICIOUS_PATH_SUBSTRINGS: &[&str] = &["\\Temp\\", "\\AppData\\Local\\Temp\\", "\\Users\\Public\\", "\\ProgramData\\"];
const SUSPICIOUS_COMMAND_SUBSTRINGS: &[&str] = &["-windowstyle hidden", "-w hidden", "bypass", "iex(", "invoke-expression"];
const ENCODING_SUBSTRINGS: &[&str] = &["-enc ", "-encodedcommand", "frombase64string", "downloadstring", "downloadfile"];
const KNOWN_MALICIOUS_TOOLS: &[&str] = &["mimikatz", "cobaltstrike", "psexec64"];
const LOLBINS: &[&str] = &["rundll32", "regsvr32", "mshta", "certutil", "wmic", "msbuild"];
const MICROSOFT_INSTALL_ROOT: &str = r"c:\windows\system32";

pub(crate) fn score_event_log_finding(
    rule: &EventLogRule,
    haystack: &str,
    extracted: &std::collections::HashMap<String, String>,
) -> (u8, Vec<String>) {
    let mut score = base_score(rule.severity) as i32;
    let mut reasons = Vec::new();
    let lower = haystack.to_ascii_lowercase();

    if SUSPICIOUS_PATH_SUBSTRINGS.iter().any(|p| haystack.contains(p)) {
        score += 1;
        reasons.push("user-writable path".to_string());
    }
    if SUSPICIOUS_COMMAND_SUBSTRINGS.iter().any(|c| lower.contains(c)) {
        score += 1;
        reasons.push("suspicious command substring".to_string());
    }
    if ENCODING_SUBSTRINGS.iter().any(|c| lower.contains(c)) {
        score += 1;
        reasons.push("encoding or download-cradle substring".to_string());
    }
    if let Some(task_name) = extracted.get("TaskName") {
        if is_guid_like(task_name) {
            reasons.push("GUID-named task".to_string());
        }
        if !task_name.starts_with('\\') || task_name.matches('\\').count() > 2 {
            reasons.push("non-standard task path".to_string());
        }
    }
    if rule.category == "Anti-Forensics" {
        reasons.push("anti-forensics task deletion".to_string());
    }
    if let Some(bin) = LOLBINS.iter().find(|b| lower.contains(**b)) {
        if !lower.contains(MICROSOFT_INSTALL_ROOT) {
            score += 1;
            reasons.push(format!("LOLBin execution in non-Microsoft context ({bin})"));
        }
    }
    if KNOWN_MALICIOUS_TOOLS.iter().any(|tool| lower.contains(tool)) {
        score = score.max(9);
        reasons.push("known-malicious tool name".to_string());
    }

    (score.clamp(0, 10) as u8, reasons)
}

fn is_guid_like(value: &str) -> bool {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| re(r"\{?[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}?"))
        .is_match(value)
}

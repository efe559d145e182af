//! Suspicious-chain rule library for process-tree scanning. This is a
//! representative sample of well-known parent/child and command-line
//! patterns, not an exhaustive detection engine — see the project design
//! notes for the scope decision.

use super::ProcessNode;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyHit {
    pub row_id: i64,
    pub rule: String,
    pub tactic: String,
    pub severity: Severity,
    pub reason: String,
}

struct ChainRule {
    parent_image: &'static str,
    child_image: &'static str,
    tactic: &'static str,
    severity: Severity,
    reason: &'static str,
}

const CHAIN_RULES: &[ChainRule] = &[
    ChainRule { parent_image: "winword.exe", child_image: "cmd.exe", tactic: "Execution", severity: Severity::Critical, reason: "Office application spawned a command shell" },
    ChainRule { parent_image: "winword.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::Critical, reason: "Office application spawned PowerShell" },
    ChainRule { parent_image: "excel.exe", child_image: "cmd.exe", tactic: "Execution", severity: Severity::Critical, reason: "Office application spawned a command shell" },
    ChainRule { parent_image: "excel.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::Critical, reason: "Office application spawned PowerShell" },
    ChainRule { parent_image: "outlook.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::Critical, reason: "Mail client spawned PowerShell" },
    ChainRule { parent_image: "outlook.exe", child_image: "cmd.exe", tactic: "Execution", severity: Severity::High, reason: "Mail client spawned a command shell" },
    ChainRule { parent_image: "explorer.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::Medium, reason: "Explorer spawned PowerShell, common in user-initiated scripts but also in shortcut-based delivery" },
    ChainRule { parent_image: "svchost.exe", child_image: "cmd.exe", tactic: "Defense Evasion", severity: Severity::High, reason: "Service host spawned a command shell" },
    ChainRule { parent_image: "svchost.exe", child_image: "powershell.exe", tactic: "Defense Evasion", severity: Severity::High, reason: "Service host spawned PowerShell" },
    ChainRule { parent_image: "wmiprvse.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::High, reason: "WMI provider host spawned PowerShell, typical of remote WMI execution" },
    ChainRule { parent_image: "wscript.exe", child_image: "cmd.exe", tactic: "Execution", severity: Severity::High, reason: "Script host spawned a command shell" },
    ChainRule { parent_image: "mshta.exe", child_image: "powershell.exe", tactic: "Execution", severity: Severity::Critical, reason: "mshta spawned PowerShell, common HTA-delivery pattern" },
];

struct RegexRule {
    name: &'static str,
    tactic: &'static str,
    severity: Severity,
    pattern: &'static str,
}

const REGEX_RULES: &[RegexRule] = &[
    RegexRule { name: "encoded-powershell", tactic: "Defense Evasion", severity: Severity::Critical, pattern: r"(?i)powershell(\.exe)?.*(-enc|-e |-encodedcommand)" },
    RegexRule { name: "powershell-downgrade", tactic: "Defense Evasion", severity: Severity::High, pattern: r"(?i)powershell(\.exe)?.*-version\s*2" },
    RegexRule { name: "credential-dump", tactic: "Credential Access", severity: Severity::Critical, pattern: r"(?i)(procdump|lsass\.dmp|mimikatz|sekurlsa|comsvcs\.dll.*minidump)" },
    RegexRule { name: "lateral-movement-tool", tactic: "Lateral Movement", severity: Severity::High, pattern: r"(?i)(psexec|wmic\s+.*process\s+call\s+create|paexec)" },
    RegexRule { name: "archive-exfil", tactic: "Exfiltration", severity: Severity::Medium, pattern: r"(?i)(rar\.exe|7z\.exe|winrar).*(-p|a\s)" },
    RegexRule { name: "ad-recon", tactic: "Discovery", severity: Severity::Medium, pattern: r"(?i)(nltest|net\s+group\s+.*domain|adfind|dsquery)" },
    RegexRule { name: "remote-management", tactic: "Lateral Movement", severity: Severity::Medium, pattern: r"(?i)(winrm|psremoting|enter-pssession|invoke-command.*-computername)" },
    RegexRule { name: "network-scanner", tactic: "Discovery", severity: Severity::Medium, pattern: r"(?i)(nmap|advanced_ip_scanner|angryip)" },
    RegexRule { name: "recon-command", tactic: "Discovery", severity: Severity::Low, pattern: r"(?i)(whoami\s+/all|systeminfo|net\s+view|ipconfig\s+/all)" },
];

const SAFE_PROCESSES: &[&str] = &[
    "svchost.exe", "lsass.exe", "services.exe", "winlogon.exe", "csrss.exe",
    "smss.exe", "wininit.exe", "explorer.exe", "taskhostw.exe", "dwm.exe",
];

fn compiled_regex_rules() -> &'static Vec<(regex::Regex, &'static RegexRule)> {
    static CACHE: OnceLock<Vec<(regex::Regex, &'static RegexRule)>> = OnceLock::new();
    CACHE.get_or_init(|| {
        REGEX_RULES
            .iter()
            .filter_map(|rule| regex::Regex::new(rule.pattern).ok().map(|re| (re, rule)))
            .collect()
    })
}

fn basename(image: &str) -> String {
    image.rsplit(['\\', '/']).next().unwrap_or(image).to_ascii_lowercase()
}

fn is_safe_process(image: &str) -> bool {
    SAFE_PROCESSES.contains(&basename(image).as_str())
}

/// Flags nodes whose parent/child image pair or command line matches the
/// rule library. A node already covered by a safe chain pair (both ends in
/// [`SAFE_PROCESSES`]) is skipped to cut routine noise.
pub(crate) fn scan(nodes: &[ProcessNode]) -> Vec<TaxonomyHit> {
    let mut hits = Vec::new();

    for node in nodes {
        let child_base = node.image.as_deref().map(basename);
        let parent_base = node.parent_image.as_deref().map(basename);

        if let (Some(child), Some(parent)) = (&child_base, &parent_base) {
            if is_safe_process(child) && is_safe_process(parent) {
                continue;
            }
            for rule in CHAIN_RULES {
                if parent == rule.parent_image && child == rule.child_image {
                    hits.push(TaxonomyHit {
                        row_id: node.row_id,
                        rule: format!("{}->{}", rule.parent_image, rule.child_image),
                        tactic: rule.tactic.to_string(),
                        severity: rule.severity,
                        reason: rule.reason.to_string(),
                    });
                }
            }
        }

        if let Some(cmd) = &node.command_line {
            for (re, rule) in compiled_regex_rules() {
                if re.is_match(cmd) {
                    hits.push(TaxonomyHit {
                        row_id: node.row_id,
                        rule: rule.name.to_string(),
                        tactic: rule.tactic.to_string(),
                        severity: rule.severity,
                        reason: format!("command line matched {} pattern", rule.name),
                    });
                }
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(row_id: i64, image: Option<&str>, parent_image: Option<&str>, command_line: Option<&str>) -> ProcessNode {
        ProcessNode {
            row_id,
            key: format!("k{row_id}"),
            parent_key: None,
            image: image.map(str::to_string),
            parent_image: parent_image.map(str::to_string),
            command_line: command_line.map(str::to_string),
            user: None,
            timestamp: None,
            depth: 0,
            child_count: 0,
        }
    }

    #[test]
    fn flags_office_to_shell_chain() {
        let nodes = vec![node(1, Some("cmd.exe"), Some("WINWORD.EXE"), None)];
        let hits = scan(&nodes);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Critical);
    }

    #[test]
    fn flags_encoded_powershell_command() {
        let nodes = vec![node(2, Some("powershell.exe"), Some("explorer.exe"), Some("powershell.exe -enc aGVsbG8="))];
        let hits = scan(&nodes);
        assert!(hits.iter().any(|h| h.rule == "encoded-powershell"));
    }

    #[test]
    fn skips_safe_chain_pairs() {
        let nodes = vec![node(3, Some("svchost.exe"), Some("services.exe"), None)];
        assert!(scan(&nodes).is_empty());
    }
}

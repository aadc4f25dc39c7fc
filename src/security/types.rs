//! Security finding types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Finding severity. Only `High` blocks an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single static finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityIssue {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// 1-based source line, when the finding has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<usize>,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// `false` iff at least one issue is `High`.
    pub valid: bool,
    pub issues: Vec<SecurityIssue>,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<SecurityIssue>) -> Self {
        let valid = !issues.iter().any(|i| i.severity == Severity::High);
        Self { valid, issues }
    }

    pub fn high_issues(&self) -> Vec<SecurityIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .cloned()
            .collect()
    }

    /// One line per issue: `[severity] title (line N)`.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|issue| match issue.location {
                Some(line) => format!("[{}] {} (line {})", issue.severity, issue.title, line),
                None => format!("[{}] {}", issue.severity, issue.title),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity, title: &str, location: Option<usize>) -> SecurityIssue {
        SecurityIssue {
            severity,
            title: title.to_string(),
            description: String::new(),
            location,
        }
    }

    #[test]
    fn test_verdict_depends_only_on_high() {
        let report = ValidationReport::from_issues(vec![
            issue(Severity::Medium, "a", None),
            issue(Severity::Low, "b", None),
        ]);
        assert!(report.valid);
        assert!(report.high_issues().is_empty());

        let report = ValidationReport::from_issues(vec![issue(Severity::High, "c", Some(3))]);
        assert!(!report.valid);
        assert_eq!(report.high_issues().len(), 1);
    }

    #[test]
    fn test_summary_format() {
        let report = ValidationReport::from_issues(vec![
            issue(Severity::High, "Self-destruct", Some(4)),
            issue(Severity::Low, "Value with data", None),
        ]);
        assert_eq!(
            report.summary(),
            "[high] Self-destruct (line 4)\n[low] Value with data"
        );
    }

    #[test]
    fn test_severity_serde() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
    }
}

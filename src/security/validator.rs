//! Static security checks for contract source and outgoing transactions.
//!
//! # Responsibilities
//! - Scan Solidity source for well-known dangerous patterns
//! - Flag risky transaction shapes before they are signed
//!
//! # Design Decisions
//! - Every detector runs; a finding never short-circuits the rest
//! - Each firing detector reports exactly once, at its first line
//! - Comments are blanked before scanning so commented-out code is ignored

use alloy::primitives::{Address, Bytes, U256};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::SecurityConfig;
use crate::security::types::{SecurityIssue, Severity, ValidationReport};

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

struct PatternDetector {
    severity: Severity,
    title: &'static str,
    description: &'static str,
    pattern: Regex,
}

impl PatternDetector {
    fn new(severity: Severity, title: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            severity,
            title,
            description,
            // Patterns are literals in this file; a bad one is a programming error.
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid detector pattern: {}", e)),
        }
    }

    fn scan(&self, source: &str) -> Option<SecurityIssue> {
        let found = self.pattern.find(source)?;
        Some(SecurityIssue {
            severity: self.severity,
            title: self.title.to_string(),
            description: self.description.to_string(),
            location: Some(line_of(source, found.start())),
        })
    }
}

static DETECTORS: LazyLock<Vec<PatternDetector>> = LazyLock::new(|| {
    vec![
        PatternDetector::new(
            Severity::High,
            "Self-destruct",
            "Contract can be destroyed with selfdestruct, removing its code and forwarding its balance",
            r"\b(selfdestruct|suicide)\s*\(",
        ),
        PatternDetector::new(
            Severity::High,
            "tx.origin authorization",
            "tx.origin is compared for access control; a malicious intermediate contract can pass this check",
            r"tx\.origin\s*[!=]=|[!=]=\s*tx\.origin",
        ),
        PatternDetector::new(
            Severity::Medium,
            "Weak randomness",
            "Block properties are miner-influenced and must not be used as a source of randomness",
            r"(keccak256|%|random).*\b(block\.(timestamp|difficulty|prevrandao)|blockhash\s*\()|\b(block\.(timestamp|difficulty|prevrandao)|blockhash\s*\().*(keccak256|%)",
        ),
        PatternDetector::new(
            Severity::Low,
            "Empty payable function",
            "A payable function with an empty body accepts ether without any accounting",
            r"function\s+\w+\s*\([^)]*\)[^{;]*\bpayable\b[^{;]*\{\s*\}",
        ),
        PatternDetector::new(
            Severity::Medium,
            "Inline assembly",
            "Inline assembly bypasses compiler safety checks and needs manual review",
            r#"\bassembly\s*(\("[^"]*"\)\s*)?\{"#,
        ),
        PatternDetector::new(
            Severity::Medium,
            "Low-level value call",
            "Ether sent with a low-level call forwards all gas; check the return value and guard against reentrancy",
            r"\.call\s*\{\s*value\s*:|\.call\.value\s*\(",
        ),
        PatternDetector::new(
            Severity::Low,
            "Fixed-gas ether transfer",
            "transfer and send forward only 2300 gas and can fail for contract recipients",
            r"\.(transfer|send)\s*\(\s*[^,()]+\)",
        ),
    ]
});

/// Lines that hand control to another contract.
static EXTERNAL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(call|delegatecall)\s*[\{(]|\.call\.value\s*\(|\.(transfer|send)\s*\(\s*[^,()]+\)")
        .unwrap_or_else(|e| panic!("invalid external call pattern: {}", e))
});

/// Lines that write storage: `name[...].field op= expr`, excluding comparisons.
static STATE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[A-Za-z_]\w*(\[[^\]]*\])*(\.\w+)*\s*([+\-*/]?=)[^=]")
        .unwrap_or_else(|e| panic!("invalid assignment pattern: {}", e))
});

/// Stateless checker; cheap to share.
#[derive(Debug, Clone)]
pub struct ContractValidator {
    large_transfer_threshold: U256,
    reentrancy_window: usize,
}

impl ContractValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            large_transfer_threshold: U256::from(config.large_transfer_threshold_eth)
                * U256::from(WEI_PER_ETHER),
            reentrancy_window: config.reentrancy_window_lines.max(1),
        }
    }

    /// Run every detector over `source`.
    pub fn validate_contract(&self, source: &str) -> ValidationReport {
        let cleaned = strip_comments(source);

        let mut issues: Vec<SecurityIssue> =
            DETECTORS.iter().filter_map(|d| d.scan(&cleaned)).collect();

        if let Some(line) = self.find_reentrancy(&cleaned) {
            issues.push(SecurityIssue {
                severity: Severity::High,
                title: "Possible reentrancy".to_string(),
                description: format!(
                    "State is written within {} lines after an external call; update state before calling out",
                    self.reentrancy_window
                ),
                location: Some(line),
            });
        }

        let report = ValidationReport::from_issues(issues);
        tracing::debug!(
            issues = report.issues.len(),
            valid = report.valid,
            "Contract validated"
        );
        report
    }

    /// First line holding an external call that is followed by a state write.
    fn find_reentrancy(&self, source: &str) -> Option<usize> {
        let lines: Vec<&str> = source.lines().collect();
        lines.iter().enumerate().find_map(|(idx, line)| {
            if !EXTERNAL_CALL.is_match(line) {
                return None;
            }
            let end = (idx + 1 + self.reentrancy_window).min(lines.len());
            lines[idx + 1..end]
                .iter()
                .any(|next| STATE_ASSIGNMENT.is_match(next))
                .then_some(idx + 1)
        })
    }

    /// Check a transaction before it is signed.
    pub fn validate_transaction(&self, to: Address, value: U256, data: &Bytes) -> ValidationReport {
        let mut issues = Vec::new();

        if to == Address::ZERO {
            issues.push(SecurityIssue {
                severity: Severity::High,
                title: "Zero address recipient".to_string(),
                description: "Funds sent to the zero address are unrecoverable".to_string(),
                location: None,
            });
        }

        if value > self.large_transfer_threshold {
            issues.push(SecurityIssue {
                severity: Severity::Medium,
                title: "Large transfer".to_string(),
                description: format!(
                    "Value {} wei exceeds the large-transfer threshold of {} wei",
                    value, self.large_transfer_threshold
                ),
                location: None,
            });
        }

        if !value.is_zero() && !data.is_empty() {
            issues.push(SecurityIssue {
                severity: Severity::Low,
                title: "Value with call data".to_string(),
                description: "Transaction sends ether together with call data; confirm the callee is payable"
                    .to_string(),
                location: None,
            });
        }

        ValidationReport::from_issues(issues)
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Replace comments with spaces, keeping newlines and string literals intact.
fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match (c, chars.peek().copied()) {
                ('/', Some('/')) => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Line;
                }
                ('/', Some('*')) => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Block;
                }
                ('"', _) | ('\'', _) => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }

    out
}

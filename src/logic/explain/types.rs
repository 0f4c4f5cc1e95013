use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tag shown in front of an explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub severity: Severity,
    /// Appended to the tag, e.g. " - reconstruction model"
    pub source: Option<String>,
    /// One clause per deviating feature, in output order
    pub findings: Vec<String>,
}

impl Explanation {
    /// `[SEVERITY RISK] first; second.`
    pub fn render(&self) -> String {
        let source = self
            .source
            .as_deref()
            .map(|s| format!(" - {}", s))
            .unwrap_or_default();

        format!("[{} RISK{}] {}.", self.severity, source, self.findings.join("; "))
    }
}

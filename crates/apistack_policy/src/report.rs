//! Validation results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rule severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Error,
    Warning,
    Info,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Error => "error",
            RuleSeverity::Warning => "warning",
            RuleSeverity::Info => "info",
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single rule finding, tied to the configuration field that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_id: String,
    pub severity: RuleSeverity,
    /// Dotted path into the stack configuration, e.g. `ingress.port`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} ({})", self.severity, self.field, self.message, self.rule_id)
    }
}

/// Outcome of evaluating a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<RuleViolation>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    pub fn add(&mut self, violation: RuleViolation) {
        if violation.severity == RuleSeverity::Error {
            self.valid = false;
        }
        self.violations.push(violation);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        for violation in other.violations {
            self.add(violation);
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &RuleViolation> {
        self.with_severity(RuleSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RuleViolation> {
        self.with_severity(RuleSeverity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &RuleViolation> {
        self.with_severity(RuleSeverity::Info)
    }

    fn with_severity(&self, severity: RuleSeverity) -> impl Iterator<Item = &RuleViolation> {
        self.violations.iter().filter(move |v| v.severity == severity)
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.violations.iter().any(|v| v.rule_id == rule_id)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "no findings");
        }
        let lines: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", lines.join("; "))
    }
}

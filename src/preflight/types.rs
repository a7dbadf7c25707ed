//! Preflight check types and report.

use anyhow::Result;

use crate::error::ProvisionError;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - the run cannot proceed.
    Fail,
    /// Check skipped (not applicable).
    Skip,
}

impl CheckResult {
    pub fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: None,
        }
    }

    pub fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    pub fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    pub fn skip(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Skip,
            details: Some(details.to_string()),
        }
    }

    pub fn is_fail(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

/// Results of a group of preflight checks, in the order they ran.
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn push(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    pub fn extend(&mut self, checks: impl IntoIterator<Item = CheckResult>) {
        self.checks.extend(checks);
    }

    /// First failed check, in run order.
    pub fn first_failure(&self) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.is_fail())
    }

    /// Log every check at debug level.
    pub fn log(&self) {
        for check in &self.checks {
            let status = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Skip => "SKIP",
            };
            match &check.details {
                Some(details) => tracing::debug!("[{}] {}: {}", status, check.name, details),
                None => tracing::debug!("[{}] {}", status, check.name),
            }
        }
    }

    /// Fail with the first failed check's message.
    pub fn into_result(self) -> Result<()> {
        match self.first_failure() {
            Some(check) => {
                let msg = check.details.clone().unwrap_or_else(|| check.name.clone());
                Err(ProvisionError::precondition(msg).into())
            }
            None => Ok(()),
        }
    }
}

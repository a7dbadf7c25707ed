//! Preflight checks for a provisioning run.
//!
//! Host checks (privileges, keys directory, tools on PATH) run first and
//! yield the resolved [`Tools`]. Target checks (root directory, local
//! source) run at the start of every provisioning run. Either group fails
//! with the message of its first failed check.

mod environment;
mod host_tools;
mod target;
mod types;

use anyhow::{Context, Result};

use crate::config::{Options, Tools};

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Check the host and resolve every external tool.
pub fn run_preflight(options: &Options) -> Result<Tools> {
    let mut report = PreflightReport::default();

    report.push(environment::check_privileges());
    report.push(environment::check_keys_dir(options));
    let (checks, tools) = host_tools::check_host_tools(options);
    report.extend(checks);

    report.log();
    report.into_result()?;
    tools.context("Host tools could not be resolved")
}

/// Check the target root directory and the local source.
pub fn check_target(options: &Options) -> Result<()> {
    let mut report = PreflightReport::default();
    report.extend(target::check_target(options));
    report.log();
    report.into_result()
}

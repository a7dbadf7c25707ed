//! Target root and local source checks.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use crate::config::{InstallMode, Options};

use super::types::CheckResult;

/// Check the target root (and the local source, for local installs).
///
/// Stops after the first check when the root does not exist, since the
/// rest would only repeat that failure.
pub fn check_target(options: &Options) -> Vec<CheckResult> {
    let root = &options.root;
    if !root.is_dir() {
        return vec![CheckResult::fail(
            "root directory",
            &format!("root directory '{}' does not exist", root.display()),
        )];
    }

    let mut results = vec![
        CheckResult::pass_with("root directory", &root.to_string_lossy()),
        check_writable(root),
    ];

    if options.force {
        results.push(CheckResult::skip("root empty", "forced"));
    } else {
        results.push(check_empty(root));
    }

    if let InstallMode::Local { source } = &options.mode {
        if source.is_dir() {
            results.push(CheckResult::pass_with("local source", &source.to_string_lossy()));
        } else {
            results.push(CheckResult::fail(
                "local source",
                &format!("local source '{}' is not a directory", source.display()),
            ));
        }
    }

    results
}

/// Create and delete a probe file inside `root`.
fn check_writable(root: &Path) -> CheckResult {
    match tempfile::Builder::new()
        .prefix(".rootstrap-probe")
        .tempfile_in(root)
    {
        Ok(probe) => match probe.close() {
            Ok(()) => CheckResult::pass("root writable"),
            Err(e) => CheckResult::fail(
                "root writable",
                &format!("cannot remove probe file in '{}': {}", root.display(), e),
            ),
        },
        Err(e) => CheckResult::fail(
            "root writable",
            &format!("root directory '{}' is not writable: {}", root.display(), e),
        ),
    }
}

/// A root counts as empty when its top level holds only directories.
///
/// `lost+found` and pre-created mount point directories are accepted. An
/// entry that cannot be read fails the check.
fn check_empty(root: &Path) -> CheckResult {
    match first_non_directory(root) {
        Ok(Some(name)) => CheckResult::fail(
            "root empty",
            &format!(
                "root directory '{}' is not empty (found '{}'); use -f to force",
                root.display(),
                name.to_string_lossy()
            ),
        ),
        Ok(None) => CheckResult::pass("root empty"),
        Err(e) => CheckResult::fail(
            "root empty",
            &format!("cannot read root directory '{}': {}", root.display(), e),
        ),
    }
}

fn first_non_directory(root: &Path) -> io::Result<Option<OsString>> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            return Ok(Some(entry.file_name()));
        }
    }
    Ok(None)
}

//! Host environment checks (privileges, keys directory).

use nix::unistd::geteuid;

use crate::config::Options;

use super::types::CheckResult;

/// Mounting and writing a foreign root needs uid 0.
pub fn check_privileges() -> CheckResult {
    if geteuid().is_root() {
        CheckResult::pass("root privileges")
    } else {
        CheckResult::fail("root privileges", "must be run as root")
    }
}

/// An explicitly given keys directory must exist. The default is left to
/// the package manager.
pub fn check_keys_dir(options: &Options) -> CheckResult {
    if !options.keys_dir_explicit {
        return CheckResult::skip("keys directory", "using default");
    }
    if options.keys_dir.is_dir() {
        CheckResult::pass_with("keys directory", &options.keys_dir.to_string_lossy())
    } else {
        CheckResult::fail(
            "keys directory",
            &format!(
                "keys directory '{}' does not exist",
                options.keys_dir.display()
            ),
        )
    }
}

//! Host tool availability checks.

use std::path::PathBuf;

use crate::config::{Options, Tools};
use crate::process;

use super::types::CheckResult;

/// Check host tools are installed, resolving them to full paths.
///
/// The `Tools` value is only returned when every required tool was found.
pub fn check_host_tools(options: &Options) -> (Vec<CheckResult>, Option<Tools>) {
    let mut results = Vec::new();

    let mut resolve = |tool: &str, purpose: &str| {
        let (result, path) = check_tool_exists(tool, purpose);
        results.push(result);
        path
    };

    let mountpoint = resolve("mountpoint", "Required to detect existing mounts");
    let mount = resolve("mount", "Required to bind-mount pseudo-filesystems");
    let umount = resolve("umount", "Required to unmount pseudo-filesystems");
    let apk = resolve(&options.apk, "Package manager");

    let tar = options
        .mode
        .is_local()
        .then(|| resolve("tar", "Required to copy the local source tree"));
    let tar = match tar {
        Some(found) => found,
        None => {
            results.push(CheckResult::skip("tar", "Only needed for local installs"));
            Some(PathBuf::from("tar"))
        }
    };

    let tools = match (mountpoint, mount, umount, tar, apk) {
        (Some(mountpoint), Some(mount), Some(umount), Some(tar), Some(apk)) => Some(Tools {
            mountpoint,
            mount,
            umount,
            tar,
            apk,
        }),
        _ => None,
    };

    (results, tools)
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, purpose: &str) -> (CheckResult, Option<PathBuf>) {
    match process::which(tool) {
        Some(path) => (
            CheckResult::pass_with(tool, &path.to_string_lossy()),
            Some(path),
        ),
        None => (
            CheckResult::fail(tool, &format!("'{}' not found in PATH. {}", tool, purpose)),
            None,
        ),
    }
}

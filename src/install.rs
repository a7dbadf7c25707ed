//! Package manager and copy invocations.
//!
//! Three ways to lay down the base system:
//! - local: stream the local source tree into the root with a tar pipe
//! - ostree: `--initdb add` the ostree flavour of the minimal base
//! - network: `--initdb add` the minimal base
//!
//! Extra packages are always added with a separate `add` once the base is in
//! place, since their scripts may need the pseudo-filesystems.

use std::path::Path;

use crate::config::{InstallMode, Options, Tools};
use crate::process::Cmd;

/// Packages making up a minimal base system.
pub const MINIMAL_BASE: &[&str] = &["base-files", "base-minimal"];

/// Ostree replacements for members of [`MINIMAL_BASE`].
const OSTREE_SUBSTITUTES: &[(&str, &str)] = &[("base-files", "base-files-ostree")];

/// Base package set for a package manager install.
pub fn base_packages(mode: &InstallMode) -> Vec<String> {
    MINIMAL_BASE
        .iter()
        .map(|&pkg| match mode {
            InstallMode::Ostree => OSTREE_SUBSTITUTES
                .iter()
                .find(|(from, _)| *from == pkg)
                .map(|&(_, to)| to)
                .unwrap_or(pkg),
            _ => pkg,
        })
        .map(str::to_string)
        .collect()
}

/// Arguments every package manager invocation starts with.
pub fn common_args(options: &Options, repositories: &Path) -> Vec<String> {
    let mut args = vec![
        "--root".to_string(),
        options.root.to_string_lossy().into_owned(),
        "--keys-dir".to_string(),
        options.keys_dir.to_string_lossy().into_owned(),
        "--repositories-file".to_string(),
        repositories.to_string_lossy().into_owned(),
    ];
    if options.interactive {
        args.push("--interactive".to_string());
    }
    if options.allow_untrusted {
        args.push("--allow-untrusted".to_string());
    }
    args
}

/// The base install command, or `None` for a local install.
pub fn base_command(options: &Options, tools: &Tools, repositories: &Path) -> Option<Cmd> {
    if options.mode.is_local() {
        return None;
    }
    Some(
        Cmd::new(tools.apk.to_string_lossy())
            .args(common_args(options, repositories))
            .args(["--initdb", "add"])
            .args(base_packages(&options.mode)),
    )
}

/// The command adding `packages` to an initialized root.
pub fn add_command(options: &Options, tools: &Tools, repositories: &Path, packages: &[String]) -> Cmd {
    Cmd::new(tools.apk.to_string_lossy())
        .args(common_args(options, repositories))
        .arg("add")
        .args(packages)
}

/// The tar pipe copying `source` into `root`, keeping modes and owners.
pub fn local_copy_commands(tools: &Tools, source: &Path, root: &Path) -> (Cmd, Cmd) {
    let tar = tools.tar.to_string_lossy();
    let pack = Cmd::new(&tar)
        .args(["-cpf", "-", "-C"])
        .arg_path(source)
        .arg(".")
        .error_msg(format!("Failed to read local source {}", source.display()));
    let unpack = Cmd::new(&tar)
        .args(["-xpf", "-", "-C"])
        .arg_path(root)
        .error_msg(format!("Failed to unpack into {}", root.display()));
    (pack, unpack)
}

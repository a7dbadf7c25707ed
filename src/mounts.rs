//! Pseudo-filesystem bind mounts inside the target root.
//!
//! Package scripts run during installation expect `/dev`, `/proc`, `/sys`
//! and `/tmp` to be populated. These are bind-mounted recursively from the
//! host. Only mounts this run created are recorded, and only those are
//! unmounted again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Tools;
use crate::error::ProvisionError;
use crate::process::Cmd;
use crate::signal::CancelToken;

/// Pseudo-filesystems mounted into the target, in mount order.
pub const PSEUDO_FILESYSTEMS: [&str; 4] = ["dev", "proc", "sys", "tmp"];

/// Mount targets created by this run, in the order they were mounted.
#[derive(Debug)]
pub struct PseudoMounts {
    host_root: PathBuf,
    mounted: Vec<PathBuf>,
}

impl Default for PseudoMounts {
    fn default() -> Self {
        Self::with_host_root("/")
    }
}

impl PseudoMounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind from `host_root/<name>` rather than `/<name>`.
    pub fn with_host_root(host_root: impl AsRef<Path>) -> Self {
        Self {
            host_root: host_root.as_ref().to_path_buf(),
            mounted: Vec::new(),
        }
    }

    pub fn mounted(&self) -> &[PathBuf] {
        &self.mounted
    }

    /// Bind-mount every pseudo-filesystem not already mounted under `root`.
    ///
    /// A failed bind mount aborts; whatever was mounted before it stays
    /// recorded so teardown can undo it.
    pub fn mount_all(&mut self, root: &Path, tools: &Tools, cancel: &CancelToken) -> Result<()> {
        for name in PSEUDO_FILESYSTEMS {
            cancel.check()?;

            let target = root.join(name);
            if self.mounted.contains(&target) {
                continue;
            }
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;

            if is_mountpoint(tools, &target)? {
                tracing::debug!("{} is already a mount point", target.display());
                continue;
            }

            let source = self.host_root.join(name);
            tracing::debug!("bind mounting {} -> {}", source.display(), target.display());
            Cmd::new(tools.mount.to_string_lossy())
                .arg("--rbind")
                .arg_path(&source)
                .arg_path(&target)
                .cancel_on(cancel)
                .run()
                .context(ProvisionError::Mount { name })?;
            self.mounted.push(target);
        }
        Ok(())
    }

    /// Force-unmount everything recorded, best effort.
    ///
    /// Returns the targets that were processed, in order. The record is
    /// cleared, so a second call does nothing.
    pub fn unmount_all(&mut self, tools: &Tools) -> Vec<PathBuf> {
        if self.mounted.is_empty() {
            return Vec::new();
        }
        nix::unistd::sync();

        let targets = std::mem::take(&mut self.mounted);
        for target in &targets {
            tracing::debug!("unmounting {}", target.display());
            let result = Cmd::new(tools.umount.to_string_lossy())
                .arg("-fR")
                .arg_path(target)
                .run();
            if let Err(e) = result {
                tracing::warn!("failed to unmount {}: {:#}", target.display(), e);
            }
        }
        targets
    }
}

/// Ask `mountpoint -q` whether `path` is a mount point.
fn is_mountpoint(tools: &Tools, path: &Path) -> Result<bool> {
    let result = Cmd::new(tools.mountpoint.to_string_lossy())
        .arg("-q")
        .arg_path(path)
        .allow_fail()
        .run()?;
    Ok(result.success())
}

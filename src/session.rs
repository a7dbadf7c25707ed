//! The provisioning session.
//!
//! A [`Session`] owns everything a run creates outside the process: the
//! pseudo-filesystem bind mounts inside the target root and the two temporary
//! repository files. Teardown undoes all of it exactly once, whether the run
//! finished, failed, or was interrupted, and also runs from `Drop` so an
//! unexpected unwind cannot leak mounts.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::{InstallMode, Options, Tools};
use crate::error::ProvisionError;
use crate::install;
use crate::mounts::PseudoMounts;
use crate::repos::RepoFiles;
use crate::signal::CancelToken;

/// What a teardown undid.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Teardown {
    /// Mount targets unmounted, in the order they were mounted.
    pub unmounted: Vec<PathBuf>,
    /// Temporary files removed.
    pub removed: Vec<PathBuf>,
}

pub struct Session<'a> {
    options: &'a Options,
    tools: &'a Tools,
    cancel: CancelToken,
    mounts: PseudoMounts,
    repos: RepoFiles,
    torn_down: bool,
}

impl<'a> Session<'a> {
    /// Start a session. Writes the extra-repositories file if `-r` was used.
    pub fn new(options: &'a Options, tools: &'a Tools, cancel: CancelToken) -> Result<Self> {
        let repos = RepoFiles::new(&options.extra_repos)?;
        Ok(Self {
            options,
            tools,
            cancel,
            mounts: PseudoMounts::new(),
            repos,
            torn_down: false,
        })
    }

    /// Currently recorded bind mounts.
    pub fn mounted(&self) -> &[PathBuf] {
        self.mounts.mounted()
    }

    /// Temporary files currently on disk.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.repos.paths()
    }

    /// The aggregated repositories file (built on first use).
    pub fn repositories_file(&mut self) -> Result<PathBuf> {
        let path = self
            .repos
            .aggregated_path(&self.options.repo_sources, self.options.ignore_repos)?;
        Ok(path.to_path_buf())
    }

    pub fn mount_pseudo(&mut self) -> Result<()> {
        self.mounts
            .mount_all(&self.options.root, self.tools, &self.cancel)
    }

    pub fn umount_pseudo(&mut self) -> Vec<PathBuf> {
        self.mounts.unmount_all(self.tools)
    }

    /// Run the whole provisioning sequence. Does not tear down.
    pub fn run(&mut self) -> Result<()> {
        self.cancel.check()?;
        self.repositories_file()?;
        self.install_base()?;
        self.install_packages()
    }

    /// Lay down the base system.
    pub fn install_base(&mut self) -> Result<()> {
        self.cancel.check()?;
        let options = self.options;

        match &options.mode {
            InstallMode::Local { source } => {
                tracing::info!(
                    "Copying {} into {}",
                    source.display(),
                    options.root.display()
                );
                let (pack, unpack) = install::local_copy_commands(self.tools, source, &options.root);
                pack.cancel_on(&self.cancel)
                    .pipe_into(unpack)
                    .context(ProvisionError::BaseInstall)?;
            }
            mode => {
                let repositories = self.repositories_file()?;
                let Some(cmd) = install::base_command(options, self.tools, &repositories) else {
                    return Ok(());
                };
                tracing::info!(
                    "Installing {} base system into {}",
                    if *mode == InstallMode::Ostree { "ostree" } else { "minimal" },
                    options.root.display()
                );
                cmd.cancel_on(&self.cancel)
                    .run_interactive()
                    .context(ProvisionError::BaseInstall)?;
            }
        }
        Ok(())
    }

    /// Add the requested packages with the pseudo-filesystems mounted.
    pub fn install_packages(&mut self) -> Result<()> {
        let packages = self.options.effective_packages();
        if packages.is_empty() {
            return Ok(());
        }
        self.cancel.check()?;

        let repositories = self.repositories_file()?;
        self.mount_pseudo()?;

        tracing::info!("Installing packages: {}", packages.join(" "));
        install::add_command(self.options, self.tools, &repositories, &packages)
            .cancel_on(&self.cancel)
            .run_interactive()
            .context(ProvisionError::PackageInstall)?;

        self.umount_pseudo();
        Ok(())
    }

    /// Unmount everything recorded and remove the temp files.
    ///
    /// Only the first call does anything.
    pub fn teardown(&mut self) -> Teardown {
        if self.torn_down {
            return Teardown::default();
        }
        self.torn_down = true;

        let unmounted = self.umount_pseudo();
        let removed = self.repos.paths();
        self.repos.remove();
        Teardown { unmounted, removed }
    }

    /// Tear down and end the session.
    pub fn finish(mut self) -> Teardown {
        self.teardown()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

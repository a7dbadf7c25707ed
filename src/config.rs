//! Configuration management for rootstrap.
//!
//! Built-in defaults can be overridden from the environment (a `.env` file is
//! loaded into the environment by `main` first). Command-line flags override
//! both.

use std::path::{Path, PathBuf};

use crate::repos::RepoSources;

/// Default package manager binary.
pub const DEFAULT_APK: &str = "apk";

/// Default directory of trusted repository signing keys.
pub const DEFAULT_KEYS_DIR: &str = "/etc/apk/keys";

/// Default source tree for local installs (the live image's root).
pub const DEFAULT_LOCAL_SOURCE: &str = "/run/live/medium/live/filesystem.squashfs";

/// System default repository file.
pub const DEFAULT_REPOSITORIES: &str = "/etc/apk/repositories";

/// Directory of additional system repository files.
pub const DEFAULT_REPOSITORIES_DIR: &str = "/etc/apk/repositories.d";

/// Package installed when none are named on a non-local install.
pub const DEFAULT_PACKAGE: &str = "base-full";

/// Rootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Package manager binary (ROOTSTRAP_APK)
    pub apk: String,
    /// Keys directory (ROOTSTRAP_KEYS_DIR)
    pub keys_dir: PathBuf,
    /// Local install source (ROOTSTRAP_LOCAL_SOURCE)
    pub local_source: PathBuf,
    /// System repository file (ROOTSTRAP_REPOSITORIES)
    pub repositories: PathBuf,
    /// System repository directory (ROOTSTRAP_REPOSITORIES_DIR)
    pub repositories_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apk: DEFAULT_APK.to_string(),
            keys_dir: PathBuf::from(DEFAULT_KEYS_DIR),
            local_source: PathBuf::from(DEFAULT_LOCAL_SOURCE),
            repositories: PathBuf::from(DEFAULT_REPOSITORIES),
            repositories_dir: PathBuf::from(DEFAULT_REPOSITORIES_DIR),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            apk: get("ROOTSTRAP_APK").unwrap_or(defaults.apk),
            keys_dir: get("ROOTSTRAP_KEYS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.keys_dir),
            local_source: get("ROOTSTRAP_LOCAL_SOURCE")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_source),
            repositories: get("ROOTSTRAP_REPOSITORIES")
                .map(PathBuf::from)
                .unwrap_or(defaults.repositories),
            repositories_dir: get("ROOTSTRAP_REPOSITORIES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.repositories_dir),
        }
    }

    /// Where the system repository lists live.
    pub fn repo_sources(&self) -> RepoSources {
        RepoSources {
            default_file: self.repositories.clone(),
            dir: self.repositories_dir.clone(),
        }
    }

    /// Print configuration for debugging.
    pub fn log(&self) {
        tracing::debug!("ROOTSTRAP_APK: {}", self.apk);
        tracing::debug!("ROOTSTRAP_KEYS_DIR: {}", self.keys_dir.display());
        tracing::debug!("ROOTSTRAP_LOCAL_SOURCE: {}", self.local_source.display());
        tracing::debug!("ROOTSTRAP_REPOSITORIES: {}", self.repositories.display());
        tracing::debug!(
            "ROOTSTRAP_REPOSITORIES_DIR: {}",
            self.repositories_dir.display()
        );
    }
}

/// How the base system gets into the target root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMode {
    /// Copy an existing tree (normally the live image) into the root.
    Local { source: PathBuf },
    /// Package manager install with the ostree-compatible base.
    Ostree,
    /// Package manager install of the minimal base.
    Network,
}

impl InstallMode {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }
}

/// Everything a provisioning run needs to know, after flags and config merge.
#[derive(Debug, Clone)]
pub struct Options {
    pub root: PathBuf,
    pub mode: InstallMode,
    pub apk: String,
    pub interactive: bool,
    pub ignore_repos: bool,
    /// Extra repositories in the order given.
    pub extra_repos: Vec<String>,
    pub keys_dir: PathBuf,
    /// True when the keys directory came from `-k` rather than a default.
    pub keys_dir_explicit: bool,
    pub force: bool,
    pub allow_untrusted: bool,
    pub repo_sources: RepoSources,
    /// Packages named on the command line.
    pub packages: Vec<String>,
}

impl Options {
    /// Options for `root` with every default from `config`.
    pub fn new(root: impl AsRef<Path>, config: &Config) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mode: InstallMode::Network,
            apk: config.apk.clone(),
            interactive: false,
            ignore_repos: false,
            extra_repos: Vec::new(),
            keys_dir: config.keys_dir.clone(),
            keys_dir_explicit: false,
            force: false,
            allow_untrusted: false,
            repo_sources: config.repo_sources(),
            packages: Vec::new(),
        }
    }

    /// Packages to add after the base step.
    ///
    /// A non-local install with nothing named gets `base-full`.
    pub fn effective_packages(&self) -> Vec<String> {
        if self.packages.is_empty() && !self.mode.is_local() {
            vec![DEFAULT_PACKAGE.to_string()]
        } else {
            self.packages.clone()
        }
    }
}

/// Resolved locations of every external program a run invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub mountpoint: PathBuf,
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub tar: PathBuf,
    pub apk: PathBuf,
}

//! Command line interface.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};

use crate::config::{Config, InstallMode, Options};

#[derive(Parser, Debug)]
#[command(name = "rootstrap")]
#[command(about = "Provision a new root filesystem with the system package manager")]
#[command(
    after_help = "EXAMPLES:\n  rootstrap /mnt                 Network install of base-full\n  rootstrap -l /mnt              Copy the live image into /mnt\n  rootstrap -I -r URL /mnt vim   Install from URL only, plus vim"
)]
pub struct Cli {
    /// Install by copying the local live image
    #[arg(short = 'l', long = "local")]
    pub local: bool,

    /// Source tree for a local install (implies -l)
    #[arg(short = 'L', long = "local-source", value_name = "PATH")]
    pub local_source: Option<PathBuf>,

    /// Install the ostree-compatible base
    #[arg(short = 'o', long = "ostree", conflicts_with_all = ["local", "local_source"])]
    pub ostree: bool,

    /// Package manager binary
    #[arg(short = 'a', long = "apk", value_name = "PATH")]
    pub apk: Option<String>,

    /// Run the package manager interactively
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Ignore the system repositories
    #[arg(short = 'I', long = "ignore-repos")]
    pub ignore_repos: bool,

    /// Extra repository (may be repeated)
    #[arg(short = 'r', long = "repo", value_name = "REPO", action = ArgAction::Append)]
    pub repos: Vec<String>,

    /// Directory of trusted repository keys
    #[arg(short = 'k', long = "keys-dir", value_name = "DIR")]
    pub keys_dir: Option<PathBuf>,

    /// Allow a root directory that is not empty
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Allow untrusted packages
    #[arg(short = 'u', long = "allow-untrusted")]
    pub allow_untrusted: bool,

    /// More output (repeat for more)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Target root directory
    pub root: PathBuf,

    /// Packages to install after the base system
    pub packages: Vec<String>,
}

impl Cli {
    /// Merge flags over `config` defaults.
    pub fn into_options(self, config: &Config) -> Options {
        let mode = if self.local || self.local_source.is_some() {
            InstallMode::Local {
                source: self
                    .local_source
                    .unwrap_or_else(|| config.local_source.clone()),
            }
        } else if self.ostree {
            InstallMode::Ostree
        } else {
            InstallMode::Network
        };

        let mut options = Options::new(&self.root, config);
        options.mode = mode;
        if let Some(apk) = self.apk {
            options.apk = apk;
        }
        if let Some(keys_dir) = self.keys_dir {
            options.keys_dir = keys_dir;
            options.keys_dir_explicit = true;
        }
        options.interactive = self.interactive;
        options.ignore_repos = self.ignore_repos;
        options.extra_repos = self.repos;
        options.force = self.force;
        options.allow_untrusted = self.allow_untrusted;
        options.packages = self.packages;
        options
    }
}

/// Exit code for a parse error: 0 when help or version was asked for, 1 for
/// anything else.
pub fn usage_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

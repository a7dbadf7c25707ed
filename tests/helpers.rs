//! Shared test utilities for rootstrap tests.
//!
//! External tools are replaced by shell scripts that append their argv to a
//! shared call log, so tests can assert exactly what a run would have done
//! to the host without root privileges.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rootstrap::config::{Config, Options, Tools};
use rootstrap::mounts::PSEUDO_FILESYSTEMS;
use rootstrap::repos::RepoSources;
use tempfile::TempDir;

/// Test environment with a target root, mock tools and system repo files.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Target root directory
    pub root: PathBuf,
    /// Directory holding the mock tools
    pub bin: PathBuf,
    /// Directory standing in for /etc/apk
    pub etc: PathBuf,
    /// Log every mock tool appends to
    pub log: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("root");
        let bin = base.join("bin");
        let etc = base.join("etc");
        for dir in [&root, &bin, &etc] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        Self {
            log: base.join("calls.log"),
            _temp_dir: temp_dir,
            root,
            bin,
            etc,
        }
    }

    /// Options for a network install into `self.root` using the fake /etc/apk.
    pub fn options(&self) -> Options {
        let mut options = Options::new(&self.root, &Config::default());
        options.repo_sources = RepoSources {
            default_file: self.etc.join("repositories"),
            dir: self.etc.join("repositories.d"),
        };
        options
    }

    /// Write the fake system default repository file.
    pub fn system_repos(&self, content: &str) {
        fs::write(self.etc.join("repositories"), content).expect("Failed to write repositories");
    }

    /// Mock tools. `apk_body` runs after the call is logged.
    pub fn tools(&self, apk_body: &str) -> Tools {
        self.tools_with(apk_body, None)
    }

    /// Mock tools whose `mount` fails for the named pseudo-filesystem.
    pub fn tools_with(&self, apk_body: &str, fail_mount: Option<&str>) -> Tools {
        let log = self.log.display();
        let fail = fail_mount
            .map(|name| format!("case \"$3\" in */{}) exit 32;; esac\n", name))
            .unwrap_or_default();

        let apk = format!(
            "echo \"apk $*\" >> {log}\n\
             prev=\n\
             for a in \"$@\"; do\n\
             \x20 if [ \"$prev\" = --repositories-file ]; then cp \"$a\" {repos}; echo \"repos-file $a\" >> {log}; fi\n\
             \x20 prev=\"$a\"\n\
             done\n\
             {apk_body}\n",
            repos = self.last_repositories().display(),
        );

        Tools {
            mountpoint: create_mock_binary(&self.bin.join("mountpoint"), "exit 1\n"),
            mount: create_mock_binary(
                &self.bin.join("mount"),
                &format!("{fail}echo \"mount $*\" >> {log}\n"),
            ),
            umount: create_mock_binary(
                &self.bin.join("umount"),
                &format!("echo \"umount $*\" >> {log}\n"),
            ),
            tar: PathBuf::from("tar"),
            apk: create_mock_binary(&self.bin.join("apk"), &apk),
        }
    }

    /// Copy of the repositories file from the most recent apk call.
    pub fn last_repositories(&self) -> PathBuf {
        self._temp_dir.path().join("last-repositories")
    }

    /// Every logged tool invocation, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Logged calls of one tool.
    pub fn calls_of(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{} ", tool);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    /// Repositories files handed to apk.
    pub fn repositories_files(&self) -> Vec<PathBuf> {
        self.calls_of("repos-file")
            .iter()
            .map(|c| PathBuf::from(c.trim_start_matches("repos-file ")))
            .collect()
    }

    /// Targets passed to `mount --rbind`.
    pub fn mount_targets(&self) -> Vec<String> {
        self.calls_of("mount")
            .iter()
            .filter_map(|c| c.rsplit(' ').next().map(str::to_string))
            .collect()
    }

    /// Targets passed to `umount -fR`.
    pub fn umount_targets(&self) -> Vec<String> {
        self.calls_of("umount")
            .iter()
            .filter_map(|c| c.rsplit(' ').next().map(str::to_string))
            .collect()
    }

    /// The four pseudo-filesystem targets under the root.
    pub fn pseudo_targets(&self) -> Vec<String> {
        PSEUDO_FILESYSTEMS
            .iter()
            .map(|n| self.root.join(n).display().to_string())
            .collect()
    }
}

/// Create a mock executable shell script.
pub fn create_mock_binary(path: &Path, body: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }

    fs::write(path, format!("#!/bin/sh\n{}", body)).expect("Failed to create mock binary");

    let mut perms = fs::metadata(path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
    path.to_path_buf()
}

/// Sort a copy, for membership comparisons.
pub fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

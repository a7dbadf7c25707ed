//! Repository list aggregation.
//!
//! The package manager gets one repositories file per run. It is assembled
//! from the system default file, every file in the system repository
//! directory, and the repositories given with `-r`, in that order. With
//! `-I` only the `-r` repositories are used.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::error::ProvisionError;

/// Where the system repository lists live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSources {
    pub default_file: PathBuf,
    pub dir: PathBuf,
}

/// Ordered list of repository lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryList {
    entries: Vec<String>,
}

impl RepositoryList {
    /// Aggregate the repository list.
    ///
    /// Missing system files or directories contribute nothing.
    pub fn build(sources: &RepoSources, ignore_system: bool, extras: Option<&Path>) -> Result<Self> {
        let mut list = Self::default();

        if !ignore_system {
            if sources.default_file.is_file() {
                list.extend_from_file(&sources.default_file)?;
            }
            for file in dir_files(&sources.dir)? {
                list.extend_from_file(&file)?;
            }
        }

        if let Some(extras) = extras {
            list.extend_from_file(extras)?;
        }

        Ok(list)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add each meaningful line of `content` (comments and blanks skipped).
    pub fn extend_from_str(&mut self, content: &str) {
        self.entries.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read repository file {}", path.display()))?;
        self.extend_from_str(&content);
        Ok(())
    }

    /// One repository per line, newline-terminated.
    pub fn render(&self) -> String {
        self.entries.iter().map(|e| format!("{}\n", e)).collect()
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn dir_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let context = || format!("Failed to read repository directory {}", dir.display());
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(context)? {
        let path = entry.with_context(context)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The two temporary repository files a session owns.
///
/// The aggregated file is built on first request and reused afterwards.
#[derive(Debug, Default)]
pub struct RepoFiles {
    extras: Option<NamedTempFile>,
    aggregated: Option<NamedTempFile>,
}

impl RepoFiles {
    /// Write the `-r` repositories to their own temp file (none if empty).
    pub fn new(extra_repos: &[String]) -> Result<Self> {
        if extra_repos.is_empty() {
            return Ok(Self::default());
        }
        let mut file = temp_file("extra repositories")?;
        for repo in extra_repos {
            writeln!(file, "{}", repo).context("Failed to write extra repositories")?;
        }
        file.flush().context("Failed to write extra repositories")?;
        Ok(Self {
            extras: Some(file),
            aggregated: None,
        })
    }

    pub fn extras_path(&self) -> Option<&Path> {
        self.extras.as_ref().map(NamedTempFile::path)
    }

    /// Path of the aggregated repositories file, building it if needed.
    pub fn aggregated_path(&mut self, sources: &RepoSources, ignore_system: bool) -> Result<&Path> {
        let file = match self.aggregated.take() {
            Some(file) => file,
            None => {
                let list = RepositoryList::build(sources, ignore_system, self.extras_path())?;
                tracing::debug!("aggregated {} repositories", list.entries().len());
                if list.is_empty() {
                    tracing::warn!("repository list is empty");
                }

                let mut file = temp_file("repositories")?;
                file.write_all(list.render().as_bytes())
                    .context("Failed to write repositories file")?;
                file.flush().context("Failed to write repositories file")?;
                file
            }
        };
        Ok(self.aggregated.insert(file).path())
    }

    /// Every temp file currently on disk.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.extras
            .iter()
            .chain(self.aggregated.iter())
            .map(|f| f.path().to_path_buf())
            .collect()
    }

    /// Delete both files. Safe to call repeatedly.
    pub fn remove(&mut self) {
        for file in [self.aggregated.take(), self.extras.take()].into_iter().flatten() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                tracing::warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn temp_file(what: &'static str) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("rootstrap-repos.")
        .tempfile()
        .map_err(|source| ProvisionError::TempFile { what, source }.into())
}

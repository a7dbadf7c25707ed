//! Error taxonomy for a provisioning run.
//!
//! Most code returns `anyhow::Result` and attaches context as it goes. The
//! variants here mark *which kind* of failure ended the run so that `main`
//! can pick an exit code after downcasting.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A precondition was not met (privilege, missing tool, bad path).
    #[error("{0}")]
    Precondition(String),

    #[error("failed to create temporary {what} file")]
    TempFile {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to mount {name}")]
    Mount { name: &'static str },

    #[error("initial installation failed")]
    BaseInstall,

    #[error("package installation failed")]
    PackageInstall,

    #[error("interrupted by signal {0}")]
    Interrupted(i32),
}

impl ProvisionError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted(signo) => 128 + signo,
            _ => 1,
        }
    }
}

/// Signal number if anything in the chain is an interruption.
///
/// Checked across the whole chain because install steps wrap failures in
/// their own context.
pub fn interrupted(err: &anyhow::Error) -> Option<i32> {
    err.chain()
        .find_map(|e| match e.downcast_ref::<ProvisionError>() {
            Some(ProvisionError::Interrupted(signo)) => Some(*signo),
            _ => None,
        })
}

/// Exit code for an arbitrary error chain.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match interrupted(err) {
        Some(signo) => ProvisionError::Interrupted(signo).exit_code(),
        None => 1,
    }
}

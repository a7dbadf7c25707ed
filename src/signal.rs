//! Cancellation on SIGINT/SIGTERM.
//!
//! Signals never tear anything down themselves. They only flip an atomic that
//! every blocking wait and step boundary polls, so an interrupted run unwinds
//! through the same error path (and the same session teardown) as any other
//! failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::error::ProvisionError;

/// Shared cancellation flag. Holds the number of the last signal received, or 0.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signal: Arc<AtomicUsize>,
}

impl CancelToken {
    /// A token that is never triggered by a signal (tests, library callers).
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to SIGINT and SIGTERM.
    pub fn install() -> Result<Self> {
        let token = Self::new();
        for signo in [SIGINT, SIGTERM] {
            signal_hook::flag::register_usize(signo, Arc::clone(&token.signal), signo as usize)
                .with_context(|| format!("Failed to register handler for signal {}", signo))?;
        }
        Ok(token)
    }

    /// Mark the token as cancelled, as if `signo` had been delivered.
    pub fn cancel(&self, signo: i32) {
        self.signal.store(signo as usize, Ordering::SeqCst);
    }

    /// Signal number that cancelled the run, if any.
    pub fn received(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo as i32),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.received().is_some()
    }

    /// Fail with `Interrupted` if a signal has arrived.
    pub fn check(&self) -> Result<()> {
        match self.received() {
            Some(signo) => Err(ProvisionError::Interrupted(signo).into()),
            None => Ok(()),
        }
    }
}

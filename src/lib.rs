//! Rootstrap - provision a root filesystem with an external package manager.
//!
//! The library drives one provisioning run: preflight checks, repository
//! aggregation, the base install, extra packages with the pseudo-filesystems
//! bind-mounted, and a teardown that always runs.

pub mod cli;
pub mod config;
pub mod error;
pub mod install;
pub mod logging;
pub mod mounts;
pub mod preflight;
pub mod process;
pub mod repos;
pub mod session;
pub mod signal;

use anyhow::Result;

use config::{Options, Tools};
use session::{Session, Teardown};
use signal::CancelToken;

/// Provision `options.root`.
///
/// The target is checked before anything is mounted or run. The session is
/// torn down before this returns, on success and on failure alike.
pub fn provision(options: &Options, tools: &Tools, cancel: &CancelToken) -> Result<Teardown> {
    preflight::check_target(options)?;

    let mut session = Session::new(options, tools, cancel.clone())?;
    let result = session.run();
    let teardown = session.finish();
    result.map(|()| teardown)
}

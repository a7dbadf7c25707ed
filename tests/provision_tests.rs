//! End-to-end provisioning runs against mock tools.
//!
//! Each test drives `provision` (or a `Session` directly) with shell-script
//! stand-ins for mountpoint/mount/umount/apk and checks the calls made and
//! what was left behind.

mod helpers;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use helpers::{sorted, TestEnv};
use rootstrap::config::InstallMode;
use rootstrap::error::{self, ProvisionError};
use rootstrap::provision;
use rootstrap::session::Session;
use rootstrap::signal::CancelToken;
use serial_test::serial;

const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

/// apk body that blocks on `add` (but not on `--initdb add`).
const BLOCK_ON_ADD: &str = "case \"$*\" in *--initdb*) exit 0;; esac\nexec sleep 30";

// =============================================================================
// Normal runs
// =============================================================================

#[test]
fn test_network_install_defaults_to_base_full() {
    let env = TestEnv::new();
    env.system_repos("https://repo.example/main\n");
    let tools = env.tools("exit 0");

    let teardown = provision(&env.options(), &tools, &CancelToken::new()).unwrap();

    let apk = env.calls_of("apk");
    assert_eq!(apk.len(), 2);
    assert!(apk[0].contains("--initdb add base-files base-minimal"));
    assert!(apk[1].ends_with(" add base-full"));
    assert!(!apk[1].contains("--initdb"));

    // every temp file is gone once the run returns
    assert!(teardown.removed.iter().all(|p| !p.exists()));
    assert!(env.repositories_files().iter().all(|p| !p.exists()));
    assert_eq!(
        fs::read_to_string(env.last_repositories()).unwrap(),
        "https://repo.example/main\n"
    );
}

#[test]
fn test_mounts_happen_only_around_package_step() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");

    provision(&env.options(), &tools, &CancelToken::new()).unwrap();

    let calls = env.calls();
    let first_mount = calls.iter().position(|c| c.starts_with("mount ")).unwrap();
    let initdb = calls.iter().position(|c| c.contains("--initdb")).unwrap();
    let add = calls
        .iter()
        .position(|c| c.starts_with("apk ") && !c.contains("--initdb"))
        .unwrap();
    let first_umount = calls.iter().position(|c| c.starts_with("umount ")).unwrap();

    assert!(initdb < first_mount);
    assert!(first_mount < add);
    assert!(add < first_umount);
}

#[test]
fn test_mounted_set_equals_unmounted_set() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");

    provision(&env.options(), &tools, &CancelToken::new()).unwrap();

    assert_eq!(env.mount_targets(), env.pseudo_targets());
    assert_eq!(sorted(env.umount_targets()), sorted(env.mount_targets()));
}

#[test]
fn test_ostree_install_uses_ostree_base() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.mode = InstallMode::Ostree;
    options.packages = vec!["vim".to_string()];

    provision(&options, &tools, &CancelToken::new()).unwrap();

    let apk = env.calls_of("apk");
    assert!(apk[0].contains("--initdb add base-files-ostree base-minimal"));
    assert!(apk[1].ends_with(" add vim"));
}

// =============================================================================
// Repository list
// =============================================================================

#[test]
fn test_ignored_repos_without_extras_is_empty() {
    let env = TestEnv::new();
    env.system_repos("https://repo.example/main\n");
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.ignore_repos = true;

    provision(&options, &tools, &CancelToken::new()).unwrap();

    assert_eq!(fs::read_to_string(env.last_repositories()).unwrap(), "");
}

#[test]
fn test_ignored_repos_with_extras_is_exactly_extras() {
    let env = TestEnv::new();
    env.system_repos("https://repo.example/main\n");
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.ignore_repos = true;
    options.extra_repos = vec!["X".to_string(), "Y".to_string()];

    provision(&options, &tools, &CancelToken::new()).unwrap();

    assert_eq!(fs::read_to_string(env.last_repositories()).unwrap(), "X\nY\n");
}

#[test]
fn test_same_repositories_file_for_every_call() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");

    provision(&env.options(), &tools, &CancelToken::new()).unwrap();

    let files = env.repositories_files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0], files[1]);
}

// =============================================================================
// Local installs
// =============================================================================

fn local_source(env: &TestEnv) -> PathBuf {
    let source = env._temp_dir.path().join("live");
    fs::create_dir_all(source.join("etc")).unwrap();
    fs::write(source.join("etc/os-release"), "ID=test\n").unwrap();
    source
}

#[test]
fn test_local_install_copies_without_package_manager() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.mode = InstallMode::Local {
        source: local_source(&env),
    };

    provision(&options, &tools, &CancelToken::new()).unwrap();

    assert_eq!(
        fs::read_to_string(env.root.join("etc/os-release")).unwrap(),
        "ID=test\n"
    );
    assert!(env.calls_of("apk").is_empty());
    assert!(env.calls_of("mount").is_empty());
}

#[test]
fn test_local_install_with_packages_only_adds_them() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.mode = InstallMode::Local {
        source: local_source(&env),
    };
    options.packages = vec!["git".to_string()];

    provision(&options, &tools, &CancelToken::new()).unwrap();

    let apk = env.calls_of("apk");
    assert_eq!(apk.len(), 1);
    assert!(!apk[0].contains("--initdb"));
    assert!(apk[0].ends_with(" add git"));
    assert_eq!(env.mount_targets(), env.pseudo_targets());
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_non_empty_root_does_nothing() {
    let env = TestEnv::new();
    fs::write(env.root.join("leftover"), "x").unwrap();
    let tools = env.tools("exit 0");

    let err = provision(&env.options(), &tools, &CancelToken::new()).unwrap_err();

    assert!(err.to_string().contains("is not empty"));
    assert_eq!(error::exit_code(&err), 1);
    assert!(env.calls().is_empty());
}

#[test]
fn test_non_empty_root_with_force_proceeds() {
    let env = TestEnv::new();
    fs::write(env.root.join("leftover"), "x").unwrap();
    let tools = env.tools("exit 0");
    let mut options = env.options();
    options.force = true;

    provision(&options, &tools, &CancelToken::new()).unwrap();
    assert_eq!(env.calls_of("apk").len(), 2);
}

#[test]
fn test_base_install_failure() {
    let env = TestEnv::new();
    let tools = env.tools("exit 3");

    let err = provision(&env.options(), &tools, &CancelToken::new()).unwrap_err();

    assert_eq!(err.to_string(), ProvisionError::BaseInstall.to_string());
    assert_eq!(error::exit_code(&err), 1);
    assert_eq!(env.calls_of("apk").len(), 1);
    assert!(env.calls_of("mount").is_empty());
    assert!(env.repositories_files().iter().all(|p| !p.exists()));
}

#[test]
fn test_package_install_failure_still_unmounts() {
    let env = TestEnv::new();
    let tools = env.tools("case \"$*\" in *--initdb*) exit 0;; esac\nexit 1");

    let err = provision(&env.options(), &tools, &CancelToken::new()).unwrap_err();

    assert_eq!(err.to_string(), ProvisionError::PackageInstall.to_string());
    assert_eq!(sorted(env.umount_targets()), sorted(env.pseudo_targets()));
    assert!(env.repositories_files().iter().all(|p| !p.exists()));
}

#[test]
fn test_mount_failure_unmounts_earlier_mounts() {
    let env = TestEnv::new();
    let tools = env.tools_with("exit 0", Some("proc"));

    let err = provision(&env.options(), &tools, &CancelToken::new()).unwrap_err();

    assert!(format!("{:#}", err).contains("failed to mount proc"));
    assert_eq!(
        env.umount_targets(),
        [env.root.join("dev").display().to_string()]
    );
    // only the base step ran
    assert_eq!(env.calls_of("apk").len(), 1);
}

// =============================================================================
// Interruption
// =============================================================================

#[test]
fn test_cancel_during_package_step_tears_everything_down() {
    let env = TestEnv::new();
    let tools = env.tools(BLOCK_ON_ADD);
    let mut options = env.options();
    options.extra_repos = vec!["X".to_string()];

    let cancel = CancelToken::new();
    let mut session = Session::new(&options, &tools, cancel.clone()).unwrap();
    session.repositories_file().unwrap();
    let temp_files = session.temp_files();
    assert_eq!(temp_files.len(), 2);

    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(1000));
            cancel.cancel(SIGTERM);
        })
    };
    let err = session.run().unwrap_err();
    canceller.join().unwrap();

    assert_eq!(error::interrupted(&err), Some(SIGTERM));
    assert_eq!(error::exit_code(&err), 143);
    assert_eq!(session.mounted().len(), 4);

    let teardown = session.finish();
    assert_eq!(
        teardown
            .unmounted
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        env.pseudo_targets()
    );
    assert_eq!(sorted(env.umount_targets()), sorted(env.mount_targets()));
    assert!(temp_files.iter().all(|p| !p.exists()));
}

#[test]
fn test_cancel_before_start_touches_nothing() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let cancel = CancelToken::new();
    cancel.cancel(SIGINT);

    let err = provision(&env.options(), &tools, &cancel).unwrap_err();

    assert_eq!(error::exit_code(&err), 130);
    assert!(env.calls().is_empty());
}

#[test]
#[serial]
fn test_real_signal_interrupts_run() {
    let env = TestEnv::new();
    let tools = env.tools(BLOCK_ON_ADD);
    let options = env.options();
    let cancel = CancelToken::install().unwrap();

    let sender = thread::spawn(|| {
        thread::sleep(Duration::from_millis(1000));
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();
    });
    let err = provision(&options, &tools, &cancel).unwrap_err();
    sender.join().unwrap();

    assert_eq!(error::interrupted(&err), Some(SIGINT));
    assert_eq!(sorted(env.umount_targets()), sorted(env.pseudo_targets()));
    assert!(env.repositories_files().iter().all(|p| !p.exists()));
}

#[test]
fn test_teardown_runs_once() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let options = env.options();

    let mut session = Session::new(&options, &tools, CancelToken::new()).unwrap();
    session.mount_pseudo().unwrap();

    let first = session.teardown();
    let second = session.teardown();
    drop(session);

    assert_eq!(first.unmounted.len(), 4);
    assert!(second.unmounted.is_empty());
    assert_eq!(env.umount_targets().len(), 4);
}

#[test]
fn test_drop_tears_down() {
    let env = TestEnv::new();
    let tools = env.tools("exit 0");
    let options = env.options();

    {
        let mut session = Session::new(&options, &tools, CancelToken::new()).unwrap();
        session.mount_pseudo().unwrap();
    }

    assert_eq!(sorted(env.umount_targets()), sorted(env.pseudo_targets()));
}

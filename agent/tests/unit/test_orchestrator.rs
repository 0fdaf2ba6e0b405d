//! Update orchestrator tests: success path, rollback per phase, cleanup

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use appvisor::package::errors::PackageError;
use appvisor::storage::layout::AppsLayout;
use appvisor::update::errors::UpdateError;
use appvisor::update::orchestrator::{UpdateOptions, UpdateOrchestrator};
use tempfile::TempDir;

use common::{controller, write_bundle, write_package, Behavior, FakeInstaller, FakeRuntime};

struct Fixture {
    tmp: TempDir,
    runtime: Arc<FakeRuntime>,
    installer: Arc<FakeInstaller>,
    orchestrator: UpdateOrchestrator,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("apps")).unwrap();
        std::fs::create_dir_all(tmp.path().join("packages")).unwrap();

        let runtime = FakeRuntime::new();
        let installer = FakeInstaller::new();
        let options = UpdateOptions {
            staging_root: tmp.path().join("staging"),
            ..Default::default()
        };
        let orchestrator = UpdateOrchestrator::new(
            controller(runtime.clone()),
            installer.clone(),
            AppsLayout::new(tmp.path().join("apps")),
            options,
            tracing::Span::none(),
        );
        Self {
            tmp,
            runtime,
            installer,
            orchestrator,
        }
    }

    fn apps_root(&self) -> PathBuf {
        self.tmp.path().join("apps")
    }

    fn bundle(&self, app: &str, index: u32) -> PathBuf {
        self.apps_root().join(app).join(index.to_string())
    }

    /// Install version 0 of `app`, running it if asked
    fn existing_app(&self, app: &str, running: bool) -> PathBuf {
        let bundle = write_bundle(&self.apps_root(), app, 0);
        if running {
            self.runtime.add_container(app, "running", &bundle);
        }
        bundle
    }

    fn package(&self, app: &str) -> PathBuf {
        write_package(&self.tmp.path().join("packages"), &format!("{}.ipk", app), app)
    }

    fn packages(&self, apps: &[&str]) -> Vec<PathBuf> {
        apps.iter().map(|app| self.package(app)).collect()
    }

    fn fail_start(&self, app: &str) {
        self.runtime.set_behavior(
            app,
            Behavior {
                fail_start: true,
                ..Default::default()
            },
        );
    }
}

fn assert_running_from(fixture: &Fixture, app: &str, bundle: &Path) {
    assert_eq!(
        fixture.runtime.running_bundle(app).as_deref(),
        Some(bundle),
        "{} not running from {:?}",
        app,
        bundle
    );
}

#[tokio::test]
async fn test_batch_success() {
    let f = Fixture::new();
    let old_a = f.existing_app("a", true);
    let old_b = f.existing_app("b", false);

    let report = f
        .orchestrator
        .run_batch(&f.packages(&["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["a", "b", "c"]);
    assert!(report.cleanup_warnings.is_empty());
    assert_running_from(&f, "a", &f.bundle("a", 1));
    assert_running_from(&f, "b", &f.bundle("b", 1));
    assert_running_from(&f, "c", &f.bundle("c", 0));
    assert!(!old_a.exists());
    assert!(!old_b.exists());
}

#[tokio::test]
async fn test_install_failure_rolls_back_installs() {
    let f = Fixture::new();
    for app in ["a", "b", "c"] {
        f.existing_app(app, true);
    }
    f.installer.fail_install("b");

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["a", "b", "c"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::InstallFailed { app, .. } if app == "b"));
    for app in ["a", "b", "c"] {
        assert_running_from(&f, app, &f.bundle(app, 0));
        assert!(!f.bundle(app, 1).exists());
    }
    assert!(f.runtime.signals_sent("a").is_empty());
    assert!(!f.installer.calls().contains(&"install c".to_string()));
}

#[tokio::test]
async fn test_unreadable_package_fails_install() {
    let f = Fixture::new();
    f.existing_app("a", true);
    let mut packages = f.packages(&["a"]);
    packages.push(write_package(&f.tmp.path().join("packages"), "broken.ipk", ""));

    let err = f.orchestrator.run_batch(&packages).await.unwrap_err();

    assert!(matches!(&err, UpdateError::InstallFailed { app, .. } if app == "broken.ipk"));
    assert!(!f.bundle("a", 1).exists());
    assert_running_from(&f, "a", &f.bundle("a", 0));
}

#[tokio::test]
async fn test_duplicate_app_fails_install() {
    let f = Fixture::new();
    f.existing_app("a", true);
    let packages = vec![
        f.package("a"),
        write_package(&f.tmp.path().join("packages"), "a-again.ipk", "a"),
    ];

    let err = f.orchestrator.run_batch(&packages).await.unwrap_err();

    assert!(matches!(&err, UpdateError::InstallFailed { app, .. } if app == "a"));
    assert!(!f.bundle("a", 1).exists());
    assert_running_from(&f, "a", &f.bundle("a", 0));
}

#[tokio::test]
async fn test_stop_failure_rolls_back() {
    let f = Fixture::new();
    f.existing_app("a", true);
    f.existing_app("b", true);
    f.runtime.set_behavior(
        "b",
        Behavior {
            fail_kill: true,
            ..Default::default()
        },
    );

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["a", "b"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStopFailure { app, .. } if app == "b"));
    assert_eq!(err.kind(), "RollbackOnStopFailure");
    assert_running_from(&f, "a", &f.bundle("a", 0));
    assert_running_from(&f, "b", &f.bundle("b", 0));
    assert!(!f.bundle("a", 1).exists());
    assert!(!f.bundle("b", 1).exists());
}

#[tokio::test]
async fn test_start_failure_restores_every_app() {
    let f = Fixture::new();
    let apps = ["app1", "app2", "app3", "app4", "app5"];
    for app in apps {
        // app3 is installed but not running before the update
        f.existing_app(app, app != "app3");
    }
    f.fail_start("app3");

    let err = f.orchestrator.run_batch(&f.packages(&apps)).await.unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStartFailure { app, .. } if app == "app3"));
    for app in ["app1", "app2", "app4", "app5"] {
        assert_running_from(&f, app, &f.bundle(app, 0));
    }
    assert_eq!(f.runtime.status("app3"), None);
    for app in apps {
        assert!(f.bundle(app, 0).exists(), "old bundle of {} removed", app);
        assert!(!f.bundle(app, 1).exists(), "new bundle of {} left behind", app);
    }

    // app4 and app5 never had their new version started
    let calls = f.runtime.calls();
    let app4_creates = calls.iter().filter(|c| *c == "create app4").count();
    assert_eq!(app4_creates, 1);
}

#[tokio::test]
async fn test_start_failure_of_new_app_leaves_it_absent() {
    let f = Fixture::new();
    f.existing_app("old", true);
    f.fail_start("fresh");

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["old", "fresh"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStartFailure { app, .. } if app == "fresh"));
    assert_running_from(&f, "old", &f.bundle("old", 0));
    assert_eq!(f.runtime.status("fresh"), None);
    assert!(!f.bundle("fresh", 0).exists());
    assert!(!f.bundle("old", 1).exists());
}

#[tokio::test]
async fn test_cleanup_failure_is_a_warning() {
    let f = Fixture::new();
    let old = f.existing_app("a", true);
    f.installer.fail_remove("a");

    let report = f.orchestrator.run_batch(&f.packages(&["a"])).await.unwrap();

    assert_eq!(report.updated, vec!["a"]);
    assert_eq!(report.cleanup_warnings.len(), 1);
    assert_eq!(report.cleanup_warnings[0].app, "a");
    assert_eq!(report.cleanup_warnings[0].path, old);
    assert!(old.exists());
    assert_running_from(&f, "a", &f.bundle("a", 1));
}

#[tokio::test]
async fn test_empty_batch() {
    let f = Fixture::new();
    f.existing_app("a", true);

    let report = f.orchestrator.run_batch(&[]).await.unwrap();

    assert!(report.updated.is_empty());
    assert!(f.runtime.calls().is_empty());
    assert!(f.installer.calls().is_empty());
}

fn write_payload(dir: &Path, apps: &[&str]) -> PathBuf {
    let path = dir.join("update.tar");
    let mut builder = tar::Builder::new(std::fs::File::create(&path).unwrap());
    for app in apps {
        let data = format!("{}\n", app);
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, format!("{}.ipk", app), data.as_bytes())
            .unwrap();
    }
    builder.finish().unwrap();
    path
}

fn staging_entries(f: &Fixture) -> usize {
    std::fs::read_dir(f.tmp.path().join("staging")).unwrap().count()
}

#[tokio::test]
async fn test_apply_payload() {
    let f = Fixture::new();
    f.existing_app("a", true);
    let payload = write_payload(f.tmp.path(), &["a", "b"]);

    let report = f.orchestrator.apply_payload(&payload).await.unwrap();

    assert_eq!(report.updated, vec!["a", "b"]);
    assert_running_from(&f, "a", &f.bundle("a", 1));
    assert_running_from(&f, "b", &f.bundle("b", 0));
    assert_eq!(staging_entries(&f), 0);
}

#[tokio::test]
async fn test_apply_invalid_payload_changes_nothing() {
    let f = Fixture::new();
    f.existing_app("a", true);
    let payload = f.tmp.path().join("update.tar");
    std::fs::write(&payload, vec![b'x'; 2048]).unwrap();

    let err = f.orchestrator.apply_payload(&payload).await.unwrap_err();

    assert!(matches!(err, UpdateError::ArchiveInvalid(_)));
    assert_running_from(&f, "a", &f.bundle("a", 0));
    assert!(f.runtime.calls().is_empty());
    assert_eq!(staging_entries(&f), 0);
}

#[tokio::test]
async fn test_package_name_cannot_escape_apps_root() {
    let f = Fixture::new();
    f.existing_app("a", true);
    let mut packages = f.packages(&["a"]);
    packages.push(write_package(&f.tmp.path().join("packages"), "evil.ipk", "../outside"));

    let err = f.orchestrator.run_batch(&packages).await.unwrap_err();

    match &err {
        UpdateError::InstallFailed { app, source } => {
            assert_eq!(app, "evil.ipk");
            assert!(matches!(source, PackageError::InvalidName(name) if name == "../outside"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!f.tmp.path().join("outside").exists());
    assert!(!f.bundle("a", 1).exists());
    assert_running_from(&f, "a", &f.bundle("a", 0));
}

#[tokio::test]
async fn test_rollback_does_not_start_stopped_app() {
    let f = Fixture::new();
    let old_a = f.existing_app("a", false);
    f.runtime.add_container("a", "stopped", &old_a);
    f.existing_app("b", true);
    f.fail_start("b");

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["a", "b"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStartFailure { app, .. } if app == "b"));
    assert_eq!(f.runtime.running_bundle("a"), None);
    assert!(old_a.exists());
    assert!(!f.bundle("a", 1).exists());
    assert_running_from(&f, "b", &f.bundle("b", 0));
}

#[tokio::test]
async fn test_stop_failure_leaves_later_apps_untouched() {
    let f = Fixture::new();
    for app in ["a", "b", "c"] {
        f.existing_app(app, true);
    }
    f.runtime.set_behavior(
        "b",
        Behavior {
            fail_kill: true,
            ..Default::default()
        },
    );

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["a", "b", "c"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStopFailure { app, .. } if app == "b"));
    assert!(f.runtime.signals_sent("c").is_empty());
    for app in ["a", "b", "c"] {
        assert_running_from(&f, app, &f.bundle(app, 0));
        assert!(!f.bundle(app, 1).exists());
    }
}

#[tokio::test]
async fn test_stop_failure_leaves_new_app_absent() {
    let f = Fixture::new();
    f.existing_app("b", true);
    f.runtime.set_behavior(
        "b",
        Behavior {
            fail_kill: true,
            ..Default::default()
        },
    );

    let err = f
        .orchestrator
        .run_batch(&f.packages(&["fresh", "b"]))
        .await
        .unwrap_err();

    assert!(matches!(&err, UpdateError::RollbackOnStopFailure { app, .. } if app == "b"));
    assert_eq!(f.runtime.status("fresh"), None);
    assert!(!f.bundle("fresh", 0).exists());
    assert!(!f.runtime.calls().contains(&"create fresh".to_string()));
    assert_running_from(&f, "b", &f.bundle("b", 0));
}

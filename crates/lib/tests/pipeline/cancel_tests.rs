use std::sync::Arc;

use async_trait::async_trait;
use dockbuild_lib::build::BuildOutcome;
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::driver::{Driver, MockCall};
use dockbuild_lib::provision::{NoopProvisioner, ProvisionError, Provisioner, Session};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::common::{call_names, engine, image, run_with};

/// Signals that provisioning started, then never finishes.
struct Hanging {
  started: Arc<Notify>,
}

#[async_trait]
impl Provisioner for Hanging {
  async fn provision(&self, _driver: &dyn Driver, _session: Option<&Session>) -> Result<(), ProvisionError> {
    self.started.notify_one();
    std::future::pending().await
  }
}

#[tokio::test]
async fn cancellation_yields_no_artifact_and_no_error() {
  let driver = engine();
  let started = Arc::new(Notify::new());
  let provisioner = Hanging {
    started: started.clone(),
  };

  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    started.notified().await;
    trigger.cancel();
  });

  let outcome = run_with(
    RawConfig {
      commit: true,
      ..image("alpine")
    },
    &driver,
    &provisioner,
    cancel,
  )
  .await
  .unwrap();

  assert!(matches!(outcome, BuildOutcome::Cancelled));
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "kill"]);
}

#[tokio::test]
async fn cancelled_before_start_runs_no_step() {
  let driver = engine();
  let provisioner = Hanging {
    started: Arc::new(Notify::new()),
  };
  let cancel = CancellationToken::new();
  cancel.cancel();

  let outcome = run_with(
    RawConfig {
      discard: true,
      ..image("alpine")
    },
    &driver,
    &provisioner,
    cancel,
  )
  .await
  .unwrap();

  assert!(matches!(outcome, BuildOutcome::Cancelled));
  assert_eq!(call_names(&driver), vec!["verify", "version"]);
}

#[tokio::test]
async fn cancel_during_pull_still_logs_out() {
  let mut driver = engine();
  driver.hang_on = Some("pull");
  let cancel = CancellationToken::new();

  let mut raw = RawConfig {
    discard: true,
    ..image("private/app")
  };
  raw.login.login = true;
  raw.login.login_server = Some("registry.example.com".to_string());

  let watcher = async {
    while !driver.called(|c| matches!(c, MockCall::Pull { .. })) {
      tokio::task::yield_now().await;
    }
    cancel.cancel();
  };
  let provisioner = NoopProvisioner;
  let (outcome, ()) = tokio::join!(run_with(raw, &driver, &provisioner, cancel.clone()), watcher);

  assert!(matches!(outcome.unwrap(), BuildOutcome::Cancelled));
  assert_eq!(call_names(&driver), vec!["verify", "version", "login", "pull", "logout"]);
}

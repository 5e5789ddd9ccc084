use dockbuild_lib::build::BuildError;
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::driver::IP_ADDRESS_FORMAT;
use dockbuild_lib::provision::ProvisionError;

use super::common::{call_names, engine, image, run};

#[tokio::test]
async fn provision_failure_kills_container() {
  let mut driver = engine();
  driver.exec_error = Some("exit status 1".to_string());

  let err = run(
    RawConfig {
      commit: true,
      provision: vec!["false".to_string(), "never runs".to_string()],
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Provision(ProvisionError::Command { index: 0, .. })));
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "exec", "kill"]);
}

#[tokio::test]
async fn pull_failure_stops_before_run() {
  let mut driver = engine();
  driver.pull_error = Some("manifest unknown".to_string());

  let err = run(
    RawConfig {
      discard: true,
      ..image("missing/image")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Pull { image: ref name, .. } if name == "missing/image"));
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull"]);
}

#[tokio::test]
async fn commit_failure_still_kills_container() {
  let mut driver = engine();
  driver.commit_error = Some("disk full".to_string());

  let err = run(
    RawConfig {
      commit: true,
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Commit(_)));
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "commit", "kill"]);
}

#[tokio::test]
async fn unresolvable_address_fails_connect() {
  let mut driver = engine();
  driver.inspect_results.remove(IP_ADDRESS_FORMAT);

  let err = run(
    RawConfig {
      discard: true,
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Connect(_)));
  assert_eq!(call_names(&driver).last(), Some(&"kill"));
}

#[tokio::test]
async fn missing_engine_fails_before_any_step() {
  let mut driver = engine();
  driver.verify_error = Some("not found".to_string());

  let err = run(
    RawConfig {
      discard: true,
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Engine(_)));
  assert_eq!(call_names(&driver), vec!["verify"]);
}

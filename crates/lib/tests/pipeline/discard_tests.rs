use dockbuild_lib::build::{BuildOutcome, GeneratedKey};
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::driver::MockCall;

use super::common::{call_names, engine, image, run};

#[tokio::test]
async fn discard_produces_no_artifact() {
  let driver = engine();
  let outcome = run(
    RawConfig {
      discard: true,
      ..image("alpine:3.19")
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Discarded(data) = outcome else {
    panic!("expected a discarded build, got {outcome:?}");
  };
  assert_eq!(data.get(GeneratedKey::SourceImageSha256), Some("sha256:content"));
  assert_eq!(data.get(GeneratedKey::SourceImageDigest), Some("alpine@sha256:digest"));
  assert!(!data.is_known(GeneratedKey::ImageSha256));

  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "kill"]);
}

#[tokio::test]
async fn default_run_command_uses_working_image() {
  let driver = engine();
  run(
    RawConfig {
      discard: true,
      ..image("alpine:3.19")
    },
    &driver,
  )
  .await
  .unwrap();

  let config = driver
    .calls()
    .into_iter()
    .find_map(|c| match c {
      MockCall::StartContainer { config } => Some(config),
      _ => None,
    })
    .expect("container started");
  assert_eq!(config.image, "alpine:3.19");
  assert_eq!(config.volumes.values().next().map(String::as_str), Some("/dockbuild-files"));
}

#[tokio::test]
async fn pull_disabled_still_records_provenance() {
  let driver = engine();
  let outcome = run(
    RawConfig {
      discard: true,
      pull: Some(false),
      ..image("local/app")
    },
    &driver,
  )
  .await
  .unwrap();

  assert!(!driver.called(|c| matches!(c, MockCall::Pull { .. })));
  let BuildOutcome::Discarded(data) = outcome else {
    panic!("expected a discarded build");
  };
  assert!(data.is_known(GeneratedKey::SourceImageSha256));
}

#[tokio::test]
async fn provision_commands_run_in_container() {
  let driver = engine();
  run(
    RawConfig {
      discard: true,
      provision: vec!["apk add curl".to_string()],
      exec_user: Some("root".to_string()),
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap();

  assert!(driver.called(|c| matches!(
    c,
    MockCall::Exec { id, user, command, windows: false }
      if id == "container-1" && user.as_deref() == Some("root") && command == "apk add curl"
  )));
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "exec", "kill"]);
}

use dockbuild_lib::artifact::Artifact;
use dockbuild_lib::build::{BuildOutcome, GeneratedKey};
use dockbuild_lib::config::{BootstrapDescriptor, RawConfig};
use dockbuild_lib::consts::BUILDER_ID_IMPORT;
use dockbuild_lib::driver::{DIGEST_FORMAT, MockCall, MockDriver, SHA256_FORMAT};
use tempfile::TempDir;

use super::common::{call_names, engine, image, run};

fn committed_changes(driver: &MockDriver) -> Vec<String> {
  driver
    .calls()
    .into_iter()
    .find_map(|c| match c {
      MockCall::Commit { changes, .. } => Some(changes),
      _ => None,
    })
    .expect("container committed")
}

#[tokio::test]
async fn commit_restores_default_cmd_and_entrypoint() {
  let driver = engine();
  let outcome = run(
    RawConfig {
      commit: true,
      changes: vec!["ENV APP=demo".to_string()],
      ..image("ubuntu:22.04")
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Artifact(Artifact::Image(artifact)) = outcome else {
    panic!("expected an image artifact, got {outcome:?}");
  };
  assert_eq!(artifact.id, "sha256:committed");
  assert_eq!(artifact.builder_id, BUILDER_ID_IMPORT);
  assert_eq!(artifact.generated_data.get(GeneratedKey::ImageSha256), Some("sha256:content"));

  assert_eq!(
    committed_changes(&driver),
    vec!["ENV APP=demo", r#"CMD ["/bin/sh"]"#, r#"ENTRYPOINT [""]"#]
  );
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "commit", "kill"]);
}

#[tokio::test]
async fn user_entrypoint_is_not_overridden() {
  let driver = engine();
  run(
    RawConfig {
      commit: true,
      changes: vec![r#"entrypoint ["/app"]"#.to_string()],
      ..image("ubuntu")
    },
    &driver,
  )
  .await
  .unwrap();

  assert_eq!(
    committed_changes(&driver),
    vec![r#"entrypoint ["/app"]"#, r#"CMD ["/bin/sh"]"#]
  );
}

#[tokio::test]
async fn digest_failure_is_not_fatal() {
  let mut driver = engine();
  driver.inspect_results.remove(DIGEST_FORMAT);

  let outcome = run(
    RawConfig {
      commit: true,
      ..image("never-pushed/app")
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Artifact(artifact) = outcome else {
    panic!("expected an artifact");
  };
  let data = artifact.generated_data();
  assert_eq!(
    data.get(GeneratedKey::SourceImageDigest),
    Some("ERR_SOURCE_IMAGE_DIGEST_NOT_FOUND")
  );
  assert!(data.is_known(GeneratedKey::SourceImageSha256));
}

#[tokio::test]
async fn sha256_failure_keeps_sentinels() {
  let mut driver = engine();
  driver.inspect_results.remove(SHA256_FORMAT);

  let outcome = run(
    RawConfig {
      commit: true,
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Artifact(artifact) = outcome else {
    panic!("expected an artifact");
  };
  assert!(!artifact.generated_data().is_known(GeneratedKey::SourceImageSha256));
  assert!(!artifact.generated_data().is_known(GeneratedKey::ImageSha256));
}

#[tokio::test]
async fn bootstrapped_image_is_committed_and_kept() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\n").unwrap();

  let driver = engine();
  let outcome = run(
    RawConfig {
      commit: true,
      build: Some(BootstrapDescriptor {
        path: Some(temp.path().join("Dockerfile")),
        build_dir: Some(temp.path().to_path_buf()),
        ..Default::default()
      }),
      ..Default::default()
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Artifact(artifact) = outcome else {
    panic!("expected an artifact");
  };
  assert_eq!(artifact.generated_data().get(GeneratedKey::SourceImageDigest), Some(""));

  let started = driver.calls().into_iter().find_map(|c| match c {
    MockCall::StartContainer { config } => Some(config.image),
    _ => None,
  });
  assert_eq!(started.as_deref(), Some("sha256:built"));
  assert_eq!(call_names(&driver), vec!["verify", "version", "build", "run", "commit", "kill"]);
}

#[tokio::test]
async fn windows_container_is_stopped_before_commit() {
  let driver = engine();
  run(
    RawConfig {
      commit: true,
      windows_container: true,
      ..image("mcr.microsoft.com/windows/servercore:ltsc2022")
    },
    &driver,
  )
  .await
  .unwrap();

  assert_eq!(
    call_names(&driver),
    vec!["verify", "version", "pull", "run", "stop", "commit", "kill"]
  );
}

use dockbuild_lib::artifact::Artifact;
use dockbuild_lib::build::{BuildError, BuildOutcome};
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::consts::BUILDER_ID;
use tempfile::TempDir;

use super::common::{call_names, engine, image, run};

#[tokio::test]
async fn export_writes_container_filesystem() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("rootfs.tar");

  let driver = engine();
  let outcome = run(
    RawConfig {
      export_path: Some(path.clone()),
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap();

  let BuildOutcome::Artifact(Artifact::Export(artifact)) = outcome else {
    panic!("expected an export artifact, got {outcome:?}");
  };
  assert_eq!(artifact.path, path);
  assert_eq!(artifact.builder_id, BUILDER_ID);
  assert_eq!(std::fs::read(&path).unwrap(), b"exported-filesystem");
  assert_eq!(call_names(&driver), vec!["verify", "version", "pull", "run", "export", "kill"]);
}

#[tokio::test]
async fn export_failure_is_reported() {
  let temp = TempDir::new().unwrap();
  let mut driver = engine();
  driver.export_error = Some("container vanished".to_string());
  let archive = temp.path().join("rootfs.tar");

  let err = run(
    RawConfig {
      export_path: Some(archive.clone()),
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, BuildError::Export(_)));
  assert_eq!(call_names(&driver).last(), Some(&"kill"));
  assert!(!archive.exists());
}

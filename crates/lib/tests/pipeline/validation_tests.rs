use dockbuild_lib::build::Builder;
use dockbuild_lib::config::{RawConfig, ValidationError};
use tempfile::TempDir;

use super::common::image;

fn errors(raw: RawConfig) -> Vec<ValidationError> {
  match Builder::prepare(raw) {
    Ok(_) => panic!("configuration should be rejected"),
    Err(e) => e.errors.0,
  }
}

#[test]
fn export_to_directory_is_rejected() {
  let temp = TempDir::new().unwrap();
  let errs = errors(RawConfig {
    export_path: Some(temp.path().to_path_buf()),
    ..image("alpine")
  });
  assert!(matches!(errs.as_slice(), [ValidationError::ExportPathNotFile]));
}

#[test]
fn ecr_login_without_server_is_rejected() {
  let mut raw = RawConfig {
    discard: true,
    ..image("alpine")
  };
  raw.login.ecr_login = true;

  let errs = errors(raw);
  assert!(matches!(errs.as_slice(), [ValidationError::EcrLoginServerRequired]));
}

#[test]
fn missing_terminal_action_is_rejected() {
  let errs = errors(image("alpine"));
  assert!(matches!(errs.as_slice(), [ValidationError::ArtifactNotUsed]));
}

#[test]
fn pull_with_bootstrap_only_warns() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\n").unwrap();

  let raw = RawConfig {
    discard: true,
    pull: Some(true),
    build: Some(dockbuild_lib::config::BootstrapDescriptor {
      path: Some(temp.path().join("Dockerfile")),
      build_dir: Some(temp.path().to_path_buf()),
      ..Default::default()
    }),
    ..Default::default()
  };

  let (builder, warnings) = Builder::prepare(raw).unwrap();
  assert_eq!(warnings.len(), 1);
  assert!(!builder.config().pull);
}

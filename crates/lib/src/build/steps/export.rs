use async_trait::async_trait;
use tracing::{info, warn};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};
use crate::config::TerminalAction;

/// Streams the container filesystem into the export path.
#[derive(Debug, Default)]
pub struct StepExport;

#[async_trait]
impl Step for StepExport {
  fn name(&self) -> &'static str {
    "export"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let TerminalAction::Export(path) = &ctx.config.terminal else {
      return Err(BuildError::MissingState("export_path"));
    };
    let container_id = state.container_id()?;

    let mut file = tokio::fs::File::create(path)
      .await
      .map_err(|source| BuildError::ExportFile {
        path: path.clone(),
        source,
      })?;

    info!(container = %container_id, path = %path.display(), "exporting the container");
    let exported = ctx.driver.export(container_id, &mut file).await;
    if exported.is_err() {
      drop(file);
      if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove partial archive");
      }
    }
    exported.map_err(BuildError::Export)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::steps::testing;
  use crate::config::RawConfig;
  use crate::driver::MockDriver;
  use tempfile::TempDir;

  #[tokio::test]
  async fn writes_archive_to_export_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image.tar");
    let config = testing::config(RawConfig {
      image: Some("alpine".to_string()),
      export_path: Some(path.clone()),
      ..Default::default()
    });
    let driver = MockDriver::new();
    let mut state = BuildState::new("alpine");
    state.container_id = Some("c1".to_string());

    StepExport.run(&testing::ctx(&config, &driver), &mut state).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"exported-filesystem");
  }

  #[tokio::test]
  async fn unwritable_path_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing-dir").join("image.tar");
    let config = testing::config(RawConfig {
      image: Some("alpine".to_string()),
      export_path: Some(path),
      ..Default::default()
    });
    let driver = MockDriver::new();
    let mut state = BuildState::new("alpine");
    state.container_id = Some("c1".to_string());

    let err = StepExport.run(&testing::ctx(&config, &driver), &mut state).await.unwrap_err();
    assert!(matches!(err, BuildError::ExportFile { .. }));
    assert!(driver.calls().is_empty());
  }

  #[tokio::test]
  async fn failed_export_removes_partial_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image.tar");
    let config = testing::config(RawConfig {
      image: Some("alpine".to_string()),
      export_path: Some(path.clone()),
      ..Default::default()
    });
    let driver = MockDriver {
      export_error: Some("container gone".to_string()),
      ..Default::default()
    };
    let mut state = BuildState::new("alpine");
    state.container_id = Some("c1".to_string());

    let err = StepExport.run(&testing::ctx(&config, &driver), &mut state).await.unwrap_err();
    assert!(matches!(err, BuildError::Export(_)));
    assert!(!path.exists());
  }
}

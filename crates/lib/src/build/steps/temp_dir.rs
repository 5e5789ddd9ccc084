use async_trait::async_trait;
use tracing::{debug, warn};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};
use crate::consts::APP_NAME;

/// Creates the host directory mounted into the container.
#[derive(Debug, Default)]
pub struct StepTempDir;

#[async_trait]
impl Step for StepTempDir {
  fn name(&self) -> &'static str {
    "temp-dir"
  }

  async fn run(&mut self, _ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let dir = tempfile::Builder::new()
      .prefix(&format!("{APP_NAME}-"))
      .tempdir()
      .map_err(BuildError::TempDir)?;
    debug!(path = %dir.path().display(), "created host directory");
    state.host_dir = Some(dir);
    Ok(())
  }

  async fn cleanup(&mut self, _ctx: &BuildContext<'_>, state: &mut BuildState) {
    if let Some(dir) = state.host_dir.take() {
      let path = dir.path().to_path_buf();
      if let Err(e) = dir.close() {
        warn!(path = %path.display(), error = %e, "failed to remove host directory");
      }
    }
  }
}

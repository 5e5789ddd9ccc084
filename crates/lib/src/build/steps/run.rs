use async_trait::async_trait;
use tracing::{info, warn};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};

/// Starts the working container. Cleanup kills and removes it.
#[derive(Debug, Default)]
pub struct StepRun;

#[async_trait]
impl Step for StepRun {
  fn name(&self) -> &'static str {
    "run"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let host_dir = state.host_dir.as_ref().map(|d| d.path());
    let run_config = ctx.config.run_config(&state.image, host_dir);

    info!(image = %state.image, "starting container");
    let id = ctx
      .driver
      .start_container(&run_config)
      .await
      .map_err(BuildError::StartContainer)?;

    info!(container = %id, "container started");
    state.container_id = Some(id);
    Ok(())
  }

  async fn cleanup(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) {
    let Some(id) = state.container_id.as_deref() else {
      return;
    };
    if let Err(e) = ctx.driver.kill_and_remove_container(id).await {
      warn!(container = %id, error = %e, "error removing container; it may need to be removed manually");
    }
  }
}

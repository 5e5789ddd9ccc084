use async_trait::async_trait;
use tracing::{info, warn};

use crate::build::GeneratedKey;
use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};

/// Commits the working container to a new image.
#[derive(Debug, Default)]
pub struct StepCommit;

#[async_trait]
impl Step for StepCommit {
  fn name(&self) -> &'static str {
    "commit"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let config = ctx.config;
    let container_id = state.container_id()?.to_string();

    // A running windows container cannot be committed.
    if config.windows_container {
      ctx
        .driver
        .stop_container(&container_id)
        .await
        .map_err(BuildError::StopContainer)?;
    }

    info!(container = %container_id, "committing the container");
    let image_id = ctx
      .driver
      .commit(&container_id, &config.author, &state.commit_changes, &config.message)
      .await
      .map_err(BuildError::Commit)?;

    match ctx.driver.sha256(&image_id).await {
      Ok(sha256) => state.generated_data.put(GeneratedKey::ImageSha256, sha256),
      Err(e) => warn!(image = %image_id, error = %e, "error determining committed image id"),
    }

    info!(image = %image_id, "image committed");
    state.image_id = Some(image_id);
    Ok(())
  }
}

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::build::GeneratedKey;
use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};
use crate::credentials::RegistrySession;

/// Makes the working image available locally and records its provenance.
#[derive(Debug, Default)]
pub struct StepPull {
  /// Open while the pull runs; closed by `cleanup` if the run is cancelled.
  session: Option<RegistrySession>,
}

#[async_trait]
impl Step for StepPull {
  fn name(&self) -> &'static str {
    "pull"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let config = ctx.config;

    if !config.pull {
      debug!(image = %state.image, "pull disabled, won't call pull");
      record_source_image(ctx, state).await;
      return Ok(());
    }

    info!(image = %state.image, "pulling image");
    self.session = RegistrySession::open(ctx.driver, &config.login, ctx.credentials).await?;
    let pulled = ctx.driver.pull(&state.image, config.platform.as_deref()).await;
    if let Some(session) = self.session.take() {
      session.close(ctx.driver).await;
    }
    pulled.map_err(|source| BuildError::Pull {
      image: state.image.clone(),
      source,
    })?;

    record_source_image(ctx, state).await;
    Ok(())
  }

  async fn cleanup(&mut self, ctx: &BuildContext<'_>, _state: &mut BuildState) {
    if let Some(session) = self.session.take() {
      session.close(ctx.driver).await;
    }
  }
}

/// Record the source image's content hash and digest. Lookup failures are
/// warnings; the corresponding sentinel stays in place.
async fn record_source_image(ctx: &BuildContext<'_>, state: &mut BuildState) {
  match ctx.driver.sha256(&state.image).await {
    Ok(sha256) => {
      state.generated_data.put(GeneratedKey::SourceImageSha256, sha256.clone());
      state.source_sha256 = Some(sha256);
    }
    Err(e) => warn!(image = %state.image, error = %e, "error determining source image id"),
  }

  // A locally built image has no distribution digest.
  if state.image_bootstrapped {
    state.generated_data.put(GeneratedKey::SourceImageDigest, "");
    return;
  }

  match ctx.driver.digest(&state.image).await {
    Ok(digest) => {
      state.generated_data.put(GeneratedKey::SourceImageDigest, digest.clone());
      state.source_digest = Some(digest);
    }
    Err(e) => warn!(
      image = %state.image,
      error = %e,
      "error determining source image digest; the image may not have been pushed yet, \
       so no distribution digest exists"
    ),
  }
}

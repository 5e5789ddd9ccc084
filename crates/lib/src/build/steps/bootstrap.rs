use async_trait::async_trait;
use tracing::{info, warn};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};
use crate::config::TerminalAction;
use crate::credentials::RegistrySession;

/// Builds the base image from the `build` descriptor and makes it the
/// working image.
#[derive(Debug, Default)]
pub struct StepBootstrap {
  ran: bool,
  /// Open while the build runs; closed by `cleanup` if the run is cancelled.
  session: Option<RegistrySession>,
}

#[async_trait]
impl Step for StepBootstrap {
  fn name(&self) -> &'static str {
    "bootstrap"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let Some(desc) = ctx.config.bootstrap.as_ref().filter(|d| !d.is_default()) else {
      return Ok(());
    };

    info!("building base image");
    self.session = RegistrySession::open(ctx.driver, &ctx.config.login, ctx.credentials).await?;
    let built = ctx.driver.build(&desc.build_args()).await;
    if let Some(session) = self.session.take() {
      session.close(ctx.driver).await;
    }
    let image_id = built.map_err(BuildError::Bootstrap)?;

    info!(image = %image_id, "finished building base image");
    state.image = image_id;
    state.image_bootstrapped = true;
    self.ran = true;
    Ok(())
  }

  async fn cleanup(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) {
    if let Some(session) = self.session.take() {
      session.close(ctx.driver).await;
    }
    if !self.ran {
      return;
    }
    if ctx.config.terminal != TerminalAction::Discard {
      info!("final image is not discarded; keeping the bootstrap image it depends on");
      return;
    }

    if let Err(e) = ctx.driver.delete_image(&state.image).await {
      warn!(
        image = %state.image,
        error = %e,
        "failed to remove bootstrap image; expected when other images were built from the same Dockerfile"
      );
    }
  }
}

use async_trait::async_trait;
use tracing::{debug, info};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};
use crate::config::CommunicatorKind;
use crate::provision::Session;

/// Resolves how provisioners reach the container.
#[derive(Debug, Default)]
pub struct StepConnect;

#[async_trait]
impl Step for StepConnect {
  fn name(&self) -> &'static str {
    "connect"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let config = ctx.config;
    if config.communicator == CommunicatorKind::None {
      debug!("communicator disabled, not connecting");
      return Ok(());
    }

    let container_id = state.container_id()?.to_string();
    let host = ctx
      .driver
      .ip_address(&container_id)
      .await
      .map_err(BuildError::Connect)?;

    info!(container = %container_id, host = %host, communicator = %config.communicator, "connected to container");
    state.session = Some(Session {
      container_id,
      host,
      kind: config.communicator,
      container_dir: config.container_dir.clone(),
      exec_user: config.exec_user.clone(),
      windows: config.communicator == CommunicatorKind::DockerWindowsContainer,
      fix_upload_owner: config.fix_upload_owner,
    });
    Ok(())
  }

  async fn cleanup(&mut self, _ctx: &BuildContext<'_>, state: &mut BuildState) {
    state.session = None;
  }
}

use async_trait::async_trait;
use tracing::info;

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};

/// Hands the connected container to the provisioner.
#[derive(Debug, Default)]
pub struct StepProvision;

#[async_trait]
impl Step for StepProvision {
  fn name(&self) -> &'static str {
    "provision"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    info!("provisioning");
    ctx.provisioner.provision(ctx.driver, state.session.as_ref()).await?;
    Ok(())
  }

  async fn cleanup(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) {
    ctx.provisioner.cleanup(ctx.driver, state.session.as_ref()).await;
  }
}

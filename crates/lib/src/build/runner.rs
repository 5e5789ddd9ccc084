//! Sequential step runner.
//!
//! Steps run strictly in order. The first failure is stored in
//! [`BuildState::error`] and halts the pipeline; cancellation sets
//! [`BuildState::cancelled`]. Either way, every step whose `run` was
//! entered gets its `cleanup` called, in reverse order.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::types::{BuildError, BuildState};
use crate::config::LifecycleConfig;
use crate::credentials::CredentialProvider;
use crate::driver::Driver;
use crate::provision::Provisioner;

/// Read-only collaborators shared by all steps.
pub struct BuildContext<'a> {
  pub config: &'a LifecycleConfig,
  pub driver: &'a dyn Driver,
  pub provisioner: &'a dyn Provisioner,
  pub credentials: &'a dyn CredentialProvider,
}

#[async_trait]
pub trait Step: Send {
  fn name(&self) -> &'static str;

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError>;

  async fn cleanup(&mut self, _ctx: &BuildContext<'_>, _state: &mut BuildState) {}
}

pub async fn run_steps(
  steps: &mut [Box<dyn Step>],
  ctx: &BuildContext<'_>,
  state: &mut BuildState,
  cancel: &CancellationToken,
) {
  let mut entered = 0;

  for step in steps.iter_mut() {
    if cancel.is_cancelled() {
      state.cancelled = true;
      break;
    }

    entered += 1;
    debug!(step = step.name(), "running step");

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      result = step.run(ctx, state) => Some(result),
    };

    match result {
      Some(Ok(())) => {}
      Some(Err(e)) => {
        error!(step = step.name(), error = %e, "step failed");
        state.error = Some(e);
        break;
      }
      None => {
        info!(step = step.name(), "build cancelled");
        state.cancelled = true;
        break;
      }
    }
  }

  for step in steps[..entered].iter_mut().rev() {
    debug!(step = step.name(), "cleaning up step");
    step.cleanup(ctx, state).await;
  }
}

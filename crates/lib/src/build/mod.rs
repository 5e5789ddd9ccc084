//! Build pipeline.
//!
//! [`Builder`] assembles the step list for a validated configuration, runs it
//! against a driver, and turns the final state into a [`BuildOutcome`].

pub mod runner;
pub mod steps;
pub mod types;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::artifact::{Artifact, ExportArtifact, ImageArtifact};
use crate::config::{LifecycleConfig, PrepareError, RawConfig, TerminalAction, prepare};
use crate::consts::{BUILDER_ID, BUILDER_ID_IMPORT};
use crate::credentials::CredentialProvider;
use crate::driver::Driver;
use crate::provision::Provisioner;

pub use runner::{BuildContext, Step, run_steps};
pub use types::{BuildError, BuildState, GeneratedData, GeneratedKey};

/// Result of a pipeline run that did not fail.
#[derive(Debug)]
pub enum BuildOutcome {
  Artifact(Artifact),
  /// The container was discarded; only provenance remains.
  Discarded(GeneratedData),
  /// The user aborted the build.
  Cancelled,
}

#[derive(Debug, Clone)]
pub struct Builder {
  config: LifecycleConfig,
}

impl Builder {
  pub fn new(config: LifecycleConfig) -> Self {
    Self { config }
  }

  /// Validate `raw` and return the builder plus any warnings.
  pub fn prepare(raw: RawConfig) -> Result<(Self, Vec<String>), PrepareError> {
    let prepared = prepare(raw)?;
    Ok((Self::new(prepared.config), prepared.warnings))
  }

  pub fn config(&self) -> &LifecycleConfig {
    &self.config
  }

  /// Step list for this configuration, in execution order.
  pub fn steps(&self) -> Vec<Box<dyn Step>> {
    let mut list: Vec<Box<dyn Step>> = vec![
      Box::new(steps::StepDefaultGeneratedData),
      Box::new(steps::StepTempDir),
      Box::new(steps::StepBootstrap::default()),
      Box::new(steps::StepPull::default()),
      Box::new(steps::StepRun),
      Box::new(steps::StepConnect),
      Box::new(steps::StepProvision),
    ];

    match &self.config.terminal {
      TerminalAction::Discard => debug!("container will be discarded"),
      TerminalAction::Commit => {
        debug!("container will be committed");
        list.push(Box::new(steps::StepSetDefaults));
        list.push(Box::new(steps::StepCommit));
      }
      TerminalAction::Export(path) => {
        debug!(path = %path.display(), "container will be exported");
        list.push(Box::new(steps::StepExport));
      }
    }
    list
  }

  pub async fn run(
    &self,
    driver: &dyn Driver,
    provisioner: &dyn Provisioner,
    credentials: &dyn CredentialProvider,
    cancel: CancellationToken,
  ) -> Result<BuildOutcome, BuildError> {
    driver.verify_installed().await.map_err(BuildError::Engine)?;
    let version = driver.version().await.map_err(BuildError::Engine)?;
    debug!(version = %version, "engine version");

    let ctx = BuildContext {
      config: &self.config,
      driver,
      provisioner,
      credentials,
    };
    let mut state = BuildState::new(self.config.image.clone());
    state.commit_changes = self.config.changes.clone();

    let mut pipeline = self.steps();
    run_steps(&mut pipeline, &ctx, &mut state, &cancel).await;

    if state.cancelled {
      info!("build was cancelled");
      return Ok(BuildOutcome::Cancelled);
    }
    if let Some(e) = state.error.take() {
      return Err(e);
    }

    let generated_data = state.generated_data;
    let outcome = match &self.config.terminal {
      TerminalAction::Discard => BuildOutcome::Discarded(generated_data),
      TerminalAction::Commit => {
        let id = state.image_id.ok_or(BuildError::MissingState("image_id"))?;
        BuildOutcome::Artifact(Artifact::Image(ImageArtifact {
          id,
          builder_id: BUILDER_ID_IMPORT.to_string(),
          tags: Vec::new(),
          generated_data,
        }))
      }
      TerminalAction::Export(path) => BuildOutcome::Artifact(Artifact::Export(ExportArtifact {
        path: path.clone(),
        builder_id: BUILDER_ID.to_string(),
        generated_data,
      })),
    };
    Ok(outcome)
  }
}

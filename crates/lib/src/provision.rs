//! Provisioning of the working container.
//!
//! Provisioners receive a [`Session`] describing how to reach the container.
//! [`ExecProvisioner`] runs inline shell commands through the engine's
//! `exec` subcommand.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::CommunicatorKind;
use crate::driver::{Driver, DriverError};

#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error("provisioning command {index} ({command:?}) failed: {source}")]
  Command {
    index: usize,
    command: String,
    #[source]
    source: DriverError,
  },

  #[error("provisioning requires a connected session, but the communicator is disabled")]
  NoSession,
}

/// Connection facts for the running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub container_id: String,
  /// Address resolved through the engine; may be empty for engines that
  /// never assign one.
  pub host: String,
  pub kind: CommunicatorKind,
  /// Mount point of the shared host directory inside the container.
  pub container_dir: String,
  pub exec_user: Option<String>,
  pub windows: bool,
  /// Uploaded files should be chowned to the container user.
  pub fix_upload_owner: bool,
}

#[async_trait]
pub trait Provisioner: Send + Sync {
  async fn provision(&self, driver: &dyn Driver, session: Option<&Session>) -> Result<(), ProvisionError>;

  /// Remove temporary access material. Runs whether or not provisioning
  /// succeeded.
  async fn cleanup(&self, _driver: &dyn Driver, _session: Option<&Session>) {}
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
  async fn provision(&self, _driver: &dyn Driver, _session: Option<&Session>) -> Result<(), ProvisionError> {
    Ok(())
  }
}

/// Runs each command in order, stopping at the first failure.
#[derive(Debug, Default, Clone)]
pub struct ExecProvisioner {
  commands: Vec<String>,
}

impl ExecProvisioner {
  pub fn new(commands: Vec<String>) -> Self {
    Self { commands }
  }

  pub fn commands(&self) -> &[String] {
    &self.commands
  }
}

#[async_trait]
impl Provisioner for ExecProvisioner {
  async fn provision(&self, driver: &dyn Driver, session: Option<&Session>) -> Result<(), ProvisionError> {
    if self.commands.is_empty() {
      return Ok(());
    }
    let session = session.ok_or(ProvisionError::NoSession)?;

    for (index, command) in self.commands.iter().enumerate() {
      info!(container = %session.container_id, index, command = %command, "provisioning");
      driver
        .exec(
          &session.container_id,
          session.exec_user.as_deref(),
          command,
          session.windows,
        )
        .await
        .map_err(|source| ProvisionError::Command {
          index,
          command: command.clone(),
          source,
        })?;
    }
    Ok(())
  }
}

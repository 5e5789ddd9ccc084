//! Container engine driver.
//!
//! The [`Driver`] trait turns builder-level intents (build, pull, commit,
//! export, tag, push, login) into engine invocations. Two implementations
//! exist:
//! - [`DockerDriver`]: shells out to the installed engine executable
//! - [`MockDriver`]: records every call for verification in tests

pub mod docker;
pub mod mock;
pub mod process;
pub mod template;
pub mod version;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWrite;

pub use docker::DockerDriver;
pub use mock::{MockCall, MockDriver};
pub use template::TemplateError;

/// Inspect template resolving the container's IP address.
pub const IP_ADDRESS_FORMAT: &str = "{{ .NetworkSettings.IPAddress }}";

/// Inspect template resolving an image's content hash (`sha256:...`).
pub const SHA256_FORMAT: &str = "{{ .Id }}";

/// Inspect template resolving an image's distribution digest (`repo@sha256:...`).
pub const DIGEST_FORMAT: &str = "{{ ( index .RepoDigests 0 ) }}";

/// Inspect template resolving the default CMD, or `[""]` when unset.
pub const CMD_FORMAT: &str = r#"{{if .Config.Cmd}} {{json .Config.Cmd}} {{else}} [""] {{end}}"#;

/// Inspect template resolving the default ENTRYPOINT, or `[""]` when unset.
pub const ENTRYPOINT_FORMAT: &str = r#"{{if .Config.Entrypoint}} {{json .Config.Entrypoint}} {{else}} [""] {{end}}"#;

/// Errors produced while driving the engine executable.
#[derive(Debug, Error)]
pub enum DriverError {
  /// The engine executable could not be located.
  #[error("{executable} executable not found; is it installed and on PATH?")]
  NotInstalled { executable: String },

  /// The process could not be started at all.
  #[error("failed to run `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  /// The engine exited with a non-zero status.
  #[error("`{command}` exited with code {code:?}\nstdout: {stdout}\nstderr: {stderr}")]
  CommandFailed {
    command: String,
    code: Option<i32>,
    stdout: String,
    stderr: String,
  },

  /// No recognizable version in the engine's self-reported version string.
  #[error("unknown engine version: {output}")]
  UnknownVersion { output: String },

  /// The image id side-channel file could not be read after a build.
  #[error("failed to read image id from {path}: {source}")]
  ImageIdFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Everything needed to launch the working container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
  /// Image reference substituted for `{{.Image}}` in `run_command`.
  pub image: String,
  pub run_command: Vec<String>,
  pub device: Vec<String>,
  pub cap_add: Vec<String>,
  pub cap_drop: Vec<String>,
  pub tmpfs: Vec<String>,
  /// Host path -> container path.
  pub volumes: BTreeMap<String, String>,
  pub privileged: bool,
  pub runtime: Option<String>,
  pub platform: Option<String>,
}

#[async_trait]
pub trait Driver: Send + Sync {
  /// Run an image build and return the produced image id.
  ///
  /// The id is read from a side-channel file; stdout and stderr are log text.
  async fn build(&self, args: &[String]) -> Result<String, DriverError>;

  async fn delete_image(&self, id: &str) -> Result<(), DriverError>;

  /// Commit a container to a new image and return the image id.
  async fn commit(&self, id: &str, author: &str, changes: &[String], message: &str) -> Result<String, DriverError>;

  /// Stream the container filesystem as an archive into `dst`.
  async fn export(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError>;

  /// Import a local archive as a new image and return the image id.
  async fn import_tarball(
    &self,
    path: &Path,
    changes: &[String],
    repo: &str,
    platform: Option<&str>,
  ) -> Result<String, DriverError>;

  /// Extract a single templated field from `inspect`.
  async fn inspect_field(&self, id: &str, template: &str) -> Result<String, DriverError>;

  async fn ip_address(&self, id: &str) -> Result<String, DriverError> {
    self.inspect_field(id, IP_ADDRESS_FORMAT).await
  }

  async fn sha256(&self, id: &str) -> Result<String, DriverError> {
    self.inspect_field(id, SHA256_FORMAT).await
  }

  async fn digest(&self, id: &str) -> Result<String, DriverError> {
    self.inspect_field(id, DIGEST_FORMAT).await
  }

  async fn cmd(&self, id: &str) -> Result<String, DriverError> {
    self.inspect_field(id, CMD_FORMAT).await
  }

  async fn entrypoint(&self, id: &str) -> Result<String, DriverError> {
    self.inspect_field(id, ENTRYPOINT_FORMAT).await
  }

  /// Open a registry session.
  ///
  /// A successful login holds the driver's session lock until the matching
  /// [`Driver::logout`]; callers must always log out after a successful login.
  async fn login(&self, registry: Option<&str>, username: &str, password: &str) -> Result<(), DriverError>;

  /// Close the registry session and release the session lock.
  async fn logout(&self, registry: Option<&str>) -> Result<(), DriverError>;

  async fn pull(&self, image: &str, platform: Option<&str>) -> Result<(), DriverError>;

  async fn push(&self, name: &str, platform: Option<&str>) -> Result<(), DriverError>;

  /// Stream an image as an archive into `dst`.
  async fn save_image(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError>;

  /// Launch the working container and return its id.
  async fn start_container(&self, config: &RunConfig) -> Result<String, DriverError>;

  async fn stop_container(&self, id: &str) -> Result<(), DriverError>;

  async fn kill_and_remove_container(&self, id: &str) -> Result<(), DriverError>;

  /// Tag an image. `force` is only honored on engines that still support it.
  async fn tag_image(&self, id: &str, repo: &str, force: bool) -> Result<(), DriverError>;

  /// Run a shell command inside a running container.
  async fn exec(&self, id: &str, user: Option<&str>, command: &str, windows: bool) -> Result<(), DriverError>;

  /// Fail fast if the engine executable cannot be located.
  async fn verify_installed(&self) -> Result<(), DriverError>;

  /// The engine's version, probed once and cached.
  async fn version(&self) -> Result<Version, DriverError>;
}

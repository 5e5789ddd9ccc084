//! Builder configuration.
//!
//! [`RawConfig`] is the user's intent as deserialized from a build file, with
//! `Option` fields wherever the presence of a key matters. [`prepare`]
//! validates it exactly once and produces a normalized [`LifecycleConfig`]
//! in which the terminal action is a single [`TerminalAction`] variant.

mod bootstrap;
pub mod file;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bootstrap::{BootstrapDescriptor, BootstrapError};
pub use file::{BuildFile, ConfigError};

use crate::consts::{
  DEFAULT_CONTAINER_DIR, DEFAULT_EXECUTABLE, DEFAULT_RUN_COMMAND, DEFAULT_WINDOWS_CONTAINER_DIR,
  DEFAULT_WINDOWS_RUN_COMMAND,
};
use crate::driver::{RunConfig, TemplateError, template};

/// AWS credentials forwarded to the credential provider for ECR logins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsAccess {
  pub aws_access_key: Option<String>,
  pub aws_secret_key: Option<String>,
  pub aws_token: Option<String>,
  pub aws_profile: Option<String>,
}

/// Registry session options shared by the builder and the push post-processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginOptions {
  pub login: bool,
  pub login_username: Option<String>,
  pub login_password: Option<String>,
  pub login_server: Option<String>,
  pub ecr_login: bool,
  #[serde(flatten)]
  pub aws: AwsAccess,
}

impl LoginOptions {
  /// Whether any registry session should be opened.
  pub fn requested(&self) -> bool {
    self.login || self.ecr_login
  }

  pub fn server(&self) -> Option<&str> {
    self.login_server.as_deref().filter(|s| !s.is_empty())
  }

  pub fn validate(&self) -> Option<ValidationError> {
    (self.ecr_login && self.server().is_none()).then_some(ValidationError::EcrLoginServerRequired)
  }
}

/// How provisioners reach the working container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicatorKind {
  Docker,
  DockerWindowsContainer,
  None,
}

impl fmt::Display for CommunicatorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      CommunicatorKind::Docker => "docker",
      CommunicatorKind::DockerWindowsContainer => "docker-windows-container",
      CommunicatorKind::None => "none",
    })
  }
}

/// Builder options as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
  pub image: Option<String>,
  pub build: Option<BootstrapDescriptor>,

  pub commit: bool,
  pub discard: bool,
  pub export_path: Option<PathBuf>,

  pub author: Option<String>,
  pub changes: Vec<String>,
  pub message: Option<String>,

  pub container_dir: Option<String>,
  pub device: Vec<String>,
  pub cap_add: Vec<String>,
  pub cap_drop: Vec<String>,
  pub tmpfs: Vec<String>,
  pub volumes: BTreeMap<String, String>,
  pub privileged: bool,
  pub runtime: Option<String>,
  pub platform: Option<String>,
  pub pull: Option<bool>,
  pub run_command: Vec<String>,

  pub docker_path: Option<String>,
  pub exec_user: Option<String>,
  pub fix_upload_owner: Option<bool>,
  pub windows_container: bool,
  pub communicator: Option<CommunicatorKind>,

  #[serde(flatten)]
  pub login: LoginOptions,

  /// Inline shell commands run inside the container after it starts.
  pub provision: Vec<String>,
}

/// What happens to the working container once provisioning succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalAction {
  Commit,
  Discard,
  Export(PathBuf),
}

impl fmt::Display for TerminalAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TerminalAction::Commit => f.write_str("commit"),
      TerminalAction::Discard => f.write_str("discard"),
      TerminalAction::Export(path) => write!(f, "export to {}", path.display()),
    }
  }
}

/// Validated builder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
  /// Base image reference; empty when a bootstrap build produces it.
  pub image: String,
  pub bootstrap: Option<BootstrapDescriptor>,
  pub terminal: TerminalAction,
  pub pull: bool,
  pub platform: Option<String>,

  pub executable: String,
  pub run_command: Vec<String>,
  pub container_dir: String,
  pub device: Vec<String>,
  pub cap_add: Vec<String>,
  pub cap_drop: Vec<String>,
  pub tmpfs: Vec<String>,
  pub volumes: BTreeMap<String, String>,
  pub privileged: bool,
  pub runtime: Option<String>,

  pub author: String,
  pub changes: Vec<String>,
  pub message: String,

  pub exec_user: Option<String>,
  pub fix_upload_owner: bool,
  pub windows_container: bool,
  pub communicator: CommunicatorKind,

  pub login: LoginOptions,
  pub provision: Vec<String>,
}

impl LifecycleConfig {
  /// Run configuration for the working container, mounting `host_dir` at
  /// the container directory.
  pub fn run_config(&self, image: &str, host_dir: Option<&Path>) -> RunConfig {
    let mut volumes = self.volumes.clone();
    if let Some(dir) = host_dir {
      volumes.insert(dir.display().to_string(), self.container_dir.clone());
    }

    RunConfig {
      image: image.to_string(),
      run_command: self.run_command.clone(),
      device: self.device.clone(),
      cap_add: self.cap_add.clone(),
      cap_drop: self.cap_drop.clone(),
      tmpfs: self.tmpfs.clone(),
      volumes,
      privileged: self.privileged,
      runtime: self.runtime.clone(),
      platform: self.platform.clone(),
    }
  }
}

#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("`image` cannot be specified with a build config")]
  ImageWithBootstrap,

  #[error("when running a bootstrap build, the `platform` option cannot be specified (use `build.platform` instead)")]
  PlatformWithBootstrap,

  #[error("missing 'image' attribute or 'build' section, either needs to be specified for a build to run")]
  MissingImage,

  #[error("cannot specify more than one of commit, discard, and export_path")]
  ArtifactUseConflict,

  #[error("no instructions given for handling the artifact; expected commit, discard, or export_path")]
  ArtifactNotUsed,

  #[error("export_path must be a file, not a directory")]
  ExportPathNotFile,

  #[error("ECR login requires login server to be provided")]
  EcrLoginServerRequired,

  #[error("build: {0}")]
  Bootstrap(#[from] BootstrapError),

  #[error("run_command: {0}")]
  RunCommand(#[from] TemplateError),
}

/// Every defect found in one validation pass.
#[derive(Debug, Default, Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
  pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} error(s) occurred:", self.0.len())?;
    for err in &self.0 {
      write!(f, "\n* {err}")?;
    }
    Ok(())
  }
}

/// Validation failed; `warnings` are still reported.
#[derive(Debug, Error)]
#[error("{errors}")]
pub struct PrepareError {
  pub errors: ValidationErrors,
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Prepared {
  pub config: LifecycleConfig,
  pub warnings: Vec<String>,
}

const PULL_IGNORED_WARNING: &str =
  "when running a bootstrap build, the `pull` option is ignored and is replaced by `build.pull` (true by default)";

/// Validate and normalize a raw configuration.
///
/// All checks run; every error is collected so one invocation reports every
/// defect.
pub fn prepare(raw: RawConfig) -> Result<Prepared, PrepareError> {
  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  let windows = raw.windows_container;

  let run_command = if raw.run_command.is_empty() {
    let defaults = if windows {
      DEFAULT_WINDOWS_RUN_COMMAND
    } else {
      DEFAULT_RUN_COMMAND
    };
    defaults.iter().map(|s| s.to_string()).collect()
  } else {
    raw.run_command
  };
  for arg in &run_command {
    if let Err(e) = template::validate(arg) {
      errors.push(ValidationError::RunCommand(e));
    }
  }

  let executable = raw
    .docker_path
    .filter(|p| !p.is_empty())
    .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string());

  let communicator = raw.communicator.unwrap_or(if windows {
    CommunicatorKind::DockerWindowsContainer
  } else {
    CommunicatorKind::Docker
  });

  let image = raw.image.unwrap_or_default();
  let mut platform = raw.platform.filter(|p| !p.is_empty());
  let pull;

  let bootstrap = match raw.build.filter(|b| !b.is_default()) {
    Some(mut desc) => {
      if let Err(e) = desc.prepare() {
        errors.push(ValidationError::Bootstrap(e));
      }
      if !image.is_empty() {
        errors.push(ValidationError::ImageWithBootstrap);
      }
      if raw.pull == Some(true) {
        warnings.push(PULL_IGNORED_WARNING.to_string());
      }
      pull = false;
      if platform.is_some() {
        errors.push(ValidationError::PlatformWithBootstrap);
      }
      platform = desc.platform.clone().filter(|p| !p.is_empty());
      Some(desc)
    }
    None => {
      pull = raw.pull.unwrap_or(true);
      if image.is_empty() {
        errors.push(ValidationError::MissingImage);
      }
      None
    }
  };

  let export_is_dir = raw.export_path.as_deref().is_some_and(Path::is_dir);
  let terminal = match terminal_action(raw.commit, raw.discard, raw.export_path) {
    Ok(action) => Some(action),
    Err(e) => {
      errors.push(e);
      None
    }
  };

  if export_is_dir {
    errors.push(ValidationError::ExportPathNotFile);
  }

  let container_dir = raw.container_dir.filter(|d| !d.is_empty()).unwrap_or_else(|| {
    if windows {
      DEFAULT_WINDOWS_CONTAINER_DIR.to_string()
    } else {
      DEFAULT_CONTAINER_DIR.to_string()
    }
  });

  if let Some(e) = raw.login.validate() {
    errors.push(e);
  }

  let terminal = match terminal {
    Some(terminal) if errors.is_empty() => terminal,
    _ => {
      return Err(PrepareError {
        errors: ValidationErrors(errors),
        warnings,
      });
    }
  };

  let config = LifecycleConfig {
    image,
    bootstrap,
    terminal,
    pull,
    platform,
    executable,
    run_command,
    container_dir,
    device: raw.device,
    cap_add: raw.cap_add,
    cap_drop: raw.cap_drop,
    tmpfs: raw.tmpfs,
    volumes: raw.volumes,
    privileged: raw.privileged,
    runtime: raw.runtime.filter(|r| !r.is_empty()),
    author: raw.author.unwrap_or_default(),
    changes: raw.changes,
    message: raw.message.unwrap_or_default(),
    exec_user: raw.exec_user.filter(|u| !u.is_empty()),
    fix_upload_owner: raw.fix_upload_owner.unwrap_or(true),
    windows_container: windows,
    communicator,
    login: raw.login,
    provision: raw.provision,
  };

  Ok(Prepared { config, warnings })
}

/// Reduce the three user-facing selectors to exactly one action.
fn terminal_action(commit: bool, discard: bool, export_path: Option<PathBuf>) -> Result<TerminalAction, ValidationError> {
  let export_path = export_path.filter(|p| !p.as_os_str().is_empty());
  match (commit, discard, export_path) {
    (true, false, None) => Ok(TerminalAction::Commit),
    (false, true, None) => Ok(TerminalAction::Discard),
    (false, false, Some(path)) => Ok(TerminalAction::Export(path)),
    (false, false, None) => Err(ValidationError::ArtifactNotUsed),
    _ => Err(ValidationError::ArtifactUseConflict),
  }
}

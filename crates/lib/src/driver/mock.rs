//! In-memory driver that records calls and returns canned results.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use semver::Version;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{Driver, DriverError, RunConfig};

/// One recorded driver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
  Build { args: Vec<String> },
  DeleteImage { id: String },
  Commit { id: String, author: String, changes: Vec<String>, message: String },
  Export { id: String },
  Import { path: PathBuf, changes: Vec<String>, repo: String, platform: Option<String> },
  Inspect { id: String, template: String },
  Login { registry: Option<String>, username: String, password: String },
  Logout { registry: Option<String> },
  Pull { image: String, platform: Option<String> },
  Push { name: String, platform: Option<String> },
  SaveImage { id: String },
  StartContainer { config: RunConfig },
  StopContainer { id: String },
  KillAndRemove { id: String },
  Tag { id: String, repo: String, force: bool },
  Exec { id: String, user: Option<String>, command: String, windows: bool },
  VerifyInstalled,
  Version,
}

/// A [`Driver`] for tests.
///
/// Each `*_error` field, when set, makes the corresponding operation fail
/// with that message. Inspect results are looked up by template; a template
/// without an entry fails. `hang_on` names an operation (`build`, `pull`,
/// `push`) that is recorded and then never completes.
pub struct MockDriver {
  pub build_image_id: String,
  pub commit_image_id: String,
  pub container_id: String,
  pub import_image_id: String,
  pub export_contents: Vec<u8>,
  pub save_contents: Vec<u8>,
  pub version: Version,
  pub inspect_results: HashMap<String, String>,

  pub build_error: Option<String>,
  pub commit_error: Option<String>,
  pub delete_error: Option<String>,
  pub export_error: Option<String>,
  pub import_error: Option<String>,
  pub login_error: Option<String>,
  pub logout_error: Option<String>,
  pub pull_error: Option<String>,
  pub push_error: Option<String>,
  pub save_error: Option<String>,
  pub start_error: Option<String>,
  pub stop_error: Option<String>,
  pub kill_error: Option<String>,
  pub tag_error: Option<String>,
  pub exec_error: Option<String>,
  pub verify_error: Option<String>,

  pub hang_on: Option<&'static str>,

  pub(crate) calls: Mutex<Vec<MockCall>>,
}

impl Default for MockDriver {
  fn default() -> Self {
    Self {
      build_image_id: "sha256:built".to_string(),
      commit_image_id: "sha256:committed".to_string(),
      container_id: "container-1".to_string(),
      import_image_id: "sha256:imported".to_string(),
      export_contents: b"exported-filesystem".to_vec(),
      save_contents: b"saved-image".to_vec(),
      version: Version::new(24, 0, 7),
      inspect_results: HashMap::new(),
      build_error: None,
      commit_error: None,
      delete_error: None,
      export_error: None,
      import_error: None,
      login_error: None,
      logout_error: None,
      pull_error: None,
      push_error: None,
      save_error: None,
      start_error: None,
      stop_error: None,
      kill_error: None,
      tag_error: None,
      exec_error: None,
      verify_error: None,
      hang_on: None,
      calls: Mutex::new(Vec::new()),
    }
  }
}

impl MockDriver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a canned `inspect` result for a template.
  pub fn with_inspect(mut self, template: &str, value: &str) -> Self {
    self.inspect_results.insert(template.to_string(), value.to_string());
    self
  }

  /// Snapshot of every call so far, in order.
  pub fn calls(&self) -> Vec<MockCall> {
    self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn called(&self, pred: impl Fn(&MockCall) -> bool) -> bool {
    self.calls().iter().any(pred)
  }

  fn record(&self, call: MockCall) {
    self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
  }

  async fn maybe_hang(&self, op: &str) {
    if self.hang_on == Some(op) {
      std::future::pending::<()>().await;
    }
  }
}

fn check(op: &str, error: &Option<String>) -> Result<(), DriverError> {
  match error {
    Some(message) => Err(DriverError::CommandFailed {
      command: format!("mock {op}"),
      code: Some(1),
      stdout: String::new(),
      stderr: message.clone(),
    }),
    None => Ok(()),
  }
}

#[async_trait]
impl Driver for MockDriver {
  async fn build(&self, args: &[String]) -> Result<String, DriverError> {
    self.record(MockCall::Build { args: args.to_vec() });
    self.maybe_hang("build").await;
    check("build", &self.build_error)?;
    Ok(self.build_image_id.clone())
  }

  async fn delete_image(&self, id: &str) -> Result<(), DriverError> {
    self.record(MockCall::DeleteImage { id: id.to_string() });
    check("rmi", &self.delete_error)
  }

  async fn commit(&self, id: &str, author: &str, changes: &[String], message: &str) -> Result<String, DriverError> {
    self.record(MockCall::Commit {
      id: id.to_string(),
      author: author.to_string(),
      changes: changes.to_vec(),
      message: message.to_string(),
    });
    check("commit", &self.commit_error)?;
    Ok(self.commit_image_id.clone())
  }

  async fn export(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError> {
    self.record(MockCall::Export { id: id.to_string() });
    check("export", &self.export_error)?;
    dst.write_all(&self.export_contents).await?;
    dst.flush().await?;
    Ok(())
  }

  async fn import_tarball(
    &self,
    path: &Path,
    changes: &[String],
    repo: &str,
    platform: Option<&str>,
  ) -> Result<String, DriverError> {
    self.record(MockCall::Import {
      path: path.to_path_buf(),
      changes: changes.to_vec(),
      repo: repo.to_string(),
      platform: platform.map(str::to_string),
    });
    check("import", &self.import_error)?;
    Ok(self.import_image_id.clone())
  }

  async fn inspect_field(&self, id: &str, template: &str) -> Result<String, DriverError> {
    self.record(MockCall::Inspect {
      id: id.to_string(),
      template: template.to_string(),
    });
    match self.inspect_results.get(template) {
      Some(value) => Ok(value.clone()),
      None => Err(DriverError::CommandFailed {
        command: "mock inspect".to_string(),
        code: Some(1),
        stdout: String::new(),
        stderr: format!("template: no value for {template}"),
      }),
    }
  }

  async fn login(&self, registry: Option<&str>, username: &str, password: &str) -> Result<(), DriverError> {
    self.record(MockCall::Login {
      registry: registry.map(str::to_string),
      username: username.to_string(),
      password: password.to_string(),
    });
    check("login", &self.login_error)
  }

  async fn logout(&self, registry: Option<&str>) -> Result<(), DriverError> {
    self.record(MockCall::Logout {
      registry: registry.map(str::to_string),
    });
    check("logout", &self.logout_error)
  }

  async fn pull(&self, image: &str, platform: Option<&str>) -> Result<(), DriverError> {
    self.record(MockCall::Pull {
      image: image.to_string(),
      platform: platform.map(str::to_string),
    });
    self.maybe_hang("pull").await;
    check("pull", &self.pull_error)
  }

  async fn push(&self, name: &str, platform: Option<&str>) -> Result<(), DriverError> {
    self.record(MockCall::Push {
      name: name.to_string(),
      platform: platform.map(str::to_string),
    });
    self.maybe_hang("push").await;
    check("push", &self.push_error)
  }

  async fn save_image(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError> {
    self.record(MockCall::SaveImage { id: id.to_string() });
    check("save", &self.save_error)?;
    dst.write_all(&self.save_contents).await?;
    dst.flush().await?;
    Ok(())
  }

  async fn start_container(&self, config: &RunConfig) -> Result<String, DriverError> {
    self.record(MockCall::StartContainer { config: config.clone() });
    check("run", &self.start_error)?;
    Ok(self.container_id.clone())
  }

  async fn stop_container(&self, id: &str) -> Result<(), DriverError> {
    self.record(MockCall::StopContainer { id: id.to_string() });
    check("stop", &self.stop_error)
  }

  async fn kill_and_remove_container(&self, id: &str) -> Result<(), DriverError> {
    self.record(MockCall::KillAndRemove { id: id.to_string() });
    check("kill", &self.kill_error)
  }

  async fn tag_image(&self, id: &str, repo: &str, force: bool) -> Result<(), DriverError> {
    self.record(MockCall::Tag {
      id: id.to_string(),
      repo: repo.to_string(),
      force,
    });
    check("tag", &self.tag_error)
  }

  async fn exec(&self, id: &str, user: Option<&str>, command: &str, windows: bool) -> Result<(), DriverError> {
    self.record(MockCall::Exec {
      id: id.to_string(),
      user: user.map(str::to_string),
      command: command.to_string(),
      windows,
    });
    check("exec", &self.exec_error)
  }

  async fn verify_installed(&self) -> Result<(), DriverError> {
    self.record(MockCall::VerifyInstalled);
    match &self.verify_error {
      Some(_) => Err(DriverError::NotInstalled {
        executable: "mock".to_string(),
      }),
      None => Ok(()),
    }
  }

  async fn version(&self) -> Result<Version, DriverError> {
    self.record(MockCall::Version);
    Ok(self.version.clone())
  }
}

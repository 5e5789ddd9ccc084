//! Driver implementation backed by the engine's command line.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use tokio::io::AsyncWrite;
use tokio::process::Command;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::process::{render_command, run_captured, run_streamed, run_to_sink};
use super::version::{parse_version, supports_force_tag, supports_password_stdin};
use super::{Driver, DriverError, RunConfig, template};
use crate::consts::DEFAULT_EXECUTABLE;

/// Drives an installed engine executable (`docker`, or a compatible CLI).
pub struct DockerDriver {
  executable: String,
  /// Isolated client configuration directory for registry operations.
  config_dir: Option<PathBuf>,
  version: OnceCell<Version>,
  session_lock: Arc<Mutex<()>>,
  session: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl Default for DockerDriver {
  fn default() -> Self {
    Self::new(DEFAULT_EXECUTABLE)
  }
}

impl DockerDriver {
  pub fn new(executable: impl Into<String>) -> Self {
    Self {
      executable: executable.into(),
      config_dir: None,
      version: OnceCell::new(),
      session_lock: Arc::new(Mutex::new(())),
      session: Mutex::new(None),
    }
  }

  pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.config_dir = Some(dir.into());
    self
  }

  pub fn executable(&self) -> &str {
    &self.executable
  }

  /// Arguments for registry-facing subcommands, prefixed with `--config` when set.
  fn with_config(&self, args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut all = Vec::new();
    if let Some(dir) = &self.config_dir {
      all.push("--config".to_string());
      all.push(dir.display().to_string());
    }
    all.extend(args);
    all
  }

  async fn probe_version(&self) -> Result<Version, DriverError> {
    let out = run_captured(&self.executable, &["-v".to_string()]).await?;
    let version = parse_version(&out.stdout)?;
    debug!(version = %version, "engine version detected");
    Ok(version)
  }
}

#[async_trait]
impl Driver for DockerDriver {
  async fn build(&self, args: &[String]) -> Result<String, DriverError> {
    let iid_file = tempfile::NamedTempFile::new()?;
    let iid_path = iid_file.path().to_path_buf();

    let mut all = vec![
      "build".to_string(),
      "--iidfile".to_string(),
      iid_path.display().to_string(),
    ];
    all.extend(args.iter().cloned());

    info!(args = ?all, "building image");
    run_captured(&self.executable, &all).await?;

    let image_id = tokio::fs::read_to_string(&iid_path)
      .await
      .map_err(|source| DriverError::ImageIdFile { path: iid_path, source })?;

    Ok(image_id.trim().to_string())
  }

  async fn delete_image(&self, id: &str) -> Result<(), DriverError> {
    info!(image = %id, "deleting image");
    run_captured(&self.executable, &["rmi".to_string(), id.to_string()]).await?;
    Ok(())
  }

  async fn commit(&self, id: &str, author: &str, changes: &[String], message: &str) -> Result<String, DriverError> {
    let args = commit_args(id, author, changes, message);
    info!(args = ?args, "committing container");
    let out = run_captured(&self.executable, &args).await?;
    Ok(out.stdout_trimmed())
  }

  async fn export(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError> {
    info!(container = %id, "exporting container");
    run_to_sink(&self.executable, &["export".to_string(), id.to_string()], dst).await?;
    Ok(())
  }

  async fn import_tarball(
    &self,
    path: &Path,
    changes: &[String],
    repo: &str,
    platform: Option<&str>,
  ) -> Result<String, DriverError> {
    let args = import_args(changes, repo, platform);
    let rendered = render_command(&self.executable, &args);
    info!(args = ?args, path = %path.display(), "importing tarball");

    let mut file = tokio::fs::File::open(path).await?;

    let mut child = Command::new(&self.executable)
      .args(&args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| DriverError::Spawn {
        command: rendered.clone(),
        source,
      })?;

    // Feed the archive on a separate task while the caller waits for the
    // child, so neither side blocks on a full pipe.
    let copier = child.stdin.take().map(|mut stdin| {
      tokio::spawn(async move {
        let copied = tokio::io::copy(&mut file, &mut stdin).await;
        drop(stdin);
        copied
      })
    });

    let output = child.wait_with_output().await?;

    let mut copy_error = None;
    if let Some(handle) = copier {
      match handle.await {
        Ok(Ok(bytes)) => debug!(bytes, "archive streamed to import"),
        Ok(Err(e)) => {
          warn!(path = %path.display(), error = %e, "archive copy ended early");
          copy_error = Some(e);
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "archive copy task failed");
          copy_error = Some(std::io::Error::other(e));
        }
      }
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
      return Err(DriverError::CommandFailed {
        command: rendered,
        code: output.status.code(),
        stdout,
        stderr,
      });
    }
    if let Some(e) = copy_error {
      return Err(DriverError::Io(e));
    }

    Ok(stdout.trim().to_string())
  }

  async fn inspect_field(&self, id: &str, template: &str) -> Result<String, DriverError> {
    let args = vec![
      "inspect".to_string(),
      "--format".to_string(),
      template.to_string(),
      id.to_string(),
    ];
    let out = run_captured(&self.executable, &args).await?;
    Ok(out.stdout_trimmed())
  }

  async fn login(&self, registry: Option<&str>, username: &str, password: &str) -> Result<(), DriverError> {
    // Held until the matching logout; dropped on any early return below.
    let guard = self.session_lock.clone().lock_owned().await;

    let version = self.version().await?;
    let (args, stdin) = login_args(&version, registry, username, password);

    run_streamed(&self.executable, &self.with_config(args), stdin.as_deref()).await?;

    *self.session.lock().await = Some(guard);
    Ok(())
  }

  async fn logout(&self, registry: Option<&str>) -> Result<(), DriverError> {
    let mut args = vec!["logout".to_string()];
    if let Some(registry) = registry.filter(|r| !r.is_empty()) {
      args.push(registry.to_string());
    }

    let result = run_streamed(&self.executable, &self.with_config(args), None).await;
    self.session.lock().await.take();
    result.map(|_| ())
  }

  async fn pull(&self, image: &str, platform: Option<&str>) -> Result<(), DriverError> {
    let mut args = vec!["pull".to_string(), image.to_string()];
    push_platform(&mut args, platform);
    run_streamed(&self.executable, &self.with_config(args), None).await?;
    Ok(())
  }

  async fn push(&self, name: &str, platform: Option<&str>) -> Result<(), DriverError> {
    let mut args = vec!["push".to_string(), name.to_string()];
    push_platform(&mut args, platform);
    run_streamed(&self.executable, &self.with_config(args), None).await?;
    Ok(())
  }

  async fn save_image(&self, id: &str, dst: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(), DriverError> {
    info!(image = %id, "saving image");
    run_to_sink(&self.executable, &["save".to_string(), id.to_string()], dst).await?;
    Ok(())
  }

  async fn start_container(&self, config: &RunConfig) -> Result<String, DriverError> {
    let args = run_args(config, home_dir().as_deref())?;
    info!(command = %render_command(&self.executable, &args), "starting container");

    let out = run_captured(&self.executable, &args).await?;
    // The container id is alone on stdout.
    Ok(out.stdout_trimmed())
  }

  async fn stop_container(&self, id: &str) -> Result<(), DriverError> {
    info!(container = %id, "stopping container");
    run_captured(&self.executable, &["stop".to_string(), id.to_string()]).await?;
    Ok(())
  }

  async fn kill_and_remove_container(&self, id: &str) -> Result<(), DriverError> {
    info!(container = %id, "killing container");
    run_captured(&self.executable, &["kill".to_string(), id.to_string()]).await?;
    run_captured(&self.executable, &["rm".to_string(), id.to_string()]).await?;
    Ok(())
  }

  async fn tag_image(&self, id: &str, repo: &str, force: bool) -> Result<(), DriverError> {
    let version = self.version().await?;
    let args = tag_args(&version, id, repo, force);
    info!(args = ?args, "tagging image");
    run_captured(&self.executable, &args).await?;
    Ok(())
  }

  async fn exec(&self, id: &str, user: Option<&str>, command: &str, windows: bool) -> Result<(), DriverError> {
    let args = exec_args(id, user, command, windows);
    run_streamed(&self.executable, &args, None).await?;
    Ok(())
  }

  async fn verify_installed(&self) -> Result<(), DriverError> {
    match find_executable(&self.executable) {
      Some(path) => {
        debug!(path = %path.display(), "engine executable found");
        Ok(())
      }
      None => Err(DriverError::NotInstalled {
        executable: self.executable.clone(),
      }),
    }
  }

  async fn version(&self) -> Result<Version, DriverError> {
    self.version.get_or_try_init(|| self.probe_version()).await.cloned()
  }
}

fn push_platform(args: &mut Vec<String>, platform: Option<&str>) {
  if let Some(platform) = platform.filter(|p| !p.is_empty()) {
    args.push("--platform".to_string());
    args.push(platform.to_string());
  }
}

fn commit_args(id: &str, author: &str, changes: &[String], message: &str) -> Vec<String> {
  let mut args = vec!["commit".to_string()];
  if !author.is_empty() {
    args.push("--author".to_string());
    args.push(author.to_string());
  }
  for change in changes {
    args.push("--change".to_string());
    args.push(change.clone());
  }
  if !message.is_empty() {
    args.push("--message".to_string());
    args.push(message.to_string());
  }
  args.push(id.to_string());
  args
}

fn import_args(changes: &[String], repo: &str, platform: Option<&str>) -> Vec<String> {
  let mut args = vec!["import".to_string()];
  for change in changes {
    args.push("--change".to_string());
    args.push(change.clone());
  }
  push_platform(&mut args, platform);
  args.push("-".to_string());
  args.push(repo.to_string());
  args
}

/// Build `login` arguments and the optional stdin payload.
///
/// The password is piped when the engine supports `--password-stdin`,
/// otherwise it falls back to `-p`.
fn login_args(version: &Version, registry: Option<&str>, username: &str, password: &str) -> (Vec<String>, Option<String>) {
  let mut args = vec!["login".to_string()];
  let mut stdin = None;

  if !username.is_empty() {
    args.push("-u".to_string());
    args.push(username.to_string());
  }

  if !password.is_empty() {
    if supports_password_stdin(version) {
      args.push("--password-stdin".to_string());
      stdin = Some(password.to_string());
    } else {
      args.push("-p".to_string());
      args.push(password.to_string());
    }
  }

  if let Some(registry) = registry.filter(|r| !r.is_empty()) {
    args.push(registry.to_string());
  }

  (args, stdin)
}

/// Build `tag` arguments, dropping `force` on engines that removed `-f`.
pub fn tag_args(version: &Version, id: &str, repo: &str, force: bool) -> Vec<String> {
  let mut args = vec!["tag".to_string()];

  if force {
    if supports_force_tag(version) {
      args.push("-f".to_string());
    } else {
      warn!(
        version = %version,
        "option \"force\" is ignored: it was removed from tag in engine 1.12.0"
      );
    }
  }

  args.push(id.to_string());
  args.push(repo.to_string());
  args
}

fn exec_args(id: &str, user: Option<&str>, command: &str, windows: bool) -> Vec<String> {
  let mut args = vec!["exec".to_string()];
  if let Some(user) = user.filter(|u| !u.is_empty()) {
    args.push("-u".to_string());
    args.push(user.to_string());
  }
  args.push(id.to_string());
  if windows {
    args.extend(["powershell".to_string(), "-Command".to_string()]);
  } else {
    args.extend(["/bin/sh".to_string(), "-c".to_string()]);
  }
  args.push(command.to_string());
  args
}

/// Build `run` arguments from a run configuration.
///
/// Host volume paths starting with `~/` are expanded against `home`.
pub fn run_args(config: &RunConfig, home: Option<&Path>) -> Result<Vec<String>, DriverError> {
  let mut args = vec!["run".to_string()];

  for device in &config.device {
    args.push("--device".to_string());
    args.push(device.clone());
  }
  for cap in &config.cap_add {
    args.push("--cap-add".to_string());
    args.push(cap.clone());
  }
  for cap in &config.cap_drop {
    args.push("--cap-drop".to_string());
    args.push(cap.clone());
  }
  if config.privileged {
    args.push("--privileged".to_string());
  }
  if let Some(runtime) = config.runtime.as_deref().filter(|r| !r.is_empty()) {
    args.push("--runtime".to_string());
    args.push(runtime.to_string());
  }
  push_platform(&mut args, config.platform.as_deref());
  for tmpfs in &config.tmpfs {
    args.push("--tmpfs".to_string());
    args.push(tmpfs.clone());
  }
  for (host, guest) in &config.volumes {
    args.push("-v".to_string());
    args.push(format!("{}:{}", expand_home(host, home), guest));
  }
  for arg in &config.run_command {
    args.push(template::render(arg, &config.image)?);
  }

  Ok(args)
}

fn expand_home(path: &str, home: Option<&Path>) -> String {
  match (path.strip_prefix("~/"), home) {
    (Some(rest), Some(home)) => home.join(rest).display().to_string(),
    (Some(_), None) => {
      warn!(path = %path, "home directory unknown; volume path left unexpanded");
      path.to_string()
    }
    (None, _) => path.to_string(),
  }
}

/// Returns the user's home directory
#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Locate an executable the way a shell would.
fn find_executable(executable: &str) -> Option<PathBuf> {
  let candidate = Path::new(executable);
  if candidate.components().count() > 1 {
    return is_executable(candidate).then(|| candidate.to_path_buf());
  }

  let path_var = std::env::var_os("PATH")?;
  std::env::split_paths(&path_var).find_map(|dir| {
    let full = dir.join(executable);
    if is_executable(&full) {
      return Some(full);
    }
    #[cfg(windows)]
    {
      let exe = dir.join(format!("{executable}.exe"));
      if is_executable(&exe) {
        return Some(exe);
      }
    }
    None
  })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  std::fs::metadata(path)
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

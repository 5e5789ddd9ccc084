//! Process execution helpers shared by driver implementations.
//!
//! Every helper logs the exact argument vector before spawning and folds the
//! captured stdout and stderr into [`DriverError::CommandFailed`].

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::DriverError;

const REDACTED: &str = "<redacted>";

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn stdout_trimmed(&self) -> String {
    self.stdout.trim().to_string()
  }
}

/// Render a program and its arguments for logs and error messages,
/// masking any password passed as an argument.
pub fn render_command(program: &str, args: &[String]) -> String {
  let mut parts = Vec::with_capacity(args.len() + 1);
  parts.push(program.to_string());

  let mut mask_next = false;
  for arg in args {
    if mask_next {
      parts.push(REDACTED.to_string());
      mask_next = false;
      continue;
    }
    if arg == "-p" || arg == "--password" {
      mask_next = true;
    }
    parts.push(arg.clone());
  }

  parts.join(" ")
}

fn command(program: &str, args: &[String]) -> Command {
  let mut cmd = Command::new(program);
  cmd.args(args).kill_on_drop(true);
  cmd
}

fn failure(rendered: String, code: Option<i32>, stdout: String, stderr: String) -> DriverError {
  DriverError::CommandFailed {
    command: rendered,
    code,
    stdout,
    stderr,
  }
}

/// Run a command to completion, capturing stdout and stderr.
pub async fn run_captured(program: &str, args: &[String]) -> Result<CommandOutput, DriverError> {
  run_captured_env(program, args, &[]).await
}

/// Like [`run_captured`], with extra environment variables for the child.
pub async fn run_captured_env(
  program: &str,
  args: &[String],
  env: &[(&str, &str)],
) -> Result<CommandOutput, DriverError> {
  let rendered = render_command(program, args);
  debug!(command = %rendered, "running");

  let output = command(program, args)
    .envs(env.iter().copied())
    .stdin(Stdio::null())
    .output()
    .await
    .map_err(|source| DriverError::Spawn {
      command: rendered.clone(),
      source,
    })?;

  let stdout = String::from_utf8_lossy(&output.stdout).to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).to_string();

  if !output.status.success() {
    return Err(failure(rendered, output.status.code(), stdout, stderr));
  }

  Ok(CommandOutput { stdout, stderr })
}

/// Run a command while forwarding every output line to the log as it arrives.
///
/// When `input` is given it is written to the child's stdin, which is then
/// closed.
pub async fn run_streamed(program: &str, args: &[String], input: Option<&str>) -> Result<CommandOutput, DriverError> {
  let rendered = render_command(program, args);
  info!(command = %rendered, "running");

  let mut child = command(program, args)
    .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .map_err(|source| DriverError::Spawn {
      command: rendered.clone(),
      source,
    })?;

  if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
    stdin.write_all(input.as_bytes()).await?;
    stdin.shutdown().await?;
  }

  let (stdout, stderr) = tokio::try_join!(
    forward_lines(child.stdout.take(), "stdout"),
    forward_lines(child.stderr.take(), "stderr"),
  )?;
  let status = child.wait().await?;

  if !status.success() {
    return Err(failure(rendered, status.code(), stdout, stderr));
  }

  Ok(CommandOutput { stdout, stderr })
}

/// Run a command whose stdout is an archive stream, copying it into `dst`.
pub async fn run_to_sink(
  program: &str,
  args: &[String],
  dst: &mut (dyn AsyncWrite + Unpin + Send),
) -> Result<u64, DriverError> {
  let rendered = render_command(program, args);
  info!(command = %rendered, "running");

  let mut child = command(program, args)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .map_err(|source| DriverError::Spawn {
      command: rendered.clone(),
      source,
    })?;

  let mut stdout = child.stdout.take();
  let mut stderr = child.stderr.take();

  let copy = async {
    match stdout.as_mut() {
      Some(out) => tokio::io::copy(out, &mut *dst).await,
      None => Ok(0),
    }
  };
  let collect = async {
    let mut buf = String::new();
    if let Some(err) = stderr.as_mut() {
      err.read_to_string(&mut buf).await?;
    }
    Ok::<_, std::io::Error>(buf)
  };

  let (written, stderr) = tokio::try_join!(copy, collect)?;
  let status = child.wait().await?;
  dst.flush().await?;

  if !status.success() {
    return Err(failure(rendered, status.code(), String::new(), stderr));
  }

  debug!(bytes = written, "archive stream complete");
  Ok(written)
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, stream: &'static str) -> std::io::Result<String> {
  let mut collected = String::new();
  let Some(reader) = reader else {
    return Ok(collected);
  };

  let mut lines = BufReader::new(reader).lines();
  while let Some(line) = lines.next_line().await? {
    info!(stream, "{}", line);
    collected.push_str(&line);
    collected.push('\n');
  }

  Ok(collected)
}

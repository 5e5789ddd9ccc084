//! Bootstrap build descriptor (`build` table).
//!
//! When any field is set, a base image is built from the referenced
//! Dockerfile before the working container starts, and the built image
//! replaces `image`.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
  #[error("failed to stat file {path:?}: {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("dockerfile {0:?} is not a regular file")]
  NotAFile(PathBuf),

  #[error("failed to compute absolute path for {path:?}: {source}")]
  Absolute {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to stat build directory {path:?}: {source}")]
  BuildDirStat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("specified build_dir {0:?} is not a directory")]
  NotADirectory(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapDescriptor {
  /// Dockerfile to build from.
  pub path: Option<PathBuf>,
  /// Build context directory, `.` when unset.
  pub build_dir: Option<PathBuf>,
  pub arguments: BTreeMap<String, String>,
  pub platform: Option<String>,
  /// Pull newer base layers before building. Only an explicit `false`
  /// disables it.
  pub pull: Option<bool>,
  pub compress: bool,
}

impl BootstrapDescriptor {
  /// True when no field carries a value, so no bootstrap build runs.
  pub fn is_default(&self) -> bool {
    self.path.as_ref().is_none_or(|p| p.as_os_str().is_empty())
      && self.build_dir.as_ref().is_none_or(|d| d.as_os_str().is_empty())
      && self.arguments.is_empty()
      && self.platform.as_deref().is_none_or(str::is_empty)
      && self.pull.is_none()
      && !self.compress
  }

  /// Validate the descriptor, rewriting `path` to an absolute path and
  /// defaulting `build_dir`. A default descriptor is left untouched.
  pub fn prepare(&mut self) -> Result<(), BootstrapError> {
    if self.is_default() {
      return Ok(());
    }

    let build_dir = self
      .build_dir
      .take()
      .filter(|d| !d.as_os_str().is_empty())
      .unwrap_or_else(|| PathBuf::from("."));
    self.build_dir = Some(build_dir.clone());

    let path = self.path.clone().unwrap_or_default();
    let meta = std::fs::metadata(&path).map_err(|source| BootstrapError::Stat {
      path: path.clone(),
      source,
    })?;
    if !meta.is_file() {
      return Err(BootstrapError::NotAFile(path));
    }

    let absolute = dunce::canonicalize(&path).map_err(|source| BootstrapError::Absolute {
      path: path.clone(),
      source,
    })?;
    self.path = Some(absolute);

    let meta = std::fs::metadata(&build_dir).map_err(|source| BootstrapError::BuildDirStat {
      path: build_dir.clone(),
      source,
    })?;
    if !meta.is_dir() {
      return Err(BootstrapError::NotADirectory(build_dir));
    }

    Ok(())
  }

  /// Arguments for the engine's `build` subcommand.
  pub fn build_args(&self) -> Vec<String> {
    let mut args = vec!["-f".to_string(), display(self.path.as_ref())];

    if let Some(platform) = self.platform.as_deref().filter(|p| !p.is_empty()) {
      args.push("--platform".to_string());
      args.push(platform.to_string());
    }
    if self.pull != Some(false) {
      args.push("--pull".to_string());
    }
    if self.compress {
      args.push("--compress".to_string());
    }
    for (key, value) in &self.arguments {
      args.push("--build-arg".to_string());
      args.push(format!("{key}={value}"));
    }

    args.push(match &self.build_dir {
      Some(dir) if !dir.as_os_str().is_empty() => dir.display().to_string(),
      _ => ".".to_string(),
    });
    args
  }
}

fn display(path: Option<&PathBuf>) -> String {
  path.map(|p| p.display().to_string()).unwrap_or_default()
}

//! Build file loading.
//!
//! A build file holds the builder options at its top level plus an ordered
//! `post_processors` list. TOML and JSON are supported, chosen by extension.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::RawConfig;
use crate::postprocess::PostProcessorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid TOML in {path}: {source}")]
  Toml {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid JSON in {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported build file extension for {0} (expected .toml or .json)")]
  UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildFile {
  #[serde(flatten)]
  pub builder: RawConfig,

  #[serde(default)]
  pub post_processors: Vec<PostProcessorConfig>,
}

impl BuildFile {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    debug!(path = %path.display(), format = ?ext, "loading build file");

    match ext.as_deref() {
      Some("toml") => Self::from_toml(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
      }),
      Some("json") => Self::from_json(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
      }),
      _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
  }

  pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }
}

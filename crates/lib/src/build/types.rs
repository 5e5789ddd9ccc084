//! Types shared by the build pipeline.
//!
//! [`BuildState`] carries every value exchanged between steps as a named,
//! typed field. [`GeneratedData`] is the closed set of provenance variables
//! exposed to provisioners and post-processors.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;

use crate::consts::{
  ERR_IMAGE_SHA256_NOT_FOUND, ERR_SOURCE_IMAGE_DIGEST_NOT_FOUND, ERR_SOURCE_IMAGE_SHA256_NOT_FOUND, KEY_IMAGE_SHA256,
  KEY_SOURCE_IMAGE_DIGEST, KEY_SOURCE_IMAGE_SHA256,
};
use crate::credentials::CredentialError;
use crate::driver::DriverError;
use crate::provision::{ProvisionError, Session};

/// Keys of [`GeneratedData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratedKey {
  ImageSha256,
  SourceImageDigest,
  SourceImageSha256,
}

impl GeneratedKey {
  pub const ALL: [GeneratedKey; 3] = [
    GeneratedKey::ImageSha256,
    GeneratedKey::SourceImageDigest,
    GeneratedKey::SourceImageSha256,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      GeneratedKey::ImageSha256 => KEY_IMAGE_SHA256,
      GeneratedKey::SourceImageDigest => KEY_SOURCE_IMAGE_DIGEST,
      GeneratedKey::SourceImageSha256 => KEY_SOURCE_IMAGE_SHA256,
    }
  }

  /// Placeholder bound before a real value is known.
  pub fn sentinel(self) -> &'static str {
    match self {
      GeneratedKey::ImageSha256 => ERR_IMAGE_SHA256_NOT_FOUND,
      GeneratedKey::SourceImageDigest => ERR_SOURCE_IMAGE_DIGEST_NOT_FOUND,
      GeneratedKey::SourceImageSha256 => ERR_SOURCE_IMAGE_SHA256_NOT_FOUND,
    }
  }
}

impl fmt::Display for GeneratedKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Provenance variables. Entries are replaced, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedData(BTreeMap<String, String>);

impl GeneratedData {
  /// Data with every key bound to its sentinel.
  pub fn seeded() -> Self {
    let mut data = Self::default();
    data.seed();
    data
  }

  pub fn seed(&mut self) {
    for key in GeneratedKey::ALL {
      self.put(key, key.sentinel());
    }
  }

  pub fn put(&mut self, key: GeneratedKey, value: impl Into<String>) {
    self.0.insert(key.as_str().to_string(), value.into());
  }

  pub fn get(&self, key: GeneratedKey) -> Option<&str> {
    self.0.get(key.as_str()).map(String::as_str)
  }

  /// Whether `key` holds a real value rather than its sentinel.
  pub fn is_known(&self, key: GeneratedKey) -> bool {
    self.get(key).is_some_and(|v| v != key.sentinel())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Mutable state threaded through every step.
#[derive(Debug, Default)]
pub struct BuildState {
  /// Image the working container runs; replaced by a bootstrap build.
  pub image: String,
  pub image_bootstrapped: bool,
  /// Host directory shared with the container.
  pub host_dir: Option<TempDir>,
  pub container_id: Option<String>,
  pub source_sha256: Option<String>,
  pub source_digest: Option<String>,
  /// Set only when the commit succeeded.
  pub image_id: Option<String>,
  /// Changes applied at commit, including restored CMD/ENTRYPOINT defaults.
  pub commit_changes: Vec<String>,
  pub session: Option<Session>,
  pub generated_data: GeneratedData,
  pub error: Option<BuildError>,
  pub cancelled: bool,
}

impl BuildState {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      ..Default::default()
    }
  }

  pub fn container_id(&self) -> Result<&str, BuildError> {
    self.container_id.as_deref().ok_or(BuildError::MissingState("container_id"))
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("engine not available: {0}")]
  Engine(#[source] DriverError),

  #[error("error building base image: {0}")]
  Bootstrap(#[source] DriverError),

  #[error(transparent)]
  Credentials(#[from] CredentialError),

  #[error("error pulling image {image}: {source}")]
  Pull {
    image: String,
    #[source]
    source: DriverError,
  },

  #[error("error running container: {0}")]
  StartContainer(#[source] DriverError),

  #[error("error resolving container address: {0}")]
  Connect(#[source] DriverError),

  #[error(transparent)]
  Provision(#[from] ProvisionError),

  #[error("error halting windows container for commit: {0}")]
  StopContainer(#[source] DriverError),

  #[error("error committing container: {0}")]
  Commit(#[source] DriverError),

  #[error("error creating export file {path}: {source}")]
  ExportFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("error exporting container: {0}")]
  Export(#[source] DriverError),

  #[error("error creating temporary directory: {0}")]
  TempDir(#[source] io::Error),

  #[error("missing {0} in build state")]
  MissingState(&'static str),
}

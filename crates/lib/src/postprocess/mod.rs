//! Post-processors applied to a finished artifact.
//!
//! Each post-processor consumes the previous artifact and yields the next:
//! - `tag`: point repository tags at a built image
//! - `push`: push an image (or each of its tags) to a registry
//! - `import`: turn an exported archive into an image
//! - `save`: write an image to an archive

mod import;
mod push;
mod save;
mod tag;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::artifact::Artifact;
use crate::credentials::{CredentialError, CredentialProvider};
use crate::driver::{Driver, DriverError};

pub use import::ImportConfig;
pub use push::PushConfig;
pub use save::SaveConfig;
pub use tag::TagConfig;

#[derive(Debug, Error)]
pub enum PostProcessError {
  #[error("unknown artifact type: {builder_id}; {name} can only process {expected} artifacts")]
  UnsupportedArtifact {
    name: &'static str,
    builder_id: String,
    expected: &'static str,
  },

  #[error("{name}: {message}")]
  InvalidConfig { name: &'static str, message: String },

  #[error("error tagging image as {repository}: {source}")]
  Tag {
    repository: String,
    #[source]
    source: DriverError,
  },

  #[error("error pushing {name}: {source}")]
  Push {
    name: String,
    #[source]
    source: DriverError,
  },

  #[error("error importing {path}: {source}")]
  Import {
    path: PathBuf,
    #[source]
    source: DriverError,
  },

  #[error("error creating {path}: {source}")]
  SaveFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("error saving image {id}: {source}")]
  Save {
    id: String,
    #[source]
    source: DriverError,
  },

  #[error(transparent)]
  Credentials(#[from] CredentialError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostProcessorConfig {
  Tag(TagConfig),
  Push(PushConfig),
  Import(ImportConfig),
  Save(SaveConfig),
}

impl PostProcessorConfig {
  pub fn name(&self) -> &'static str {
    match self {
      PostProcessorConfig::Tag(_) => "tag",
      PostProcessorConfig::Push(_) => "push",
      PostProcessorConfig::Import(_) => "import",
      PostProcessorConfig::Save(_) => "save",
    }
  }

  /// Configuration problems detectable before any build runs.
  pub fn validate(&self) -> Result<Vec<String>, PostProcessError> {
    match self {
      PostProcessorConfig::Tag(c) => c.validate(),
      PostProcessorConfig::Push(c) => c.validate().map(|_| Vec::new()),
      PostProcessorConfig::Import(c) => c.validate().map(|_| Vec::new()),
      PostProcessorConfig::Save(c) => c.validate().map(|_| Vec::new()),
    }
  }

  pub async fn apply(
    &self,
    driver: &dyn Driver,
    credentials: &dyn CredentialProvider,
    artifact: Artifact,
  ) -> Result<Artifact, PostProcessError> {
    info!(post_processor = self.name(), artifact = %artifact.id(), "running post-processor");
    match self {
      PostProcessorConfig::Tag(c) => c.apply(driver, artifact).await,
      PostProcessorConfig::Push(c) => c.apply(driver, credentials, artifact).await,
      PostProcessorConfig::Import(c) => c.apply(driver, artifact).await,
      PostProcessorConfig::Save(c) => c.apply(driver, artifact).await,
    }
  }
}

fn unsupported(name: &'static str, artifact: &Artifact, expected: &'static str) -> PostProcessError {
  PostProcessError::UnsupportedArtifact {
    name,
    builder_id: artifact.builder_id().to_string(),
    expected,
  }
}

fn invalid(name: &'static str, message: impl Into<String>) -> PostProcessError {
  PostProcessError::InvalidConfig {
    name,
    message: message.into(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_tagged_list() {
    let configs: Vec<PostProcessorConfig> = serde_json::from_str(
      r#"[
        {"type": "import", "repository": "example/app", "tag": "1.0"},
        {"type": "tag", "repository": "example/app", "tags": ["latest"], "force": true},
        {"type": "push", "login": true, "login_server": "registry.example.com"},
        {"type": "save", "path": "app.tar"}
      ]"#,
    )
    .unwrap();

    let names: Vec<_> = configs.iter().map(PostProcessorConfig::name).collect();
    assert_eq!(names, vec!["import", "tag", "push", "save"]);
    match &configs[2] {
      PostProcessorConfig::Push(push) => assert!(push.login.login),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn rejects_unknown_type() {
    let result: Result<PostProcessorConfig, _> = serde_json::from_str(r#"{"type": "compress"}"#);
    assert!(result.is_err());
  }
}

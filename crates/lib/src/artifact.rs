//! Build artifacts.
//!
//! A build ends in either an image (committed, imported, or tagged) or an
//! archive on disk. Both carry the generated provenance data.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::build::{GeneratedData, GeneratedKey};
use crate::consts::{ENGINE_FAMILY, REGISTRY_IMAGE_STATE};
use crate::driver::{Driver, DriverError};

/// State query name for the tag list of an image artifact.
pub const TAGS_STATE: &str = "docker_tags";

/// State query name for the generated provenance data.
pub const GENERATED_DATA_STATE: &str = "generated_data";

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("failed to delete image {id}: {source}")]
  DeleteImage {
    id: String,
    #[source]
    source: DriverError,
  },

  #[error("failed to delete {path}: {source}")]
  DeleteFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageArtifact {
  pub id: String,
  pub builder_id: String,
  pub tags: Vec<String>,
  pub generated_data: GeneratedData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
  pub path: PathBuf,
  pub builder_id: String,
  pub generated_data: GeneratedData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
  Image(ImageArtifact),
  Export(ExportArtifact),
}

/// Registry-facing description of an image artifact.
///
/// The primary identifier is the image content hash, never a mutable
/// `repo:tag` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryImage {
  pub image_id: String,
  pub provider_name: String,
  pub provider_region: String,
  pub source_image_id: Option<String>,
  pub labels: BTreeMap<String, String>,
}

/// Answer to a named state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
  RegistryImage(RegistryImage),
  GeneratedData(GeneratedData),
  Tags(Vec<String>),
}

impl Artifact {
  pub fn id(&self) -> String {
    match self {
      Artifact::Image(image) => image.id.clone(),
      Artifact::Export(export) => export.path.display().to_string(),
    }
  }

  pub fn builder_id(&self) -> &str {
    match self {
      Artifact::Image(image) => &image.builder_id,
      Artifact::Export(export) => &export.builder_id,
    }
  }

  pub fn files(&self) -> Vec<PathBuf> {
    match self {
      Artifact::Image(_) => Vec::new(),
      Artifact::Export(export) => vec![export.path.clone()],
    }
  }

  pub fn generated_data(&self) -> &GeneratedData {
    match self {
      Artifact::Image(image) => &image.generated_data,
      Artifact::Export(export) => &export.generated_data,
    }
  }

  pub fn state(&self, name: &str) -> Option<StateValue> {
    match (name, self) {
      (REGISTRY_IMAGE_STATE, Artifact::Image(image)) => Some(StateValue::RegistryImage(image.registry_image())),
      (GENERATED_DATA_STATE, _) => Some(StateValue::GeneratedData(self.generated_data().clone())),
      (TAGS_STATE, Artifact::Image(image)) if !image.tags.is_empty() => Some(StateValue::Tags(image.tags.clone())),
      _ => None,
    }
  }

  /// Delete what the artifact refers to.
  pub async fn destroy(&self, driver: &dyn Driver) -> Result<(), ArtifactError> {
    match self {
      Artifact::Image(image) => {
        info!(image = %image.id, "deleting image");
        driver
          .delete_image(&image.id)
          .await
          .map_err(|source| ArtifactError::DeleteImage {
            id: image.id.clone(),
            source,
          })
      }
      Artifact::Export(export) => {
        info!(path = %export.path.display(), "deleting archive");
        tokio::fs::remove_file(&export.path)
          .await
          .map_err(|source| ArtifactError::DeleteFile {
            path: export.path.clone(),
            source,
          })
      }
    }
  }
}

impl ImageArtifact {
  pub fn registry_image(&self) -> RegistryImage {
    let mut labels = BTreeMap::new();
    if !self.tags.is_empty() {
      labels.insert("tags".to_string(), self.tags.join(","));
    }

    let data = &self.generated_data;
    let mut image_id = self.id.clone();
    let mut source_image_id = None;

    if !data.is_empty() {
      for key in [GeneratedKey::SourceImageDigest, GeneratedKey::ImageSha256] {
        if let Some(value) = data.get(key) {
          labels.insert(key.as_str().to_string(), value.to_string());
        }
      }
      labels.insert("ArtifactID".to_string(), self.id.clone());
      source_image_id = data.get(GeneratedKey::SourceImageSha256).map(str::to_string);
      if let Some(sha) = data.get(GeneratedKey::ImageSha256) {
        image_id = sha.to_string();
      }
    }

    RegistryImage {
      image_id,
      provider_name: ENGINE_FAMILY.to_string(),
      provider_region: ENGINE_FAMILY.to_string(),
      source_image_id,
      labels,
    }
  }
}

impl fmt::Display for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Artifact::Image(image) if !image.tags.is_empty() => {
        write!(f, "Imported image: {} with tags {}", image.id, image.tags.join(" "))
      }
      Artifact::Image(image) => write!(f, "Imported image: {}", image.id),
      Artifact::Export(export) => write!(f, "Exported image: {}", export.path.display()),
    }
  }
}

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PostProcessError, invalid, unsupported};
use crate::artifact::{Artifact, ImageArtifact};
use crate::consts::{BUILDER_ID_IMPORT, BUILDER_ID_TAG};
use crate::driver::Driver;

const NAME: &str = "tag";

const DEPRECATED_TAG: &str = "\"tag\" option has been replaced with \"tags\" and may stop working in a future version";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
  pub repository: String,
  pub tags: Vec<String>,
  /// Deprecated alias of `tags`.
  pub tag: Vec<String>,
  pub force: bool,
}

impl TagConfig {
  /// Every tag to apply, `tags` first.
  pub fn all_tags(&self) -> Vec<String> {
    self.tags.iter().chain(self.tag.iter()).cloned().collect()
  }

  pub fn validate(&self) -> Result<Vec<String>, PostProcessError> {
    if self.repository.is_empty() {
      return Err(invalid(NAME, "repository must be set"));
    }
    let mut warnings = Vec::new();
    if !self.tag.is_empty() {
      warnings.push(DEPRECATED_TAG.to_string());
    }
    Ok(warnings)
  }

  pub async fn apply(&self, driver: &dyn Driver, artifact: Artifact) -> Result<Artifact, PostProcessError> {
    if !self.tag.is_empty() {
      warn!("deprecation warning: {DEPRECATED_TAG}");
    }

    let image = match artifact {
      Artifact::Image(image) if image.builder_id == BUILDER_ID_IMPORT || image.builder_id == BUILDER_ID_TAG => image,
      other => return Err(unsupported(NAME, &other, "image")),
    };

    let repo = &self.repository;
    let references: Vec<String> = match self.all_tags() {
      tags if tags.is_empty() => vec![repo.clone()],
      tags => tags.iter().map(|t| format!("{repo}:{t}")).collect(),
    };

    for reference in &references {
      info!(image = %image.id, repository = %reference, "tagging image");
      driver
        .tag_image(&image.id, reference, self.force)
        .await
        .map_err(|source| PostProcessError::Tag {
          repository: reference.clone(),
          source,
        })?;
    }

    let tagged = !self.all_tags().is_empty();
    let id = references.last().cloned().unwrap_or_else(|| repo.clone());

    Ok(Artifact::Image(ImageArtifact {
      id,
      builder_id: BUILDER_ID_TAG.to_string(),
      tags: if tagged { references } else { Vec::new() },
      generated_data: image.generated_data,
    }))
  }
}

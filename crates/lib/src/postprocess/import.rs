use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PostProcessError, invalid, unsupported};
use crate::artifact::{Artifact, ImageArtifact};
use crate::consts::{BUILDER_ID, BUILDER_ID_IMPORT};
use crate::driver::Driver;

const NAME: &str = "import";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
  pub repository: String,
  pub tag: Option<String>,
  pub changes: Vec<String>,
  pub platform: Option<String>,
}

impl ImportConfig {
  /// `repository[:tag]`
  pub fn reference(&self) -> String {
    match self.tag.as_deref().filter(|t| !t.is_empty()) {
      Some(tag) => format!("{}:{tag}", self.repository),
      None => self.repository.clone(),
    }
  }

  pub fn validate(&self) -> Result<(), PostProcessError> {
    if self.repository.is_empty() {
      return Err(invalid(NAME, "repository must be set"));
    }
    Ok(())
  }

  pub async fn apply(&self, driver: &dyn Driver, artifact: Artifact) -> Result<Artifact, PostProcessError> {
    let export = match artifact {
      Artifact::Export(export) if export.builder_id == BUILDER_ID => export,
      other => return Err(unsupported(NAME, &other, "exported")),
    };

    let reference = self.reference();
    info!(path = %export.path.display(), repository = %reference, "importing archive");
    let id = driver
      .import_tarball(&export.path, &self.changes, &reference, self.platform.as_deref())
      .await
      .map_err(|source| PostProcessError::Import {
        path: export.path.clone(),
        source,
      })?;
    info!(image = %id, "imported image");

    Ok(Artifact::Image(ImageArtifact {
      id,
      builder_id: BUILDER_ID_IMPORT.to_string(),
      tags: Vec::new(),
      generated_data: export.generated_data,
    }))
  }
}

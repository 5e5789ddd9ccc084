use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{PostProcessError, invalid, unsupported};
use crate::artifact::{Artifact, ExportArtifact};
use crate::consts::{BUILDER_ID_IMPORT, BUILDER_ID_SAVE, BUILDER_ID_TAG};
use crate::driver::Driver;

const NAME: &str = "save";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
  pub path: PathBuf,
}

impl SaveConfig {
  pub fn validate(&self) -> Result<(), PostProcessError> {
    if self.path.as_os_str().is_empty() {
      return Err(invalid(NAME, "path must be set"));
    }
    Ok(())
  }

  pub async fn apply(&self, driver: &dyn Driver, artifact: Artifact) -> Result<Artifact, PostProcessError> {
    let image = match artifact {
      Artifact::Image(image) if image.builder_id == BUILDER_ID_IMPORT || image.builder_id == BUILDER_ID_TAG => image,
      other => return Err(unsupported(NAME, &other, "image")),
    };

    let path = &self.path;
    let mut file = File::create(path).await.map_err(|source| PostProcessError::SaveFile {
      path: path.clone(),
      source,
    })?;

    info!(image = %image.id, path = %path.display(), "saving image");
    let saved = match driver.save_image(&image.id, &mut file).await {
      Ok(()) => file.flush().await.map_err(|source| PostProcessError::SaveFile {
        path: path.clone(),
        source,
      }),
      Err(source) => Err(PostProcessError::Save {
        id: image.id.clone(),
        source,
      }),
    };

    if saved.is_err() {
      drop(file);
      if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove partial archive");
      }
    }
    saved?;

    Ok(Artifact::Export(ExportArtifact {
      path: path.clone(),
      builder_id: BUILDER_ID_SAVE.to_string(),
      generated_data: image.generated_data,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::ImageArtifact;
  use crate::build::GeneratedData;
  use crate::driver::{MockCall, MockDriver};
  use tempfile::TempDir;

  fn tagged() -> Artifact {
    Artifact::Image(ImageArtifact {
      id: "example/app:latest".to_string(),
      builder_id: BUILDER_ID_TAG.to_string(),
      tags: vec!["example/app:latest".to_string()],
      generated_data: GeneratedData::seeded(),
    })
  }

  #[tokio::test]
  async fn writes_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.tar");
    let driver = MockDriver::new();

    let result = SaveConfig { path: path.clone() }.apply(&driver, tagged()).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"saved-image");
    assert_eq!(result.builder_id(), BUILDER_ID_SAVE);
    assert_eq!(result.files(), vec![path]);
    assert_eq!(
      driver.calls(),
      vec![MockCall::SaveImage {
        id: "example/app:latest".to_string()
      }]
    );
  }

  #[tokio::test]
  async fn failed_save_removes_partial_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.tar");
    let driver = MockDriver {
      save_error: Some("no such image".to_string()),
      ..Default::default()
    };

    let err = SaveConfig { path: path.clone() }.apply(&driver, tagged()).await.unwrap_err();
    assert!(matches!(err, PostProcessError::Save { .. }));
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn unwritable_path_fails_before_saving() {
    let temp = TempDir::new().unwrap();
    let driver = MockDriver::new();
    let config = SaveConfig {
      path: temp.path().join("missing").join("app.tar"),
    };

    let err = config.apply(&driver, tagged()).await.unwrap_err();
    assert!(matches!(err, PostProcessError::SaveFile { .. }));
    assert!(driver.calls().is_empty());
  }

  #[test]
  fn path_is_required() {
    assert!(SaveConfig::default().validate().is_err());
  }
}

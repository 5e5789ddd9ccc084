use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PostProcessError, invalid, unsupported};
use crate::artifact::Artifact;
use crate::build::GeneratedKey;
use crate::config::LoginOptions;
use crate::credentials::{CredentialProvider, RegistrySession};
use crate::driver::Driver;

const NAME: &str = "push";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
  pub platform: Option<String>,
  #[serde(flatten)]
  pub login: LoginOptions,
}

impl PushConfig {
  pub fn validate(&self) -> Result<(), PostProcessError> {
    match self.login.validate() {
      Some(e) => Err(invalid(NAME, e.to_string())),
      None => Ok(()),
    }
  }

  /// Push every tag of the image, or its id when it has none. The registry
  /// digest of the last pushed name is recorded as the source image digest.
  pub async fn apply(
    &self,
    driver: &dyn Driver,
    credentials: &dyn CredentialProvider,
    artifact: Artifact,
  ) -> Result<Artifact, PostProcessError> {
    let mut image = match artifact {
      Artifact::Image(image) => image,
      other => return Err(unsupported(NAME, &other, "image")),
    };

    let names = if image.tags.is_empty() {
      vec![image.id.clone()]
    } else {
      image.tags.clone()
    };

    let session = RegistrySession::open(driver, &self.login, credentials).await?;
    let result = push_all(driver, &names, self.platform.as_deref()).await;
    if let Some(session) = session {
      session.close(driver).await;
    }

    if let Some(digest) = result? {
      image.generated_data.put(GeneratedKey::SourceImageDigest, digest);
    }
    Ok(Artifact::Image(image))
  }
}

async fn push_all(
  driver: &dyn Driver,
  names: &[String],
  platform: Option<&str>,
) -> Result<Option<String>, PostProcessError> {
  let mut digest = None;
  for name in names {
    info!(name = %name, "pushing");
    driver
      .push(name, platform)
      .await
      .map_err(|source| PostProcessError::Push {
        name: name.clone(),
        source,
      })?;

    match driver.digest(name).await {
      Ok(value) => digest = Some(value),
      Err(e) => warn!(name = %name, error = %e, "Unable to determine digest for source image, ignoring it for now"),
    }
  }
  Ok(digest)
}

//! Builder output flowing through a post-processor chain.

use dockbuild_lib::artifact::{Artifact, StateValue, TAGS_STATE};
use dockbuild_lib::build::{BuildOutcome, GeneratedKey};
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::config::file::BuildFile;
use dockbuild_lib::consts::{BUILDER_ID_SAVE, BUILDER_ID_TAG, REGISTRY_IMAGE_STATE};
use dockbuild_lib::credentials::StaticCredentials;
use dockbuild_lib::driver::{MockCall, MockDriver};
use dockbuild_lib::postprocess::PostProcessorConfig;
use tempfile::TempDir;

use super::common::{call_names, engine, image, run};

async fn chain(driver: &MockDriver, chain: &[PostProcessorConfig], artifact: Artifact) -> Artifact {
  let credentials = StaticCredentials::new("AWS", "token");
  let mut artifact = artifact;
  for pp in chain {
    artifact = pp.apply(driver, &credentials, artifact).await.unwrap();
  }
  artifact
}

async fn committed(driver: &MockDriver) -> Artifact {
  let outcome = run(
    RawConfig {
      commit: true,
      ..image("alpine")
    },
    driver,
  )
  .await
  .unwrap();
  match outcome {
    BuildOutcome::Artifact(artifact) => artifact,
    other => panic!("expected an artifact, got {other:?}"),
  }
}

#[tokio::test]
async fn tag_then_push_then_save() {
  let temp = TempDir::new().unwrap();
  let archive = temp.path().join("app.tar");
  let file = BuildFile::from_toml(&format!(
    r#"
image = "alpine"
commit = true

[[post_processors]]
type = "tag"
repository = "registry.example.com/app"
tags = ["1.0", "latest"]

[[post_processors]]
type = "push"

[[post_processors]]
type = "save"
path = "{}"
"#,
    archive.display().to_string().replace('\\', "/")
  ))
  .unwrap();

  let driver = engine();
  let artifact = committed(&driver).await;
  let tagged = chain(&driver, &file.post_processors[..1], artifact).await;

  assert_eq!(tagged.builder_id(), BUILDER_ID_TAG);
  assert_eq!(tagged.id(), "registry.example.com/app:latest");
  assert_eq!(
    tagged.state(TAGS_STATE),
    Some(StateValue::Tags(vec![
      "registry.example.com/app:1.0".to_string(),
      "registry.example.com/app:latest".to_string()
    ]))
  );
  let Some(StateValue::RegistryImage(meta)) = tagged.state(REGISTRY_IMAGE_STATE) else {
    panic!("tagged image exposes registry metadata");
  };
  assert_eq!(meta.image_id, "sha256:content");

  let saved = chain(&driver, &file.post_processors[1..], tagged).await;
  assert_eq!(saved.builder_id(), BUILDER_ID_SAVE);
  assert_eq!(std::fs::read(&archive).unwrap(), b"saved-image");
  assert_eq!(saved.generated_data().get(GeneratedKey::ImageSha256), Some("sha256:content"));

  let pushed: Vec<String> = driver
    .calls()
    .into_iter()
    .filter_map(|c| match c {
      MockCall::Push { name, .. } => Some(name),
      _ => None,
    })
    .collect();
  assert_eq!(pushed, vec!["registry.example.com/app:1.0", "registry.example.com/app:latest"]);
  assert_eq!(call_names(&driver).last(), Some(&"save"));
}

#[tokio::test]
async fn exported_archive_can_be_imported() {
  let temp = TempDir::new().unwrap();
  let driver = engine();
  let outcome = run(
    RawConfig {
      export_path: Some(temp.path().join("rootfs.tar")),
      ..image("alpine")
    },
    &driver,
  )
  .await
  .unwrap();
  let BuildOutcome::Artifact(artifact) = outcome else {
    panic!("expected an artifact");
  };

  let import: PostProcessorConfig =
    serde_json::from_str(r#"{"type": "import", "repository": "example/rootfs", "tag": "v1"}"#).unwrap();
  let imported = chain(&driver, &[import], artifact).await;

  assert_eq!(imported.id(), "sha256:imported");
  assert!(driver.called(|c| matches!(c, MockCall::Import { repo, .. } if repo == "example/rootfs:v1")));
}

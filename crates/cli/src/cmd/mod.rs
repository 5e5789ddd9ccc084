mod build;
mod info;
mod validate;

pub use build::cmd_build;
pub use info::cmd_info;
pub use validate::cmd_validate;

use std::path::Path;

use anyhow::{Context, Result};
use dockbuild_lib::config::file::BuildFile;

use crate::EngineOptions;

/// Load a build file and apply command line overrides.
fn load_build_file(path: &Path, engine: &EngineOptions) -> Result<BuildFile> {
  let mut file = BuildFile::load(path).with_context(|| format!("Failed to load build file: {}", path.display()))?;
  if let Some(docker_path) = &engine.docker_path {
    file.builder.docker_path = Some(docker_path.clone());
  }
  Ok(file)
}

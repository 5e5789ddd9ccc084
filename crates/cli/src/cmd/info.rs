use std::process::ExitCode;

use anyhow::{Context, Result};

use dockbuild_lib::consts::{APP_NAME, DEFAULT_EXECUTABLE};
use dockbuild_lib::driver::{DockerDriver, Driver};

use crate::EngineOptions;
use crate::output::{print_stat, print_success};

pub fn cmd_info(engine: &EngineOptions) -> Result<ExitCode> {
  let executable = engine.docker_path.as_deref().unwrap_or(DEFAULT_EXECUTABLE);
  let mut driver = DockerDriver::new(executable);
  if let Some(dir) = &engine.config_dir {
    driver = driver.with_config_dir(dir);
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let version = rt.block_on(async {
    driver.verify_installed().await?;
    driver.version().await
  })?;

  print_success(&format!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION")));
  print_stat("Engine", driver.executable());
  print_stat("Engine version", &version.to_string());
  if let Some(dir) = &engine.config_dir {
    print_stat("Client config", &dir.display().to_string());
  }
  Ok(ExitCode::SUCCESS)
}

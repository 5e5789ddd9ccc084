//! Implementation of the `dockbuild build` command.
//!
//! Validates the build file, runs the build pipeline against the installed
//! engine, then applies each post-processor to the resulting artifact in
//! order. Ctrl-C cancels the running step; cleanup still runs.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dockbuild_lib::artifact::Artifact;
use dockbuild_lib::build::{BuildOutcome, Builder, GeneratedData};
use dockbuild_lib::credentials::AwsCliCredentials;
use dockbuild_lib::driver::DockerDriver;
use dockbuild_lib::postprocess::PostProcessorConfig;
use dockbuild_lib::provision::ExecProvisioner;

use super::load_build_file;
use crate::EngineOptions;
use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, print_warning};

/// Conventional exit status for a process interrupted by SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[derive(Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum BuildReport<'a> {
  Artifact { artifact: &'a Artifact },
  Discarded { generated_data: &'a GeneratedData },
}

pub fn cmd_build(path: &Path, engine: &EngineOptions, format: OutputFormat) -> Result<ExitCode> {
  let file = load_build_file(path, engine)?;

  let (builder, mut warnings) = match Builder::prepare(file.builder) {
    Ok(prepared) => prepared,
    Err(e) => {
      for warning in &e.warnings {
        print_warning(warning);
      }
      for error in e.errors.iter() {
        print_error(&error.to_string());
      }
      bail!("Invalid configuration: {} error(s)", e.errors.len());
    }
  };
  for pp in &file.post_processors {
    let w = pp
      .validate()
      .with_context(|| format!("Invalid {} post-processor", pp.name()))?;
    warnings.extend(w);
  }
  for warning in &warnings {
    print_warning(warning);
  }

  let config = builder.config();
  let mut driver = DockerDriver::new(config.executable.clone());
  if let Some(dir) = &engine.config_dir {
    driver = driver.with_config_dir(dir);
  }
  let provisioner = ExecProvisioner::new(config.provision.clone());
  let credentials = AwsCliCredentials::new(config.login.aws.clone());

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let finished = rt.block_on(async {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupt received, cancelling build");
        trigger.cancel();
      }
    });

    let outcome = builder
      .run(&driver, &provisioner, &credentials, cancel.clone())
      .await
      .context("Build failed")?;

    let mut artifact = match outcome {
      BuildOutcome::Cancelled => return Ok(None),
      BuildOutcome::Discarded(data) => return Ok(Some(Finished::Discarded(data))),
      BuildOutcome::Artifact(artifact) => artifact,
    };

    for pp in &file.post_processors {
      if cancel.is_cancelled() {
        return Ok(None);
      }
      artifact = run_post_processor(pp, &driver, &credentials, artifact).await?;
    }
    anyhow::Ok(Some(Finished::Artifact(artifact)))
  })?;

  let Some(finished) = finished else {
    print_warning("Build was cancelled");
    return Ok(ExitCode::from(EXIT_CANCELLED));
  };

  if format.is_json() {
    let report = match &finished {
      Finished::Artifact(artifact) => BuildReport::Artifact { artifact },
      Finished::Discarded(data) => BuildReport::Discarded { generated_data: data },
    };
    print_json(&report)?;
    return Ok(ExitCode::SUCCESS);
  }

  match &finished {
    Finished::Artifact(artifact) => {
      print_success(&artifact.to_string());
      print_stat("Builder", artifact.builder_id());
      print_generated(artifact.generated_data());
    }
    Finished::Discarded(data) => {
      print_info("Container discarded, no artifact produced");
      print_generated(data);
    }
  }
  Ok(ExitCode::SUCCESS)
}

enum Finished {
  Artifact(Artifact),
  Discarded(GeneratedData),
}

async fn run_post_processor(
  pp: &PostProcessorConfig,
  driver: &DockerDriver,
  build_credentials: &AwsCliCredentials,
  artifact: Artifact,
) -> Result<Artifact> {
  debug!(post_processor = pp.name(), "applying post-processor");
  let result = match pp {
    PostProcessorConfig::Push(push) => {
      let credentials = AwsCliCredentials::new(push.login.aws.clone());
      pp.apply(driver, &credentials, artifact).await
    }
    _ => pp.apply(driver, build_credentials, artifact).await,
  };
  result.with_context(|| format!("Post-processor {} failed", pp.name()))
}

fn print_generated(data: &GeneratedData) {
  for (key, value) in data.iter() {
    print_stat(key, value);
  }
}

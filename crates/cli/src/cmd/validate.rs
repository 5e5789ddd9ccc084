//! Implementation of the `dockbuild validate` command.
//!
//! Runs every configuration check, builder and post-processors alike, and
//! reports all problems at once. No engine process is started.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use dockbuild_lib::build::Builder;
use dockbuild_lib::postprocess::PostProcessorConfig;

use super::load_build_file;
use crate::EngineOptions;
use crate::output::{print_error, print_stat, print_success, print_warning};

pub fn cmd_validate(path: &Path, engine: &EngineOptions) -> Result<ExitCode> {
  let file = load_build_file(path, engine)?;

  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  let builder = match Builder::prepare(file.builder) {
    Ok((builder, w)) => {
      warnings.extend(w);
      Some(builder)
    }
    Err(e) => {
      warnings.extend(e.warnings);
      errors.extend(e.errors.iter().map(ToString::to_string));
      None
    }
  };

  for pp in &file.post_processors {
    match pp.validate() {
      Ok(w) => warnings.extend(w),
      Err(e) => errors.push(e.to_string()),
    }
  }

  for warning in &warnings {
    print_warning(warning);
  }

  match builder {
    Some(builder) if errors.is_empty() => {
      print_success(&format!("{} is valid", path.display()));
      let config = builder.config();
      let image = if config.bootstrap.is_some() {
        "(bootstrap build)"
      } else {
        config.image.as_str()
      };
      print_stat("Image", image);
      print_stat("Terminal action", &config.terminal.to_string());
      let names: Vec<_> = file.post_processors.iter().map(PostProcessorConfig::name).collect();
      if !names.is_empty() {
        print_stat("Post-processors", &names.join(", "));
      }
      Ok(ExitCode::SUCCESS)
    }
    _ => {
      print_error(&format!("{} error(s) occurred:", errors.len()));
      for error in &errors {
        print_error(&format!("  {error}"));
      }
      Ok(ExitCode::FAILURE)
    }
  }
}

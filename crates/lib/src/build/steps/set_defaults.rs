use async_trait::async_trait;
use tracing::{debug, warn};

use crate::build::runner::{BuildContext, Step};
use crate::build::types::{BuildError, BuildState};

/// Restores the source image's CMD and ENTRYPOINT on the committed image,
/// unless the user overrides them.
///
/// The working container runs with an overridden entrypoint, so without
/// explicit changes the committed image would inherit it.
#[derive(Debug, Default)]
pub struct StepSetDefaults;

#[async_trait]
impl Step for StepSetDefaults {
  fn name(&self) -> &'static str {
    "set-defaults"
  }

  async fn run(&mut self, ctx: &BuildContext<'_>, state: &mut BuildState) -> Result<(), BuildError> {
    let cmd = lookup(ctx.driver.cmd(&state.image).await, "CMD", &state.image);
    let entrypoint = lookup(ctx.driver.entrypoint(&state.image).await, "ENTRYPOINT", &state.image);

    state.commit_changes = default_changes(&ctx.config.changes, cmd.as_deref(), entrypoint.as_deref());
    debug!(changes = ?state.commit_changes, "commit changes");
    Ok(())
  }
}

fn lookup<E: std::fmt::Display>(result: Result<String, E>, kind: &str, image: &str) -> Option<String> {
  match result {
    Ok(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
    Err(e) => {
      warn!(image = %image, error = %e, "error fetching default {kind}");
      None
    }
  }
}

fn overrides(change: &str, instruction: &str) -> bool {
  let change = change.trim_start();
  change
    .get(..instruction.len())
    .is_some_and(|head| head.eq_ignore_ascii_case(instruction))
}

/// The user's changes plus a CMD and ENTRYPOINT entry for each default the
/// user did not override.
pub fn default_changes(changes: &[String], cmd: Option<&str>, entrypoint: Option<&str>) -> Vec<String> {
  let has_cmd = changes.iter().any(|c| overrides(c, "CMD"));
  let has_entrypoint = changes.iter().any(|c| overrides(c, "ENTRYPOINT"));

  let mut out = changes.to_vec();
  if !has_cmd && let Some(cmd) = cmd {
    out.push(format!("CMD {cmd}"));
  }
  if !has_entrypoint && let Some(entrypoint) = entrypoint {
    out.push(format!("ENTRYPOINT {entrypoint}"));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::steps::testing;
  use crate::config::RawConfig;
  use crate::driver::{CMD_FORMAT, ENTRYPOINT_FORMAT, MockDriver};

  fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn appends_both_defaults() {
    let changes = default_changes(&strings(&["USER app"]), Some(r#"["sh"]"#), Some(r#"["/init"]"#));
    assert_eq!(changes, strings(&["USER app", r#"CMD ["sh"]"#, r#"ENTRYPOINT ["/init"]"#]));
  }

  #[test]
  fn user_cmd_suppresses_default_cmd_only() {
    let changes = default_changes(&strings(&[r#"CMD ["run"]"#]), Some(r#"["sh"]"#), Some(r#"[""]"#));
    assert_eq!(changes, strings(&[r#"CMD ["run"]"#, r#"ENTRYPOINT [""]"#]));
  }

  #[test]
  fn user_entrypoint_suppresses_default_entrypoint_only() {
    let changes = default_changes(&strings(&["entrypoint /bin/app"]), Some(r#"["sh"]"#), Some(r#"["/init"]"#));
    assert_eq!(changes, strings(&["entrypoint /bin/app", r#"CMD ["sh"]"#]));
  }

  #[test]
  fn unresolved_defaults_are_skipped() {
    assert!(default_changes(&[], None, None).is_empty());
  }

  #[tokio::test]
  async fn resolves_defaults_for_working_image() {
    let config = testing::config(RawConfig {
      commit: true,
      discard: false,
      ..testing::discard("nginx")
    });
    let driver = MockDriver::new()
      .with_inspect(CMD_FORMAT, r#" ["nginx","-g","daemon off;"] "#)
      .with_inspect(ENTRYPOINT_FORMAT, r#" [""] "#);
    let mut state = BuildState::new("nginx");

    StepSetDefaults.run(&testing::ctx(&config, &driver), &mut state).await.unwrap();

    assert_eq!(
      state.commit_changes,
      strings(&[r#"CMD ["nginx","-g","daemon off;"]"#, r#"ENTRYPOINT [""]"#])
    );
  }
}

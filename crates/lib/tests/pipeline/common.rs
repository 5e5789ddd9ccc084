//! Shared fixtures for pipeline tests.

use dockbuild_lib::build::{BuildError, BuildOutcome, Builder};
use dockbuild_lib::config::RawConfig;
use dockbuild_lib::credentials::StaticCredentials;
use dockbuild_lib::driver::{
  CMD_FORMAT, DIGEST_FORMAT, ENTRYPOINT_FORMAT, IP_ADDRESS_FORMAT, MockCall, MockDriver, SHA256_FORMAT,
};
use dockbuild_lib::provision::{ExecProvisioner, Provisioner};
use tokio_util::sync::CancellationToken;

/// A driver that answers every inspect template the pipeline uses.
pub fn engine() -> MockDriver {
  MockDriver::new()
    .with_inspect(IP_ADDRESS_FORMAT, "172.17.0.2")
    .with_inspect(SHA256_FORMAT, "sha256:content")
    .with_inspect(DIGEST_FORMAT, "alpine@sha256:digest")
    .with_inspect(CMD_FORMAT, r#"["/bin/sh"]"#)
    .with_inspect(ENTRYPOINT_FORMAT, r#"[""]"#)
}

pub fn image(image: &str) -> RawConfig {
  RawConfig {
    image: Some(image.to_string()),
    ..Default::default()
  }
}

pub async fn run(raw: RawConfig, driver: &MockDriver) -> Result<BuildOutcome, BuildError> {
  let provision = raw.provision.clone();
  let provisioner = ExecProvisioner::new(provision);
  run_with(raw, driver, &provisioner, CancellationToken::new()).await
}

pub async fn run_with(
  raw: RawConfig,
  driver: &MockDriver,
  provisioner: &dyn Provisioner,
  cancel: CancellationToken,
) -> Result<BuildOutcome, BuildError> {
  let (builder, _) = Builder::prepare(raw).expect("valid configuration");
  let credentials = StaticCredentials::new("AWS", "token");
  builder.run(driver, provisioner, &credentials, cancel).await
}

/// Names of the calls recorded by the driver, in order.
pub fn call_names(driver: &MockDriver) -> Vec<&'static str> {
  driver
    .calls()
    .iter()
    .map(|c| match c {
      MockCall::Build { .. } => "build",
      MockCall::DeleteImage { .. } => "rmi",
      MockCall::Commit { .. } => "commit",
      MockCall::Export { .. } => "export",
      MockCall::Import { .. } => "import",
      MockCall::Inspect { .. } => "inspect",
      MockCall::Login { .. } => "login",
      MockCall::Logout { .. } => "logout",
      MockCall::Pull { .. } => "pull",
      MockCall::Push { .. } => "push",
      MockCall::SaveImage { .. } => "save",
      MockCall::StartContainer { .. } => "run",
      MockCall::StopContainer { .. } => "stop",
      MockCall::KillAndRemove { .. } => "kill",
      MockCall::Tag { .. } => "tag",
      MockCall::Exec { .. } => "exec",
      MockCall::VerifyInstalled => "verify",
      MockCall::Version => "version",
    })
    .filter(|name| *name != "inspect")
    .collect()
}

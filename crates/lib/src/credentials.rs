//! Registry credentials and scoped registry sessions.
//!
//! A [`CredentialProvider`] turns a registry URL into a username and
//! password. [`RegistrySession`] opens a login on a driver and must be
//! closed with [`RegistrySession::close`] once the guarded operation ends.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AwsAccess, LoginOptions};
use crate::consts::{ECR_PUBLIC_API_REGION, ECR_PUBLIC_HOST};
use crate::driver::process::run_captured_env;
use crate::driver::{Driver, DriverError};

#[derive(Debug, Error)]
pub enum CredentialError {
  #[error(
    "failed to parse the ECR URL {url:?}; it should be either on the form \
     `public.ecr.aws/<registry_alias>/<registry_name>` or `<account number>.dkr.ecr.<region>.amazonaws.com`"
  )]
  InvalidRegistry { url: String },

  #[error("error fetching ECR credentials: {0}")]
  Provider(#[source] DriverError),

  #[error("error fetching ECR credentials: the credential helper returned an empty password")]
  EmptyPassword,

  #[error("error logging in: {0}")]
  Login(#[source] DriverError),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
  async fn resolve(&self, registry: &str) -> Result<Credentials, CredentialError>;
}

/// Which flavor of managed registry a URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryKind {
  Public,
  Private { account: String, region: String },
}

static PRIVATE_ECR_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?:https?://)?([0-9]+)\.dkr\.ecr\.([a-z0-9-]+)\.amazonaws\.com(?:[/:].*)?$")
    .expect("registry pattern is valid")
});

impl RegistryKind {
  pub fn classify(url: &str) -> Result<Self, CredentialError> {
    let trimmed = url.trim();
    let host = trimmed
      .strip_prefix("https://")
      .or_else(|| trimmed.strip_prefix("http://"))
      .unwrap_or(trimmed)
      .split(['/', ':'])
      .next()
      .unwrap_or_default();

    if host == ECR_PUBLIC_HOST {
      return Ok(RegistryKind::Public);
    }

    let caps = PRIVATE_ECR_RE.captures(trimmed).ok_or_else(|| CredentialError::InvalidRegistry {
      url: url.to_string(),
    })?;
    Ok(RegistryKind::Private {
      account: caps[1].to_string(),
      region: caps[2].to_string(),
    })
  }
}

/// Fixed credentials, as given by `login_username` / `login_password`.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
  pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self(Credentials {
      username: username.into(),
      password: password.into(),
    })
  }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
  async fn resolve(&self, _registry: &str) -> Result<Credentials, CredentialError> {
    Ok(self.0.clone())
  }
}

/// ECR credentials obtained through `aws ecr get-login-password`.
#[derive(Debug, Clone)]
pub struct AwsCliCredentials {
  executable: String,
  access: AwsAccess,
}

impl AwsCliCredentials {
  pub fn new(access: AwsAccess) -> Self {
    Self {
      executable: "aws".to_string(),
      access,
    }
  }

  pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
    self.executable = executable.into();
    self
  }

  /// Arguments for the login-password call of the given registry kind.
  pub fn login_password_args(kind: &RegistryKind) -> Vec<String> {
    let (service, region) = match kind {
      RegistryKind::Public => ("ecr-public", ECR_PUBLIC_API_REGION),
      RegistryKind::Private { region, .. } => ("ecr", region.as_str()),
    };
    vec![
      service.to_string(),
      "get-login-password".to_string(),
      "--region".to_string(),
      region.to_string(),
    ]
  }

  fn env(&self) -> Vec<(&'static str, &str)> {
    let pairs = [
      ("AWS_ACCESS_KEY_ID", &self.access.aws_access_key),
      ("AWS_SECRET_ACCESS_KEY", &self.access.aws_secret_key),
      ("AWS_SESSION_TOKEN", &self.access.aws_token),
      ("AWS_PROFILE", &self.access.aws_profile),
    ];
    pairs
      .into_iter()
      .filter_map(|(key, value)| value.as_deref().filter(|v| !v.is_empty()).map(|v| (key, v)))
      .collect()
  }
}

#[async_trait]
impl CredentialProvider for AwsCliCredentials {
  async fn resolve(&self, registry: &str) -> Result<Credentials, CredentialError> {
    let kind = RegistryKind::classify(registry)?;
    match &kind {
      RegistryKind::Public => info!(registry = %registry, "fetching ECR Public credentials"),
      RegistryKind::Private { account, region } => {
        info!(account = %account, region = %region, "fetching ECR credentials")
      }
    }

    let args = Self::login_password_args(&kind);
    let out = run_captured_env(&self.executable, &args, &self.env())
      .await
      .map_err(CredentialError::Provider)?;

    let password = out.stdout_trimmed();
    if password.is_empty() {
      return Err(CredentialError::EmptyPassword);
    }

    Ok(Credentials {
      username: "AWS".to_string(),
      password,
    })
  }
}

/// An open registry login on a driver.
#[derive(Debug)]
#[must_use = "a registry session must be closed"]
pub struct RegistrySession {
  server: Option<String>,
}

impl RegistrySession {
  /// Log in when the options request it.
  ///
  /// ECR logins fetch credentials from `provider`; plain logins use the
  /// configured username and password.
  pub async fn open(
    driver: &dyn Driver,
    options: &LoginOptions,
    provider: &dyn CredentialProvider,
  ) -> Result<Option<Self>, CredentialError> {
    if !options.requested() {
      return Ok(None);
    }

    let server = options.server().map(str::to_string);
    let creds = if options.ecr_login {
      provider.resolve(server.as_deref().unwrap_or_default()).await?
    } else {
      Credentials {
        username: options.login_username.clone().unwrap_or_default(),
        password: options.login_password.clone().unwrap_or_default(),
      }
    };

    info!(server = ?server, "logging in");
    driver
      .login(server.as_deref(), &creds.username, &creds.password)
      .await
      .map_err(CredentialError::Login)?;

    Ok(Some(Self { server }))
  }

  /// Log out. Failure is only a warning: the guarded operation has already
  /// finished.
  pub async fn close(self, driver: &dyn Driver) {
    info!(server = ?self.server, "logging out");
    if let Err(e) = driver.logout(self.server.as_deref()).await {
      warn!(error = %e, "error logging out");
    }
  }
}

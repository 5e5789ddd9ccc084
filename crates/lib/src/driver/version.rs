//! Engine version parsing and version-gated CLI behavior.
//!
//! All gating decisions are pure functions of a parsed [`Version`] so they
//! can be tested without invoking the engine.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use super::DriverError;

/// The first version accepting `login --password-stdin`.
pub const PASSWORD_STDIN_SINCE: Version = Version::new(17, 7, 0);

/// The version that removed `tag -f`.
pub const FORCE_TAG_REMOVED_IN: Version = Version::new(1, 12, 0);

static VERSION_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("version pattern is valid"));

/// Parse the engine's self-reported version string.
///
/// Matching is tolerant: the first version-looking substring wins, leading
/// zeros are accepted (`17.03.1-ce`), and missing minor/patch components
/// default to zero. Pre-release and build suffixes are ignored.
pub fn parse_version(output: &str) -> Result<Version, DriverError> {
  let unknown = || DriverError::UnknownVersion {
    output: output.trim().to_string(),
  };

  let caps = VERSION_RE.captures(output).ok_or_else(unknown)?;
  let component = |idx: usize| -> Result<u64, DriverError> {
    match caps.get(idx) {
      Some(m) => m.as_str().parse().map_err(|_| unknown()),
      None => Ok(0),
    }
  };

  Ok(Version::new(component(1)?, component(2)?, component(3)?))
}

/// Whether the password can be piped instead of passed as an argument.
pub fn supports_password_stdin(version: &Version) -> bool {
  *version >= PASSWORD_STDIN_SINCE
}

/// Whether `tag` still accepts the `-f` flag.
pub fn supports_force_tag(version: &Version) -> bool {
  *version < FORCE_TAG_REMOVED_IN
}

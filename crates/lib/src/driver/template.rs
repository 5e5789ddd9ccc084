//! Rendering of `run_command` templates.
//!
//! Only one substitution variable exists: `{{.Image}}` (whitespace inside the
//! braces is allowed). Any other `{{ ... }}` expression is rejected.

use thiserror::Error;

use crate::consts::IMAGE_TEMPLATE_VAR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed template expression in {arg:?}")]
  Unclosed { arg: String },

  #[error("unknown template variable {{{{{expr}}}}} in {arg:?}; only {{{{.Image}}}} is supported")]
  UnknownVariable { arg: String, expr: String },
}

/// Substitute the image reference into a single run-command argument.
pub fn render(arg: &str, image: &str) -> Result<String, TemplateError> {
  let mut out = String::with_capacity(arg.len());
  let mut rest = arg;

  while let Some(start) = rest.find("{{") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    let end = after.find("}}").ok_or_else(|| TemplateError::Unclosed { arg: arg.to_string() })?;

    let expr = after[..end].trim();
    if expr != IMAGE_TEMPLATE_VAR {
      return Err(TemplateError::UnknownVariable {
        arg: arg.to_string(),
        expr: expr.to_string(),
      });
    }
    out.push_str(image);
    rest = &after[end + 2..];
  }

  out.push_str(rest);
  Ok(out)
}

/// Check that an argument renders, without needing an image.
pub fn validate(arg: &str) -> Result<(), TemplateError> {
  render(arg, "").map(|_| ())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_argument_is_unchanged() {
    assert_eq!(render("-d", "alpine").unwrap(), "-d");
  }

  #[test]
  fn substitutes_image() {
    assert_eq!(render("{{.Image}}", "alpine:3.19").unwrap(), "alpine:3.19");
  }

  #[test]
  fn substitutes_with_whitespace_and_surrounding_text() {
    assert_eq!(render("img={{ .Image }}!", "ubuntu").unwrap(), "img=ubuntu!");
  }

  #[test]
  fn substitutes_multiple_occurrences() {
    assert_eq!(render("{{.Image}}/{{.Image}}", "a").unwrap(), "a/a");
  }

  #[test]
  fn rejects_unknown_variable() {
    let err = render("{{.Name}}", "alpine").unwrap_err();
    assert!(matches!(err, TemplateError::UnknownVariable { ref expr, .. } if expr == ".Name"));
  }

  #[test]
  fn rejects_unclosed_expression() {
    assert!(matches!(validate("{{.Image"), Err(TemplateError::Unclosed { .. })));
  }
}

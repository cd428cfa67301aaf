use serde::{Deserialize, Serialize};

/// Normalize a human-readable project name into its stable identifier.
///
/// The backend derives the same id independently, so the steps must stay
/// bit-identical to its implementation:
/// 1. lowercase
/// 2. drop every character outside `[a-z0-9\s]`
/// 3. collapse each run of whitespace into a single `_`
/// 4. trim
pub fn normalize_project_name(name: &str) -> String {
  let lowered = name.to_lowercase();

  let mut id = String::with_capacity(lowered.len());
  let mut in_whitespace = false;
  for c in lowered.chars() {
    if c.is_whitespace() {
      if !in_whitespace {
        id.push('_');
        in_whitespace = true;
      }
    } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
      id.push(c);
      in_whitespace = false;
    }
    // Anything else is stripped before whitespace is collapsed, so it never
    // splits a whitespace run.
  }

  id.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
  /// Derive the id from a display name. Returns `None` when nothing survives normalization.
  pub fn from_name(name: &str) -> Option<Self> {
    let id = normalize_project_name(name);
    if id.is_empty() { None } else { Some(ProjectId(id)) }
  }

  /// Wrap an id that was already normalized (e.g. read back from the store).
  pub fn from_raw(id: impl Into<String>) -> Self {
    ProjectId(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ProjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl AsRef<str> for ProjectId {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

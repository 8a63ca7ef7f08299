//! Validated project identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::errors::ProjectError;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{3,40}$").expect("project name pattern is valid"));

/// A project name: 3 to 40 characters of lowercase ASCII letters, digits, or `-`.
///
/// Every valid name is also a single, safe directory component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectName(String);

impl ProjectName {
    /// Validate `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, ProjectError> {
        let name = name.into();
        if NAME_PATTERN.is_match(&name) {
            Ok(Self(name))
        } else {
            let reason = if name.chars().count() < 3 || name.chars().count() > 40 {
                "must be 3 to 40 characters long"
            } else {
                "may only contain lowercase letters, digits, and hyphens"
            };
            Err(ProjectError::InvalidName {
                name,
                reason: reason.to_owned(),
            })
        }
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectName {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_valid_names() {
        let longest = "a".repeat(40);
        for name in ["abc", "my-bot", "rag-2", "---", longest.as_str()] {
            assert!(ProjectName::new(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_short_and_long() {
        assert_matches!(
            ProjectName::new("ab"),
            Err(ProjectError::InvalidName { reason, .. }) if reason.contains("3 to 40")
        );
        assert_matches!(ProjectName::new("x".repeat(41)), Err(ProjectError::InvalidName { .. }));
        assert_matches!(ProjectName::new(""), Err(ProjectError::InvalidName { .. }));
    }

    #[test]
    fn rejects_bad_characters() {
        for name in ["Name-With-Caps", "my_bot", "my bot", "../etc", "bot.v2", "café"] {
            assert_matches!(
                ProjectName::new(name),
                Err(ProjectError::InvalidName { .. }),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_trailing_newline() {
        assert!(ProjectName::new("my-bot\n").is_err());
    }

    #[test]
    fn parses_and_displays() {
        let name: ProjectName = "my-bot".parse().unwrap();
        assert_eq!(name.to_string(), "my-bot");
        assert_eq!(name.as_str(), "my-bot");
        assert_eq!(ProjectName::new("my-bot".to_owned()).unwrap(), name);
    }
}

//! Rendering command results to stdout.

use anyhow::{Context, Result};
use serde::Serialize;

/// Output encoding selected by `--json`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Yaml }
    }

    /// Encode `value`, always ending with a newline.
    pub fn render<T: Serialize + ?Sized>(self, value: &T) -> Result<String> {
        let mut text = match self {
            Self::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML output")?,
            Self::Json => serde_json::to_string_pretty(value).context("Failed to encode JSON output")?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    pub fn print<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        print!("{}", self.render(value)?);
        Ok(())
    }
}

//! Output format selection, mirroring `cuenv`'s `OutputFormat` enum
//! (`ValueEnum`/`Serialize`/`Deserialize`/`Display`/`AsRef<str>`), trimmed
//! to the three variants §6 calls for.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a command renders its result.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// `{"status": "ok", "data": ...}` / `{"status": "error", "error": ...}`.
    Json,
    /// Plain text, no color or styling. Default; also forced by `--plain`.
    #[default]
    Text,
    /// Styled text for an interactive terminal.
    Rich,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl AsRef<str> for OutputFormat {
    fn as_ref(&self) -> &str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Rich => "rich",
        }
    }
}

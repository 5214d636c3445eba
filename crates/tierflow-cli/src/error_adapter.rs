//! Error adapter for converting [`CliError`] to miette diagnostics.
//!
//! The library's error types stay free of presentation concerns; this module
//! attaches a diagnostic code and, where one is useful, a hint.

use std::fmt;

use miette::{Diagnostic, LabeledSpan};

use crate::error::{CliError, ConfigError};

/// Wraps a [`CliError`] so miette can render it.
pub struct ErrorAdapter<'a>(pub &'a CliError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl Diagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.0 {
            CliError::Io(_) => "tierflow::io",
            CliError::Json(_) => "tierflow::json",
            CliError::Config(_) => "tierflow::config",
            CliError::Layout(_) => "tierflow::layout",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.0 {
            CliError::Io(_) => return None,
            CliError::Json(_) => {
                "expected an object with `nodes`, `edges` and optional `branches` and `transform`"
            }
            CliError::Config(ConfigError::MissingFile(_)) => {
                "check the path passed to --config"
            }
            CliError::Config(ConfigError::Parse(_)) => {
                "configuration uses `[layout]` and `[coordinates]` tables"
            }
            CliError::Layout(_) => "the report was still written to the output file",
        };
        Some(Box::new(help))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = CliError::Layout("boom".to_string());
        let adapter = ErrorAdapter(&err);

        assert_eq!(adapter.code().unwrap().to_string(), "tierflow::layout");
        assert_eq!(adapter.to_string(), "Layout failed: boom");
        assert!(adapter.help().is_some());
    }

    #[test]
    fn test_io_has_no_help() {
        let err = CliError::Io(std::io::Error::other("disk"));
        let adapter = ErrorAdapter(&err);

        assert_eq!(adapter.code().unwrap().to_string(), "tierflow::io");
        assert!(adapter.help().is_none());
    }
}

// crates/core/src/error.rs
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur when parsing persisted progress data
#[derive(Debug, Error)]
pub enum ParseProgressError {
    #[error("missing '&' separator between floor and completion list")]
    MissingSeparator,

    #[error("invalid number {text:?} in progress data: {source}")]
    InvalidNumber {
        text: String,
        #[source]
        source: ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_error_display() {
        let err = ParseProgressError::MissingSeparator;
        assert!(err.to_string().contains("separator"));

        let source = "x".parse::<u64>().unwrap_err();
        let err = ParseProgressError::InvalidNumber {
            text: "x".to_string(),
            source,
        };
        assert!(err.to_string().contains("\"x\""));
    }
}

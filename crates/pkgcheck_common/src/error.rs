//! Error types for package check.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate error type.
pub type Result<T> = std::result::Result<T, PkgcheckError>;

#[derive(Error, Debug)]
pub enum PkgcheckError {
    #[error("Only test_format 1.0 is supported for now (got {0})")]
    UnsupportedTestFormat(String),

    #[error("You should at least define the 'default' test suite")]
    MissingDefaultSuite,

    #[error("'only' is not allowed on the default test suite")]
    OnlyOnDefaultSuite,

    #[error("Test suite '{suite}' declares both 'only' and 'exclude'")]
    OnlyAndExclude { suite: String },

    #[error("Unknown question type '{kind}' for argument '{name}'")]
    UnknownQuestionType { name: String, kind: String },

    #[error("No default value could be computed for arg {0}")]
    NoDefault(String),

    #[error("Unknown test kind: {0}")]
    UnknownTestKind(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid probe setup: {0}")]
    InvalidProbe(String),

    #[error("No result recorded for test {id} (expected {path})")]
    MissingResult { id: u32, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PkgcheckError {
    pub fn code(&self) -> i32 {
        match self {
            PkgcheckError::UnsupportedTestFormat(_) => 10,
            PkgcheckError::MissingDefaultSuite => 11,
            PkgcheckError::OnlyOnDefaultSuite => 12,
            PkgcheckError::OnlyAndExclude { .. } => 13,
            PkgcheckError::UnknownQuestionType { .. } => 14,
            PkgcheckError::NoDefault(_) => 15,
            PkgcheckError::UnknownTestKind(_) => 16,
            PkgcheckError::InvalidManifest(_) => 17,
            PkgcheckError::InvalidProbe(_) => 18,
            PkgcheckError::MissingResult { .. } => 20,
            PkgcheckError::Io(_) => 30,
            PkgcheckError::Toml(_) => 31,
            PkgcheckError::Json(_) => 32,
        }
    }

    /// Configuration errors abort the run and are reported verbatim.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PkgcheckError::UnsupportedTestFormat(_)
                | PkgcheckError::MissingDefaultSuite
                | PkgcheckError::OnlyOnDefaultSuite
                | PkgcheckError::OnlyAndExclude { .. }
                | PkgcheckError::UnknownQuestionType { .. }
                | PkgcheckError::NoDefault(_)
                | PkgcheckError::UnknownTestKind(_)
                | PkgcheckError::InvalidManifest(_)
                | PkgcheckError::InvalidProbe(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_flagged() {
        assert!(PkgcheckError::OnlyOnDefaultSuite.is_configuration());
        assert!(PkgcheckError::NoDefault("admin".into()).is_configuration());
        let missing = PkgcheckError::MissingResult {
            id: 101,
            path: PathBuf::from("results/101.json"),
        };
        assert!(!missing.is_configuration());
        assert_eq!(missing.code(), 20);
    }
}

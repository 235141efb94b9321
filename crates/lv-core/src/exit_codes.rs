//! Exit codes for the lv-core CLI.
//!
//! Exit codes communicate the job outcome without requiring log parsing.

use lv_common::Error;

/// Exit codes for lv-core runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Job completed
    Clean = 0,

    /// Missing or malformed arguments
    Usage = 2,

    /// Configuration, registry or sources manifest error
    ConfigError = 10,

    /// Input could not be fetched or decoded
    InputError = 11,

    /// Generated schema rejected
    SchemaError = 12,

    /// I/O error
    IoError = 13,

    /// Output partition already populated
    OutputExists = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Map a fatal job error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_)
            | Error::InvalidRegistry(_)
            | Error::UnknownStream(_)
            | Error::Json(_) => ExitCode::ConfigError,
            Error::SchemaValidation(_) => ExitCode::SchemaError,
            Error::ObjectNotFound { .. } | Error::Decode { .. } => ExitCode::InputError,
            Error::OutputExists { .. } => ExitCode::OutputExists,
            Error::Io(_) | Error::Write(_) => ExitCode::IoError,
            Error::FieldType { .. } => ExitCode::InternalError,
        }
    }

    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

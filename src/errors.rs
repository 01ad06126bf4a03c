// SPDX-License-Identifier: GPL-3.0-only

//! Error types for webcam-stream

use crate::backends::camera::types::{BackendError, CapabilityTuple};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture backend errors
    Backend(BackendError),
    /// Session lifecycle errors
    Session(SessionError),
    /// Frame reader errors
    Cycle(CycleError),
    /// Virtual output errors
    Output(OutputError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Errors opening a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The tuple is not in the device's current format snapshot
    UnsupportedTuple {
        device: String,
        tuple: CapabilityTuple,
    },
    /// The backend refused to open a reader
    Backend(BackendError),
}

/// Failures of one frame reader execution cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// No stream id was supplied
    MissingStream,
    /// The stream id is not a valid session id
    InvalidStreamId(String),
    /// No session is registered under the id
    SessionNotFound(String),
    /// Every read of the cycle came back empty
    NoSample,
    /// The negotiated format has no fixed frame size to read into
    UnknownFrameSize(String),
}

/// Virtual output errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// Another owner holds the output
    Busy,
    /// The output configuration is unusable
    InvalidConfig(String),
    /// The caller does not own the output
    NotOwner,
    /// A frame is shorter than the configured frame size
    BufferTooSmall { expected: usize, actual: usize },
    /// The output device failed
    Backend(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Cycle(e) => write!(f, "Read cycle error: {}", e),
            AppError::Output(e) => write!(f, "Output error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnsupportedTuple { device, tuple } => {
                write!(f, "{} does not offer {}", device, tuple)
            }
            SessionError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::MissingStream => write!(f, "No stream id"),
            CycleError::InvalidStreamId(id) => write!(f, "Invalid stream id: {}", id),
            CycleError::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            CycleError::NoSample => write!(f, "No sample available"),
            CycleError::UnknownFrameSize(format) => {
                write!(f, "Unknown frame size for format {}", format)
            }
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Busy => write!(f, "Output is owned by another node"),
            OutputError::InvalidConfig(msg) => write!(f, "Invalid output config: {}", msg),
            OutputError::NotOwner => write!(f, "Caller does not own the output"),
            OutputError::BufferTooSmall { expected, actual } => {
                write!(f, "Frame too small: expected {} bytes, got {}", expected, actual)
            }
            OutputError::Backend(msg) => write!(f, "Output device error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SessionError {}
impl std::error::Error for CycleError {}
impl std::error::Error for OutputError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<CycleError> for AppError {
    fn from(err: CycleError) -> Self {
        AppError::Cycle(err)
    }
}

impl From<OutputError> for AppError {
    fn from(err: OutputError) -> Self {
        AppError::Output(err)
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        SessionError::Backend(err)
    }
}

impl From<std::io::Error> for OutputError {
    fn from(err: std::io::Error) -> Self {
        OutputError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{FourCc, FrameRate, Resolution};

    #[test]
    fn test_session_error_carries_backend_diagnostic() {
        let err: SessionError = BackendError::OpenFailed("device busy".into()).into();
        assert_eq!(err.to_string(), "Open failed: device busy");
    }

    #[test]
    fn test_unsupported_tuple_message() {
        let err = SessionError::UnsupportedTuple {
            device: "Cam".into(),
            tuple: CapabilityTuple {
                format: FourCc::NV12,
                resolution: Resolution::new(640, 480),
                frame_rate: FrameRate::Fps30,
            },
        };
        assert_eq!(err.to_string(), "Cam does not offer NV12 640x480 @ 30fps");
    }

    #[test]
    fn test_app_error_wraps_sub_errors() {
        let err: AppError = CycleError::NoSample.into();
        assert_eq!(err.to_string(), "Read cycle error: No sample available");
    }
}

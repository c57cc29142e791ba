//! Error types surfaced by the locator
//!
//! Per-item failures (degenerate line clusters, broken OCR output, corner
//! searches without a partner) are absorbed where they occur. Only the
//! failures below reach a caller.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a remote session implementation
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not connected")]
    Disconnected,
    #[error("failed to read screen: {0}")]
    Image(#[from] image::ImageError),
    #[error("session I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failure of a single OCR invocation
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to run OCR engine: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write OCR input image: {0}")]
    Image(#[from] image::ImageError),
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("OCR input task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of a text search
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("search for \"{text}\" on screen timed out after {:.1} seconds", .elapsed.as_secs_f64())]
    Timeout { text: String, elapsed: Duration },
    #[error("search for \"{text}\" was cancelled")]
    Cancelled { text: String },
    #[error("screen capture failed: {0}")]
    Capture(#[from] SessionError),
    #[error("screen analysis task failed: {0}")]
    Analysis(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = LocateError::Timeout {
            text: "LOGIN".to_string(),
            elapsed: Duration::from_millis(30_240),
        };
        assert_eq!(
            err.to_string(),
            "search for \"LOGIN\" on screen timed out after 30.2 seconds"
        );
    }

    #[test]
    fn test_capture_error_conversion() {
        let err: LocateError = SessionError::Disconnected.into();
        assert!(matches!(err, LocateError::Capture(SessionError::Disconnected)));
    }
}

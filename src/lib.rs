//! screentext - Locate text on remote desktop screens
//!
//! Finds a phrase on a screen image by detecting the outlines of text
//! fields and buttons, running OCR on them and fuzzy matching the result.
//! The point to click is derived from the matched words.

pub mod automation;
pub mod capture;
pub mod config;
pub mod error;
pub mod vision;

pub use automation::Automator;
pub use capture::{CapturedFrame, FileSession, RemoteSession};
pub use config::{AppConfig, DumpConfig, LocatorConfig, PollingConfig};
pub use error::{LocateError, OcrError, SessionError};
pub use vision::{ClickPoint, Located, TesseractEngine, TextLocator};

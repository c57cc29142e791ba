//! Image file backed session
//!
//! Re-reads an image file on every capture, so a screenshot that is being
//! overwritten by another program behaves like a live screen. Input events
//! are logged and recorded.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{CapturedFrame, RemoteSession};
use crate::error::SessionError;

/// Input sent to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    Key(String),
    MouseMove { x: i32, y: i32 },
    MousePress { button: u8 },
}

/// Session reading its screen from an image file
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    events: Mutex<Vec<InputEvent>>,
}

impl FileSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Input events received so far
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    fn record(&self, event: InputEvent) {
        info!("Input event: {:?}", event);
        self.events.lock().push(event);
    }
}

#[async_trait]
impl RemoteSession for FileSession {
    async fn capture(&self) -> Result<CapturedFrame, SessionError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let image = image::load_from_memory(&bytes)?;
        debug!(
            "Captured {}x{} screen from {:?}",
            image.width(),
            image.height(),
            self.path
        );
        Ok(CapturedFrame::from_image(&image))
    }

    async fn key_press(&self, key: &str) -> Result<(), SessionError> {
        self.record(InputEvent::Key(key.to_string()));
        Ok(())
    }

    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), SessionError> {
        self.record(InputEvent::MouseMove { x, y });
        Ok(())
    }

    async fn mouse_press(&self, button: u8) -> Result<(), SessionError> {
        self.record(InputEvent::MousePress { button });
        Ok(())
    }
}

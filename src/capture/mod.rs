//! Remote Session Layer
//!
//! Screen bitmaps come in and input events go out through a `RemoteSession`.
//! The transport itself (VNC, RDP, a local display) lives outside this crate.

pub mod file;
pub mod frame;

use async_trait::async_trait;

use crate::error::SessionError;

pub use file::{FileSession, InputEvent};
pub use frame::{CapturedFrame, Fingerprint};

/// Connection to a remote display
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Fetch a fresh copy of the screen
    async fn capture(&self) -> Result<CapturedFrame, SessionError>;

    /// Press and release a key, by name ("ctrl", "enter", "a" ...)
    async fn key_press(&self, key: &str) -> Result<(), SessionError>;

    /// Move the pointer to `(x, y)`
    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), SessionError>;

    /// Press and release a mouse button (1 = left)
    async fn mouse_press(&self, button: u8) -> Result<(), SessionError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Session playing back a fixed list of frames; the last one repeats
    pub struct ScriptedSession {
        frames: Vec<CapturedFrame>,
        captures: AtomicUsize,
        events: Mutex<Vec<InputEvent>>,
    }

    impl ScriptedSession {
        pub fn new(frames: Vec<CapturedFrame>) -> Self {
            Self {
                frames,
                captures: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn captures(&self) -> usize {
            self.captures.load(Ordering::SeqCst)
        }

        pub fn events(&self) -> Vec<InputEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteSession for ScriptedSession {
        async fn capture(&self) -> Result<CapturedFrame, SessionError> {
            let n = self.captures.fetch_add(1, Ordering::SeqCst);
            let frame = self
                .frames
                .get(n)
                .or_else(|| self.frames.last())
                .ok_or(SessionError::Disconnected)?;
            Ok(frame.clone())
        }

        async fn key_press(&self, key: &str) -> Result<(), SessionError> {
            self.events.lock().push(InputEvent::Key(key.to_string()));
            Ok(())
        }

        async fn mouse_move(&self, x: i32, y: i32) -> Result<(), SessionError> {
            self.events.lock().push(InputEvent::MouseMove { x, y });
            Ok(())
        }

        async fn mouse_press(&self, button: u8) -> Result<(), SessionError> {
            self.events.lock().push(InputEvent::MousePress { button });
            Ok(())
        }
    }

    /// Frame with some structure on it, distinct per `seed`
    pub fn content_frame(seed: u8) -> CapturedFrame {
        CapturedFrame::new(RgbaImage::from_fn(64, 48, |x, y| {
            let v = if (x / 8 + y / 8) % 2 == 0 { 255 } else { seed };
            Rgba([v, v, v, 255])
        }))
    }

    pub fn blank_frame() -> CapturedFrame {
        CapturedFrame::new(RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255])))
    }
}

//! Automation actions on a remote session
//!
//! Waits for text, clicks on it and types into the focused field.

pub mod poll;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capture::RemoteSession;
use crate::config::PollingConfig;
use crate::error::{LocateError, SessionError};
use crate::vision::{Located, OcrEngine, TextLocator};

pub use poll::{PollState, PollingController, StabilityTracker};

/// Pause between the steps of a click and between typed keys
pub const INPUT_DELAY: Duration = Duration::from_millis(100);

/// Left mouse button
pub const PRIMARY_BUTTON: u8 = 1;

/// Key name sent for a typed character
pub fn key_name(key: &str) -> &str {
    match key {
        " " => "space",
        "\t" => "tab",
        "\n" => "enter",
        other => other,
    }
}

/// Drives a remote session through text on its screen
pub struct Automator<S: RemoteSession, E: OcrEngine> {
    session: Arc<S>,
    locator: TextLocator<E>,
    polling: PollingConfig,
    cancel: CancellationToken,
}

impl<S: RemoteSession, E: OcrEngine> Automator<S, E> {
    pub fn new(session: Arc<S>, locator: TextLocator<E>, polling: PollingConfig) -> Self {
        Self {
            session,
            locator,
            polling,
            cancel: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn locator(&self) -> &TextLocator<E> {
        &self.locator
    }

    /// Token that aborts every running and future search of this automator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn poll(&self, text: &str, polling: PollingConfig) -> Result<Located, LocateError> {
        let mut controller = PollingController::new(
            self.session.as_ref(),
            &self.locator,
            polling,
            self.cancel.clone(),
        );
        controller.run(text).await
    }

    /// Wait until `text` appears on the screen
    pub async fn wait_for_text(&self, text: &str) -> Result<Located, LocateError> {
        info!(
            "wait_for_text({:?}, timeout={:.1})",
            text, self.polling.timeout_secs
        );
        self.poll(text, self.polling.clone()).await
    }

    /// Wait for `text`, click on it and move the pointer out of the way
    pub async fn click_on_text(&self, text: &str) -> Result<Located, LocateError> {
        info!(
            "click_on_text({:?}, timeout={:.1})",
            text, self.polling.timeout_secs
        );
        let polling = PollingConfig {
            prevent_screen_saver: false,
            ..self.polling.clone()
        };
        let located = self.poll(text, polling).await?;

        self.session.mouse_move(located.point.x, located.point.y).await?;
        tokio::time::sleep(INPUT_DELAY).await;
        self.session.mouse_press(PRIMARY_BUTTON).await?;
        tokio::time::sleep(INPUT_DELAY).await;
        self.session.mouse_move(0, 0).await?;

        Ok(located)
    }

    /// Press the named keys one after another
    pub async fn enter_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<(), SessionError> {
        let keys: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
        info!("enter_keys({:?})", keys);
        self.press_keys(keys.into_iter()).await
    }

    /// Type `text` character by character
    pub async fn enter_text(&self, text: &str) -> Result<(), SessionError> {
        info!("enter_text({:?})", text);
        let chars: Vec<String> = text.chars().map(String::from).collect();
        self.press_keys(chars.iter().map(String::as_str)).await
    }

    async fn press_keys<'k>(
        &self,
        keys: impl Iterator<Item = &'k str>,
    ) -> Result<(), SessionError> {
        for key in keys {
            self.session.key_press(key_name(key)).await?;
            tokio::time::sleep(INPUT_DELAY).await;
        }
        Ok(())
    }
}

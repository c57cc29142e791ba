//! Polling state machine for live sessions.
//!
//! Sequences through: Polling → StableCheck → Matching → Done
//! and back to Polling until the text shows up, the timeout passes or the
//! search is cancelled.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{Fingerprint, RemoteSession};
use crate::config::PollingConfig;
use crate::error::LocateError;
use crate::vision::{Located, OcrEngine, TextLocator};

/// Polling state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Capturing a fresh screen
    Polling,
    /// Waiting for the screen to settle
    StableCheck,
    /// Running the localization pipeline
    Matching,
    /// Text found
    Done,
    /// Timeout reached without a match
    TimedOut,
    /// Search cancelled by the caller
    Cancelled,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Polling => write!(f, "Polling"),
            PollState::StableCheck => write!(f, "Checking stability"),
            PollState::Matching => write!(f, "Matching"),
            PollState::Done => write!(f, "Done"),
            PollState::TimedOut => write!(f, "Timed out"),
            PollState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Remembers recent screen fingerprints.
///
/// A screen is stable once it has been seen on an earlier tick, unless it is
/// the very screen that was accepted as stable last time.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    seen: VecDeque<Fingerprint>,
    capacity: usize,
    last_accepted: Option<Fingerprint>,
}

impl StabilityTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: VecDeque::with_capacity(capacity + 1),
            capacity,
            last_accepted: None,
        }
    }

    /// Record a fingerprint and report whether the screen counts as stable
    pub fn observe(&mut self, fingerprint: Fingerprint) -> bool {
        let stable = self.seen.contains(&fingerprint) && self.last_accepted != Some(fingerprint);
        if stable {
            self.last_accepted = Some(fingerprint);
        }

        self.seen.push_back(fingerprint);
        while self.seen.len() > self.capacity {
            self.seen.pop_front();
        }
        stable
    }
}

/// Waits for a text to appear on a remote session
pub struct PollingController<'a, S: ?Sized, E: OcrEngine> {
    session: &'a S,
    locator: &'a TextLocator<E>,
    config: PollingConfig,
    cancel: CancellationToken,
    state: PollState,
}

impl<'a, S, E> PollingController<'a, S, E>
where
    S: RemoteSession + ?Sized,
    E: OcrEngine,
{
    pub fn new(
        session: &'a S,
        locator: &'a TextLocator<E>,
        config: PollingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            locator,
            config,
            cancel,
            state: PollState::Polling,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    fn transition(&mut self, state: PollState) {
        if self.state != state {
            debug!("Polling state: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Poll until `text` is found.
    ///
    /// Fails with `Timeout` once the configured timeout has passed (a
    /// running OCR pass is abandoned at the deadline) and with `Cancelled`
    /// when the token fires.
    pub async fn run(&mut self, text: &str) -> Result<Located, LocateError> {
        let (session, locator) = (self.session, self.locator);
        let start = Instant::now();
        let timeout = self.config.timeout();
        let deadline = timeout.map(|t| start + t);
        let mut tracker = StabilityTracker::new(self.config.stability_history);

        info!("Waiting for {:?} (timeout {:?})", text, timeout);

        loop {
            self.transition(PollState::Polling);
            let frame = self.guard(text, start, deadline, session.capture()).await??;

            if frame.is_blank() {
                debug!("Screen is blank, sending {:?}", self.config.keep_alive_key);
                session.key_press(&self.config.keep_alive_key).await?;
            } else {
                let accepted = if self.config.wait_for_stability {
                    self.transition(PollState::StableCheck);
                    tracker.observe(frame.fingerprint())
                } else {
                    true
                };

                if accepted {
                    self.transition(PollState::Matching);
                    let image = frame.to_image();
                    let found = self
                        .guard(text, start, deadline, locator.find_text(&image, text))
                        .await??;
                    if let Some(located) = found {
                        self.transition(PollState::Done);
                        info!("Found {:?} [{:.1} sec]", text, start.elapsed().as_secs_f64());
                        return Ok(located);
                    }
                } else {
                    debug!("Screen not stable yet");
                }

                if self.config.prevent_screen_saver {
                    session.key_press(&self.config.keep_alive_key).await?;
                }
            }

            let elapsed = start.elapsed();
            debug!("Not found {:?} [{:.1} sec]", text, elapsed.as_secs_f64());
            if timeout.is_some_and(|t| elapsed >= t) {
                return Err(self.timed_out(text, elapsed));
            }

            let interval = self.config.poll_interval();
            self.guard(text, start, deadline, tokio::time::sleep(interval)).await?;
        }
    }

    /// Drive `fut` unless the search is cancelled or the deadline passes first
    async fn guard<F: Future>(
        &mut self,
        text: &str,
        start: Instant,
        deadline: Option<Instant>,
        fut: F,
    ) -> Result<F::Output, LocateError> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.transition(PollState::Cancelled);
                info!("Search for {:?} cancelled", text);
                Err(LocateError::Cancelled { text: text.to_string() })
            }
            _ = deadline_reached(deadline) => Err(self.timed_out(text, start.elapsed())),
            output = fut => Ok(output),
        }
    }

    fn timed_out(&mut self, text: &str, elapsed: Duration) -> LocateError {
        self.transition(PollState::TimedOut);
        warn!(
            "Search for {:?} timed out after {:.1} seconds",
            text,
            elapsed.as_secs_f64()
        );
        LocateError::Timeout {
            text: text.to_string(),
            elapsed,
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{blank_frame, content_frame, ScriptedSession};
    use crate::capture::InputEvent;
    use crate::config::{DumpConfig, LocatorConfig};
    use crate::error::OcrError;
    use crate::vision::{OcrLine, OcrWord};
    use async_trait::async_trait;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads `text` everywhere it looks
    struct EchoEngine {
        text: &'static str,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl EchoEngine {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for EchoEngine {
        async fn recognize(
            &self,
            image: &GrayImage,
            _lang: &str,
        ) -> Result<Vec<OcrLine>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let (w, h) = image.dimensions();
            Ok(vec![vec![OcrWord::new(self.text, [0.0, 0.0, w as f64, h as f64])]])
        }
    }

    fn locator(engine: EchoEngine) -> TextLocator<EchoEngine> {
        TextLocator::new(LocatorConfig::default(), DumpConfig::default(), engine)
    }

    fn polling(timeout_secs: f64) -> PollingConfig {
        PollingConfig {
            timeout_secs,
            poll_interval_ms: 5,
            ..Default::default()
        }
    }

    fn fp(n: u8) -> Fingerprint {
        [n; 32]
    }

    #[test]
    fn test_stability_tracker() {
        let mut tracker = StabilityTracker::new(5);

        assert!(!tracker.observe(fp(1)));
        assert!(tracker.observe(fp(1)));
        // accepted screen is not accepted again
        assert!(!tracker.observe(fp(1)));
        assert!(!tracker.observe(fp(2)));
        assert!(tracker.observe(fp(2)));
        // back to an earlier screen that is still remembered
        assert!(tracker.observe(fp(1)));
    }

    #[test]
    fn test_stability_history_is_bounded() {
        let mut tracker = StabilityTracker::new(2);

        tracker.observe(fp(1));
        tracker.observe(fp(2));
        tracker.observe(fp(3));
        assert!(!tracker.observe(fp(1)));
        assert!(tracker.observe(fp(3)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PollState::StableCheck.to_string(), "Checking stability");
        assert_eq!(PollState::TimedOut.to_string(), "Timed out");
    }

    #[tokio::test]
    async fn test_found_on_first_tick() {
        let session = ScriptedSession::new(vec![content_frame(0)]);
        let locator = locator(EchoEngine::new("LOGIN"));
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(5.0),
            CancellationToken::new(),
        );

        let located = controller.run("login").await.unwrap();

        assert_eq!(controller.state(), PollState::Done);
        assert_eq!(located.words[0].text, "LOGIN");
        assert_eq!(session.captures(), 1);
        assert!(session.events().is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let session = ScriptedSession::new(vec![content_frame(0)]);
        let locator = locator(EchoEngine::new("Cancel"));
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(0.1),
            CancellationToken::new(),
        );

        let err = controller.run("LOGIN").await.unwrap_err();

        assert_eq!(controller.state(), PollState::TimedOut);
        match err {
            LocateError::Timeout { text, elapsed } => {
                assert_eq!(text, "LOGIN");
                assert!(elapsed >= Duration::from_millis(100));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(session.captures() >= 1);
    }

    #[tokio::test]
    async fn test_slow_ocr_does_not_overrun_timeout() {
        let session = ScriptedSession::new(vec![content_frame(0)]);
        let locator = locator(EchoEngine {
            delay: Duration::from_secs(30),
            ..EchoEngine::new("LOGIN")
        });
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(0.2),
            CancellationToken::new(),
        );

        let started = std::time::Instant::now();
        let err = controller.run("LOGIN").await.unwrap_err();

        assert!(matches!(err, LocateError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_blank_screen_gets_keep_alive() {
        let session = ScriptedSession::new(vec![blank_frame(), blank_frame(), content_frame(0)]);
        let locator = locator(EchoEngine::new("LOGIN"));
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(5.0),
            CancellationToken::new(),
        );

        controller.run("LOGIN").await.unwrap();

        assert_eq!(session.captures(), 3);
        assert_eq!(
            session.events(),
            vec![InputEvent::Key("ctrl".to_string()), InputEvent::Key("ctrl".to_string())]
        );
    }

    #[tokio::test]
    async fn test_wait_for_stability() {
        let session = ScriptedSession::new(vec![
            content_frame(0),
            content_frame(100),
            content_frame(100),
        ]);
        let engine = EchoEngine::new("LOGIN");
        let locator = locator(engine);
        let config = PollingConfig {
            wait_for_stability: true,
            ..polling(5.0)
        };
        let mut controller = PollingController::new(
            &session,
            &locator,
            config,
            CancellationToken::new(),
        );

        controller.run("LOGIN").await.unwrap();

        // two different screens, then the second one again
        assert_eq!(session.captures(), 3);
    }

    #[tokio::test]
    async fn test_prevent_screen_saver() {
        let session = ScriptedSession::new(vec![content_frame(0)]);
        let locator = locator(EchoEngine::new("Cancel"));
        let config = PollingConfig {
            prevent_screen_saver: true,
            keep_alive_key: "shift".to_string(),
            ..polling(0.3)
        };
        let mut controller = PollingController::new(
            &session,
            &locator,
            config,
            CancellationToken::new(),
        );

        assert!(controller.run("LOGIN").await.is_err());

        let events = session.events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| *e == InputEvent::Key("shift".to_string())));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let session = ScriptedSession::new(vec![content_frame(0)]);
        let locator = locator(EchoEngine::new("Cancel"));
        let cancel = CancellationToken::new();
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(0.0),
            cancel.clone(),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = controller.run("LOGIN").await.unwrap_err();

        assert!(matches!(err, LocateError::Cancelled { .. }));
        assert_eq!(controller.state(), PollState::Cancelled);
    }

    #[tokio::test]
    async fn test_capture_failure_is_reported() {
        let session = ScriptedSession::new(Vec::new());
        let locator = locator(EchoEngine::new("LOGIN"));
        let mut controller = PollingController::new(
            &session,
            &locator,
            polling(5.0),
            CancellationToken::new(),
        );

        let err = controller.run("LOGIN").await.unwrap_err();
        assert!(matches!(err, LocateError::Capture(_)));
    }
}

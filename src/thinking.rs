use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const THINKING_TEXT: &str = "Chef is whipping up a tasty remix";
pub const THINKING_INTERVAL: Duration = Duration::from_millis(480);
pub const FINAL_EDIT_ATTEMPTS: usize = 3;

pub fn thinking_frame(phase: usize) -> String {
    format!("{THINKING_TEXT}{}", ".".repeat(phase % 4))
}

/// Cycles the "thinking" placeholder through its dot phases until stopped.
pub struct Thinking {
    handle: Option<JoinHandle<()>>,
}

impl Thinking {
    /// Frame 0 is expected to be on screen already; `update` receives frames 1, 2, 3, 0, ...
    pub fn start<F, Fut>(mut update: F) -> Self
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(THINKING_INTERVAL);
            // A throttled `update` may sleep past several ticks; do not burst afterwards.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            let mut phase = 0;
            loop {
                ticker.tick().await;
                phase = (phase + 1) % 4;
                update(thinking_frame(phase)).await;
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Cancels the animation and waits until no further frame can be emitted.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Thinking {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Result of one try at replacing the placeholder with the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAttempt {
    Done,
    RetryAfter(Duration),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Edited,
    Sent,
    Lost,
}

/// Puts the final text in place of the placeholder.
///
/// Waits out rate limits for up to [`FINAL_EDIT_ATTEMPTS`] edits, then falls back to
/// `send`, which reports whether a fresh message went out.
pub async fn deliver<E, EFut, S, SFut>(mut edit: E, send: S) -> Delivery
where
    E: FnMut() -> EFut,
    EFut: Future<Output = EditAttempt>,
    S: FnOnce() -> SFut,
    SFut: Future<Output = bool>,
{
    for _ in 0..FINAL_EDIT_ATTEMPTS {
        match edit().await {
            EditAttempt::Done => return Delivery::Edited,
            EditAttempt::RetryAfter(wait) => tokio::time::sleep(wait).await,
            EditAttempt::Failed => break,
        }
    }
    if send().await {
        Delivery::Sent
    } else {
        Delivery::Lost
    }
}

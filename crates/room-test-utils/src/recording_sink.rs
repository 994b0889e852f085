//! State sink recording every published update.

use room_client::events::{Notice, NoticeLevel, RoomState, StateSink, StateUpdate};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// How long `wait_for` waits before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Records every [`StateUpdate`] in publication order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<StateUpdate>>,
    notify: Notify,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update published so far.
    #[must_use]
    pub fn updates(&self) -> Vec<StateUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.updates.lock().unwrap().clear();
    }

    /// Number of recorded updates matching `pred`.
    pub fn count(&self, pred: impl Fn(&StateUpdate) -> bool) -> usize {
        self.updates.lock().unwrap().iter().filter(|&u| pred(u)).count()
    }

    /// Room states in the order they were published.
    #[must_use]
    pub fn room_states(&self) -> Vec<RoomState> {
        self.updates()
            .into_iter()
            .filter_map(|update| match update {
                StateUpdate::RoomState { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Notices shown so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.updates()
            .into_iter()
            .filter_map(|update| match update {
                StateUpdate::ShowNotification(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// Texts of error notices shown so far.
    #[must_use]
    pub fn error_notices(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
            .map(|notice| notice.text)
            .collect()
    }

    /// Wait until `count` updates matching `pred` have been recorded.
    ///
    /// # Panics
    ///
    /// Panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for_count(&self, count: usize, pred: impl Fn(&StateUpdate) -> bool) {
        let waited = tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.count(&pred) >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "timed out waiting for {count} matching state updates; recorded: {:#?}",
            self.updates()
        );
    }

    /// Wait until an update matching `pred` has been recorded.
    ///
    /// # Panics
    ///
    /// Panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for(&self, pred: impl Fn(&StateUpdate) -> bool) {
        self.wait_for_count(1, pred).await;
    }

    /// Wait until the room has entered `state` `count` times.
    pub async fn wait_for_state(&self, state: RoomState, count: usize) {
        self.wait_for_count(count, |update| {
            matches!(update, StateUpdate::RoomState { state: s } if *s == state)
        })
        .await;
    }
}

impl StateSink for RecordingSink {
    fn publish(&self, update: StateUpdate) {
        self.updates.lock().unwrap().push(update);
        self.notify.notify_waiters();
    }
}

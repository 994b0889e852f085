//! Mailbox monitoring for the room controller actor.
//!
//! | Level    | Depth    |
//! |----------|----------|
//! | Normal   | < 50     |
//! | Warning  | 50-200   |
//! | Critical | > 200    |
//!
//! Depth counts both user commands and collaborator events waiting to be
//! processed.

use crate::observability::metrics::set_actor_mailbox_depth;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth thresholds for the controller actor.
pub const CONTROLLER_MAILBOX_NORMAL: usize = 50;
pub const CONTROLLER_MAILBOX_WARNING: usize = 200;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Tracks queue depth of the controller mailbox and emits the depth gauge.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Room identifier for log context.
    room_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        let level = Self::level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "room.actor.mailbox",
                room_id = %self.room_id,
                depth = new_depth,
                threshold = CONTROLLER_MAILBOX_WARNING,
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning && new_depth == CONTROLLER_MAILBOX_NORMAL + 1 {
            // Log once when crossing into the warning band
            debug!(
                target: "room.actor.mailbox",
                room_id = %self.room_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
        set_actor_mailbox_depth(new_depth);
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        // Saturate at zero: a message sent before monitoring started may be
        // dequeued without a matching enqueue.
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        set_actor_mailbox_depth(previous.saturating_sub(1));
    }

    /// Undo a [`Self::record_enqueue`] whose message never reached the mailbox.
    pub fn record_send_failed(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        set_actor_mailbox_depth(previous.saturating_sub(1));
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        Self::level_for_depth(self.current_depth())
    }

    /// Reset peak depth counter.
    pub fn reset_peak(&self) {
        self.peak_depth
            .store(self.current_depth(), Ordering::Relaxed);
    }

    fn level_for_depth(depth: usize) -> MailboxLevel {
        if depth > CONTROLLER_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > CONTROLLER_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

//! Page-side activity monitor.
//!
//! One monitor lives in each page. It turns raw page signals (pointer,
//! keyboard, scroll, click, visibility) and the passage of time into the
//! messages the controller understands. Like the timer engine it never reads
//! a clock; callers feed it `now` and drain [`ActivityMonitor::poll`].

use chrono::{DateTime, Duration, Utc};

use crate::protocol::Message;

/// Ping cadence while the page is active.
pub const PING_INTERVAL_SECS: i64 = 5;
/// Interaction-free time after which the page reports inactivity.
pub const IDLE_AFTER_SECS: i64 = 30;
/// How often inactivity is checked.
pub const IDLE_CHECK_SECS: i64 = 30;

/// Raw interaction kinds that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    PointerMove,
    KeyPress,
    Scroll,
    Click,
}

#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    url: String,
    last_interaction: DateTime<Utc>,
    active: bool,
    next_ping: DateTime<Utc>,
    next_idle_check: DateTime<Utc>,
}

impl ActivityMonitor {
    /// Monitor for a page showing `url`, loaded at `now`.
    pub fn new(url: &str, now: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            last_interaction: now,
            active: true,
            next_ping: now + Duration::seconds(PING_INTERVAL_SECS),
            next_idle_check: now + Duration::seconds(IDLE_CHECK_SECS),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record an interaction. Returns a ping if the page was idle.
    pub fn on_interaction(&mut self, kind: Interaction, now: DateTime<Utc>) -> Option<Message> {
        tracing::trace!(?kind, url = %self.url, "page interaction");
        self.last_interaction = now;
        if self.active {
            return None;
        }
        self.active = true;
        Some(self.ping())
    }

    /// Page visibility changed.
    pub fn on_visibility(&mut self, hidden: bool, now: DateTime<Utc>) -> Message {
        if hidden {
            self.active = false;
            Message::TabHidden
        } else {
            self.active = true;
            self.last_interaction = now;
            Message::TabVisible {
                url: self.url.clone(),
            }
        }
    }

    /// Messages for every periodic check due at or before `now`, in time order.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            let ping_due = self.next_ping <= now;
            let check_due = self.next_idle_check <= now;
            if !ping_due && !check_due {
                break;
            }
            if ping_due && (!check_due || self.next_ping <= self.next_idle_check) {
                if self.active {
                    messages.push(self.ping());
                }
                self.next_ping += Duration::seconds(PING_INTERVAL_SECS);
            } else {
                let checked_at = self.next_idle_check;
                if checked_at - self.last_interaction > Duration::seconds(IDLE_AFTER_SECS) {
                    self.active = false;
                    messages.push(Message::InactivityNotification);
                }
                self.next_idle_check += Duration::seconds(IDLE_CHECK_SECS);
            }
        }
        messages
    }

    /// Earliest time [`ActivityMonitor::poll`] has something to check.
    pub fn next_deadline(&self) -> DateTime<Utc> {
        self.next_ping.min(self.next_idle_check)
    }

    fn ping(&self) -> Message {
        Message::ActivityPing {
            url: self.url.clone(),
        }
    }
}

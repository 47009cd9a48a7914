use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::TabId;

/// Why a running timer stopped decrementing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Another tab was activated.
    TabSwitch,
    TabClosed,
    /// The owning tab navigated to a URL outside the site.
    NavigatedAway,
    Inactive,
    Hidden,
    /// No activity signal within the watchdog window.
    Watchdog,
}

/// Every state change in the controller produces an Event.
/// The host bridge logs them; tests assert on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        site: String,
        tab_id: TabId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        site: String,
        tab_id: TabId,
        at: DateTime<Utc>,
    },
    TimerPaused {
        site: String,
        reason: PauseReason,
        at: DateTime<Utc>,
    },
    /// Allowance hit zero; the timer is gone.
    AllowanceExpired {
        site: String,
        category: String,
        index: usize,
        at: DateTime<Utc>,
    },
    /// A tab was sent to the block surface.
    SiteBlocked {
        site: String,
        tab_id: TabId,
        at: DateTime<Utc>,
    },
    AllowanceGranted {
        site: String,
        category: String,
        index: usize,
        secs: u64,
        at: DateTime<Utc>,
    },
    EnforcementToggled {
        enabled: bool,
        at: DateTime<Utc>,
    },
}

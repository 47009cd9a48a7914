//! Allowance timer registry.
//!
//! The engine holds at most one [`SiteTimer`] per site identifier and owns
//! the wakeup queue that drives them. It never reads a clock: every command
//! takes `now`, and the caller drains due wakeups with [`TimerEngine::poll_due`].
//! Persisted allowance is not touched here; the controller reads and writes
//! the store when a tick comes due.
//!
//! ## State Transitions
//!
//! ```text
//! (absent) -> Running <-> Paused
//! Running -> (absent)   on expiry
//! ```
//!
//! A paused timer has no tick scheduled, so nothing accrues while paused.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::wakeup::{WakeupQueue, WakeupTarget};
use crate::catalog::SiteRef;
use crate::events::{Event, PauseReason};
use crate::protocol::TabId;

/// Tick period.
pub const TICK_INTERVAL_SECS: i64 = 1;
/// How often the watchdog looks for stale timers.
pub const WATCHDOG_SWEEP_SECS: i64 = 60;
/// Running timers without activity for this long are force-paused.
pub const WATCHDOG_STALE_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Running,
    Paused,
}

/// In-memory countdown record for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTimer {
    pub site: SiteRef,
    pub state: TimerState,
    pub owner_tab: TabId,
    pub last_activity: DateTime<Utc>,
}

impl SiteTimer {
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }
}

/// A wakeup that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Due {
    Tick { key: String, at: DateTime<Utc> },
    WatchdogSweep { at: DateTime<Utc> },
}

#[derive(Debug)]
pub struct TimerEngine {
    timers: HashMap<String, SiteTimer>,
    wakeups: WakeupQueue,
}

impl TimerEngine {
    /// Create an empty engine whose first watchdog sweep is one period after `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut wakeups = WakeupQueue::new();
        wakeups.schedule(
            WakeupTarget::WatchdogSweep,
            now + Duration::seconds(WATCHDOG_SWEEP_SECS),
        );
        Self {
            timers: HashMap::new(),
            wakeups,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&SiteTimer> {
        self.timers.get(key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Identifiers of timers with a tick scheduled.
    pub fn running(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .timers
            .iter()
            .filter(|(_, t)| t.is_running())
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn tick_scheduled(&self, key: &str) -> bool {
        self.wakeups
            .is_scheduled(&WakeupTarget::Tick(key.to_string()))
    }

    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.wakeups.next_deadline()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the timer for `key`, or reset the existing one onto `site` and
    /// `tab`. Either way exactly one timer exists afterwards and it is running.
    pub fn start(
        &mut self,
        key: &str,
        site: SiteRef,
        tab: TabId,
        remaining_secs: u64,
        now: DateTime<Utc>,
    ) -> Event {
        let timer = SiteTimer {
            site,
            state: TimerState::Running,
            owner_tab: tab,
            last_activity: now,
        };
        match self.timers.insert(key.to_string(), timer) {
            Some(previous) if previous.is_running() => {
                // Keep the tick cadence of a timer that was already counting.
                if !self.tick_scheduled(key) {
                    self.schedule_tick(key, now);
                }
            }
            _ => self.schedule_tick(key, now),
        }
        tracing::debug!(site = key, tab, remaining_secs, "timer started");
        Event::TimerStarted {
            site: key.to_string(),
            tab_id: tab,
            remaining_secs,
            at: now,
        }
    }

    /// Unpause an existing timer and hand it to `tab`. Refreshes activity
    /// either way. Returns an event only when the timer was paused.
    pub fn resume(&mut self, key: &str, tab: TabId, now: DateTime<Utc>) -> Option<Event> {
        let timer = self.timers.get_mut(key)?;
        timer.owner_tab = tab;
        timer.last_activity = now;
        if timer.is_running() {
            return None;
        }
        timer.state = TimerState::Running;
        self.schedule_tick(key, now);
        tracing::debug!(site = key, tab, "timer resumed");
        Some(Event::TimerResumed {
            site: key.to_string(),
            tab_id: tab,
            at: now,
        })
    }

    /// Stop the tick for `key`. Accounting is kept.
    pub fn pause(&mut self, key: &str, reason: PauseReason, now: DateTime<Utc>) -> Option<Event> {
        let timer = self.timers.get_mut(key)?;
        if !timer.is_running() {
            return None;
        }
        timer.state = TimerState::Paused;
        self.wakeups.cancel(&WakeupTarget::Tick(key.to_string()));
        tracing::debug!(site = key, ?reason, "timer paused");
        Some(Event::TimerPaused {
            site: key.to_string(),
            reason,
            at: now,
        })
    }

    /// Pause every running timer other than `keep`.
    pub fn pause_all_except(
        &mut self,
        keep: Option<&str>,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let keys = self.select(|key, _| Some(key) != keep);
        self.pause_each(keys, reason, now)
    }

    /// Pause running timers owned by `tab`, other than `keep`.
    pub fn pause_owned_by(
        &mut self,
        tab: TabId,
        keep: Option<&str>,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let keys = self.select(|key, timer| timer.owner_tab == tab && Some(key) != keep);
        self.pause_each(keys, reason, now)
    }

    /// Record an activity signal without changing state.
    pub fn touch(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        match self.timers.get_mut(key) {
            Some(timer) => {
                timer.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// Drop the timer for `key` and its pending tick.
    pub fn remove(&mut self, key: &str) -> Option<SiteTimer> {
        self.wakeups.cancel(&WakeupTarget::Tick(key.to_string()));
        self.timers.remove(key)
    }

    /// Schedule the tick following one that fired at `at`.
    ///
    /// Missed periods are not replayed: if the next deadline is already in
    /// the past, the tick is pushed to one period after `now`.
    pub fn reschedule_tick(&mut self, key: &str, at: DateTime<Utc>, now: DateTime<Utc>) {
        if !self.timers.get(key).is_some_and(SiteTimer::is_running) {
            return;
        }
        let mut next = at + Duration::seconds(TICK_INTERVAL_SECS);
        if next <= now {
            next = now + Duration::seconds(TICK_INTERVAL_SECS);
        }
        self.wakeups.schedule(WakeupTarget::Tick(key.to_string()), next);
    }

    /// Pop the next wakeup due at or before `now`.
    ///
    /// Ticks for timers that are gone or paused are discarded here.
    pub fn poll_due(&mut self, now: DateTime<Utc>) -> Option<Due> {
        loop {
            let (target, at) = self.wakeups.pop_due(now)?;
            match target {
                WakeupTarget::WatchdogSweep => return Some(Due::WatchdogSweep { at }),
                WakeupTarget::Tick(key) => {
                    if self.timers.get(&key).is_some_and(SiteTimer::is_running) {
                        return Some(Due::Tick { key, at });
                    }
                    tracing::trace!(site = %key, "discarding stale tick");
                }
            }
        }
    }

    /// Force-pause running timers with no activity for
    /// [`WATCHDOG_STALE_SECS`], then schedule the next sweep.
    pub fn sweep(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Vec<Event> {
        let stale = Duration::seconds(WATCHDOG_STALE_SECS);
        let keys = self.select(|_, timer| now - timer.last_activity > stale);
        let events = self.pause_each(keys, PauseReason::Watchdog, now);
        let mut next = at + Duration::seconds(WATCHDOG_SWEEP_SECS);
        if next <= now {
            next = now + Duration::seconds(WATCHDOG_SWEEP_SECS);
        }
        self.wakeups.schedule(WakeupTarget::WatchdogSweep, next);
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn schedule_tick(&mut self, key: &str, now: DateTime<Utc>) {
        self.wakeups.schedule(
            WakeupTarget::Tick(key.to_string()),
            now + Duration::seconds(TICK_INTERVAL_SECS),
        );
    }

    /// Running timers satisfying `pred`, in key order.
    fn select(&self, pred: impl Fn(&str, &SiteTimer) -> bool) -> Vec<String> {
        let mut keys: Vec<String> = self
            .timers
            .iter()
            .filter(|(key, timer)| timer.is_running() && pred(key.as_str(), timer))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    fn pause_each(&mut self, keys: Vec<String>, reason: PauseReason, now: DateTime<Utc>) -> Vec<Event> {
        keys.iter()
            .filter_map(|key| self.pause(key, reason, now))
            .collect()
    }
}

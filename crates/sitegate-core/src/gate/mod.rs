//! Event-driven access controller.
//!
//! [`Controller`] is the single handler every host event goes through. It
//! owns the timer engine, the allowance store and the last known URL of each
//! tab, and turns events into [`HostCommand`]s.
//!
//! Store access happens inline while an event is handled, so a tick and an
//! unblock grant can never interleave between their read and their write.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = Controller::new(store, "block.html", Utc::now())?;
//! let outcome = controller.dispatch(event, Utc::now());
//! // Whenever controller.next_deadline() passes:
//! let outcome = controller.advance(Utc::now());
//! ```

mod access;
mod unblock;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::catalog::SiteRef;
use crate::error::Result;
use crate::events::{Event, PauseReason};
use crate::matcher::{find_site, UrlParts};
use crate::protocol::{BlockParams, HostCommand, HostEvent, Message, Reply, TabId};
use crate::storage::{AllowanceStore, StoredState};
use crate::timer::{Due, TimerEngine};

/// Everything an event produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub commands: Vec<HostCommand>,
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }

    /// Navigation commands only, as `(tab, url)`.
    pub fn navigations(&self) -> Vec<(TabId, &str)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                HostCommand::Navigate { tab_id, url } => Some((*tab_id, url.as_str())),
                HostCommand::Reply { .. } => None,
            })
            .collect()
    }

    /// The reply command, if the event was a message.
    pub fn reply(&self) -> Option<Reply> {
        self.commands.iter().find_map(|cmd| match cmd {
            HostCommand::Reply { reply, .. } => Some(*reply),
            HostCommand::Navigate { .. } => None,
        })
    }

    fn navigate(&mut self, tab_id: TabId, url: String) {
        self.commands.push(HostCommand::Navigate { tab_id, url });
    }

    fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }
}

pub struct Controller<S: AllowanceStore> {
    store: S,
    timers: TimerEngine,
    /// Last URL seen for each open tab.
    tabs: BTreeMap<TabId, String>,
    block_page: String,
}

impl<S: AllowanceStore> Controller<S> {
    /// Build a controller over `store`, installing the default catalog on
    /// first run.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn new(mut store: S, block_page: &str, now: DateTime<Utc>) -> Result<Self> {
        store.install()?;
        Ok(Self {
            store,
            timers: TimerEngine::new(now),
            tabs: BTreeMap::new(),
            block_page: block_page.to_string(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access, for edits made outside event handling.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn timers(&self) -> &TimerEngine {
        &self.timers
    }

    pub fn tab_url(&self, tab: TabId) -> Option<&str> {
        self.tabs.get(&tab).map(String::as_str)
    }

    /// When [`Controller::advance`] next has work to do.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// Handle one host event.
    pub fn dispatch(&mut self, event: HostEvent, now: DateTime<Utc>) -> Outcome {
        let mut out = Outcome::default();
        let result = match event {
            HostEvent::NavigationCompleted { tab_id, url } => {
                self.on_navigation(tab_id, &url, now, &mut out)
            }
            HostEvent::TabActivated { tab_id, url } => {
                self.on_activation(tab_id, &url, now, &mut out)
            }
            HostEvent::TabRemoved { tab_id } => {
                self.on_removal(tab_id, now, &mut out);
                Ok(())
            }
            HostEvent::Message {
                tab_id,
                tab_url,
                request_id,
                message,
            } => {
                if let Some(url) = tab_url {
                    self.tabs.insert(tab_id, url);
                }
                let (reply, result) = self.on_message(tab_id, message, now, &mut out);
                out.commands.push(HostCommand::Reply {
                    tab_id,
                    request_id,
                    reply,
                });
                result
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "event handling stopped early");
        }
        out
    }

    /// Run every wakeup due at or before `now`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Outcome {
        let mut out = Outcome::default();
        while let Some(due) = self.timers.poll_due(now) {
            match due {
                Due::Tick { key, at } => {
                    if let Err(e) = self.on_tick(&key, at, now, &mut out) {
                        tracing::warn!(site = %key, error = %e, "tick failed");
                        // Keep counting; the next tick re-reads the store.
                        self.timers.reschedule_tick(&key, at, now);
                    }
                }
                Due::WatchdogSweep { at } => {
                    let paused = self.timers.sweep(at, now);
                    if !paused.is_empty() {
                        tracing::info!(count = paused.len(), "watchdog paused stale timers");
                    }
                    out.extend(paused);
                }
            }
        }
        out
    }

    /// Turn enforcement on or off.
    ///
    /// # Errors
    /// Returns an error if the flag cannot be persisted.
    pub fn set_enabled(&mut self, enabled: bool, now: DateTime<Utc>) -> Result<Event> {
        self.store.save_enabled(enabled)?;
        tracing::info!(enabled, "enforcement toggled");
        Ok(Event::EnforcementToggled { enabled, at: now })
    }

    fn on_message(
        &mut self,
        tab: TabId,
        message: Message,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> (Reply, Result<()>) {
        match message {
            Message::UnblockSite {
                domain,
                category,
                index,
            } => {
                let site = SiteRef::new(category, index);
                match self.unblock(tab, &domain, &site, now, out) {
                    Ok(()) => (Reply::Unblock { success: true }, Ok(())),
                    Err(e) => (Reply::Unblock { success: false }, Err(e)),
                }
            }
            Message::ActivityPing { url } | Message::TabVisible { url } => {
                let result = self.on_activity(tab, &url, now, out);
                (Reply::Ack { received: true }, result)
            }
            Message::InactivityNotification => {
                let result = self.on_idle(tab, PauseReason::Inactive, now, out);
                (Reply::Ack { received: true }, result)
            }
            Message::TabHidden => {
                let result = self.on_idle(tab, PauseReason::Hidden, now, out);
                (Reply::Ack { received: true }, result)
            }
        }
    }

    /// One allowance second for `key`.
    fn on_tick(
        &mut self,
        key: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        let Some(timer) = self.timers.get(key) else {
            return Ok(());
        };
        let site = timer.site.clone();
        let StoredState {
            enabled,
            mut catalog,
        } = self.store.load()?;

        let current = match catalog.get(&site) {
            Ok(entry) if entry.identifier == key => entry.time_remaining,
            _ => {
                tracing::info!(site = key, "catalog entry moved or removed, dropping timer");
                self.timers.remove(key);
                return Ok(());
            }
        };

        let remaining = if current > 0 {
            let remaining = catalog.decrement(&site)?;
            self.store.save_catalog(&catalog)?;
            remaining
        } else {
            0
        };

        if remaining == 0 {
            self.expire(key, &site, enabled, now, out);
        } else {
            self.timers.reschedule_tick(key, at, now);
        }
        Ok(())
    }

    /// Allowance for `key` is gone: drop the timer and send every tab still
    /// on the site to the block surface.
    fn expire(
        &mut self,
        key: &str,
        site: &SiteRef,
        enabled: bool,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) {
        self.timers.remove(key);
        tracing::info!(site = key, "allowance expired");
        out.events.push(Event::AllowanceExpired {
            site: key.to_string(),
            category: site.category.clone(),
            index: site.index,
            at: now,
        });
        if !enabled {
            return;
        }

        let on_site: Vec<(TabId, String)> = self
            .tabs
            .iter()
            .filter_map(|(tab, url)| {
                let parts = UrlParts::parse(url);
                parts.matches(key).then(|| (*tab, parts.host))
            })
            .collect();
        for (tab, host) in on_site {
            self.redirect_to_block(tab, &host, key, site, now, out);
        }
    }

    fn redirect_to_block(
        &mut self,
        tab: TabId,
        host: &str,
        key: &str,
        site: &SiteRef,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) {
        let url = BlockParams::new(host, site).to_url(&self.block_page);
        tracing::info!(tab, site = key, "redirecting to block page");
        self.tabs.insert(tab, url.clone());
        out.navigate(tab, url);
        out.events.push(Event::SiteBlocked {
            site: key.to_string(),
            tab_id: tab,
            at: now,
        });
    }

    /// Resolve `url` against the stored catalog.
    fn lookup(&self, url: &str) -> Result<Lookup> {
        let parts = UrlParts::parse(url);
        let state = self.store.load()?;
        let hit = find_site(&state.catalog, &parts).map(|hit| Resolved {
            key: hit.entry.identifier.clone(),
            site: hit.site,
            remaining: hit.entry.time_remaining,
        });
        Ok(Lookup {
            enabled: state.enabled,
            parts,
            hit,
        })
    }
}

/// Result of resolving a URL.
struct Lookup {
    enabled: bool,
    parts: UrlParts,
    hit: Option<Resolved>,
}

/// A tracked site a URL resolved to.
struct Resolved {
    /// Catalog identifier, also the timer key.
    key: String,
    site: SiteRef,
    remaining: u64,
}

//! Navigation, activation and page-signal handling.

use chrono::{DateTime, Utc};

use super::{Controller, Outcome};
use crate::error::Result;
use crate::events::PauseReason;
use crate::protocol::TabId;
use crate::storage::AllowanceStore;

impl<S: AllowanceStore> Controller<S> {
    /// A tab finished loading `url`.
    pub(super) fn on_navigation(
        &mut self,
        tab: TabId,
        url: &str,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        self.tabs.insert(tab, url.to_string());
        let lookup = self.lookup(url)?;

        // Leaving a site stops its timer even while enforcement is off.
        let keep = lookup.hit.as_ref().map(|hit| hit.key.as_str());
        out.extend(
            self.timers
                .pause_owned_by(tab, keep, PauseReason::NavigatedAway, now),
        );
        if !lookup.enabled {
            return Ok(());
        }

        let Some(hit) = lookup.hit else {
            return Ok(());
        };
        if hit.remaining == 0 {
            // Only reachable if the store was zeroed outside a tick.
            self.timers.remove(&hit.key);
            self.redirect_to_block(tab, &lookup.parts.host, &hit.key, &hit.site, now, out);
        } else {
            let event = self.timers.start(&hit.key, hit.site, tab, hit.remaining, now);
            out.events.push(event);
        }
        Ok(())
    }

    /// Focus moved to `tab`. Everything else stops counting before the
    /// activated site's timer is resumed.
    pub(super) fn on_activation(
        &mut self,
        tab: TabId,
        url: &str,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        self.tabs.insert(tab, url.to_string());
        let lookup = match self.lookup(url) {
            Ok(lookup) => lookup,
            Err(e) => {
                out.extend(self.timers.pause_all_except(None, PauseReason::TabSwitch, now));
                return Err(e);
            }
        };

        let keep = lookup.hit.as_ref().map(|hit| hit.key.as_str());
        out.extend(self.timers.pause_all_except(keep, PauseReason::TabSwitch, now));

        let Some(hit) = lookup.hit else {
            return Ok(());
        };
        if self.timers.get(&hit.key).is_some() {
            out.extend(self.timers.resume(&hit.key, tab, now));
        } else if lookup.enabled && hit.remaining > 0 {
            let event = self.timers.start(&hit.key, hit.site, tab, hit.remaining, now);
            out.events.push(event);
        }
        Ok(())
    }

    /// `tab` closed. Its timers stop but keep their accounting.
    pub(super) fn on_removal(&mut self, tab: TabId, now: DateTime<Utc>, out: &mut Outcome) {
        self.tabs.remove(&tab);
        out.extend(
            self.timers
                .pause_owned_by(tab, None, PauseReason::TabClosed, now),
        );
    }

    /// Activity ping or visibility restore from a page showing `url`.
    pub(super) fn on_activity(
        &mut self,
        tab: TabId,
        url: &str,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        self.tabs.insert(tab, url.to_string());
        let lookup = self.lookup(url)?;
        let Some(hit) = lookup.hit else {
            return Ok(());
        };
        if self.timers.get(&hit.key).is_none() {
            return Ok(());
        }
        out.extend(self.timers.pause_owned_by(
            tab,
            Some(hit.key.as_str()),
            PauseReason::NavigatedAway,
            now,
        ));
        out.extend(self.timers.resume(&hit.key, tab, now));
        Ok(())
    }

    /// Inactivity or hidden signal from `tab`. The site is taken from the
    /// tab's last known URL.
    pub(super) fn on_idle(
        &mut self,
        tab: TabId,
        reason: PauseReason,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        let Some(url) = self.tabs.get(&tab).cloned() else {
            return Ok(());
        };
        let lookup = self.lookup(&url)?;
        if let Some(hit) = lookup.hit {
            out.extend(self.timers.pause(&hit.key, reason, now));
        }
        Ok(())
    }
}

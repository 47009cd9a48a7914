//! Allowance grants.

use chrono::{DateTime, Utc};

use super::{Controller, Outcome};
use crate::catalog::{SiteRef, GRANT_SECS};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::protocol::TabId;
use crate::storage::AllowanceStore;

impl<S: AllowanceStore> Controller<S> {
    /// Set `site` to [`GRANT_SECS`] of allowance, whatever it had left.
    ///
    /// # Errors
    /// Returns an error if the site is not in the catalog or the store fails.
    pub fn grant(&mut self, site: &SiteRef, now: DateTime<Utc>) -> Result<Event> {
        let mut state = self.store.load()?;
        let identifier = state.catalog.grant(site)?.identifier.clone();
        self.store.save_catalog(&state.catalog)?;
        tracing::info!(site = %identifier, category = %site.category, index = site.index, "allowance granted");
        Ok(Event::AllowanceGranted {
            site: identifier,
            category: site.category.clone(),
            index: site.index,
            secs: GRANT_SECS,
            at: now,
        })
    }

    /// Unblock request from the block surface: grant, then send the tab
    /// back to the site.
    pub(super) fn unblock(
        &mut self,
        tab: TabId,
        domain: &str,
        site: &SiteRef,
        now: DateTime<Utc>,
        out: &mut Outcome,
    ) -> Result<()> {
        if domain.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "domain".into(),
                message: "empty".into(),
            }
            .into());
        }
        out.events.push(self.grant(site, now)?);
        let url = format!("https://{domain}");
        self.tabs.insert(tab, url.clone());
        out.navigate(tab, url);
        Ok(())
    }
}

//! Tracked sites grouped into categories.
//!
//! The catalog is persisted under the `blockedSites` key. Category order and
//! entry order are significant: the matcher walks them in order and the
//! first hit wins, so the map is an [`IndexMap`] rather than a `HashMap`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Seconds granted by an unblock or extend action.
pub const GRANT_SECS: u64 = 900;

/// Identifier of the one path-qualified entry in the catalog.
pub const SHORTS_IDENTIFIER: &str = "youtube.com/shorts";

/// One trackable destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    /// Domain, or domain plus path prefix for the Shorts entry.
    #[serde(rename = "url")]
    pub identifier: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default = "default_true")]
    pub blocked: bool,
    /// Remaining allowance in seconds.
    #[serde(default)]
    pub time_remaining: u64,
}

fn default_true() -> bool {
    true
}

impl SiteEntry {
    pub fn new(identifier: &str, display_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            blocked: true,
            time_remaining: 0,
        }
    }

    /// Label for the popup action button.
    pub fn action_label(&self) -> &'static str {
        if self.time_remaining > 0 {
            "Extend"
        } else {
            "Unblock"
        }
    }
}

/// Reference to an entry by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteRef {
    pub category: String,
    pub index: usize,
}

impl SiteRef {
    pub fn new(category: impl Into<String>, index: usize) -> Self {
        Self {
            category: category.into(),
            index,
        }
    }
}

/// Ordered mapping category name -> entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    categories: IndexMap<String, Vec<SiteEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog written on install.
    pub fn default_catalog() -> Self {
        let mut catalog = Self::new();
        catalog.push_category(
            "socialMedia",
            vec![
                SiteEntry::new("facebook.com", "Facebook"),
                SiteEntry::new("x.com", "X"),
                SiteEntry::new("instagram.com", "Instagram"),
                SiteEntry::new("linkedin.com", "LinkedIn"),
            ],
        );
        catalog.push_category(
            "shopping",
            vec![
                SiteEntry::new("amazon.in", "Amazon"),
                SiteEntry::new("flipkart.com", "FlipKart"),
                SiteEntry::new("myntra.com", "Myntra"),
                SiteEntry::new("meesho.com", "Meesho"),
                SiteEntry::new("ebay.com", "eBay"),
                SiteEntry::new("walmart.com", "Walmart"),
            ],
        );
        catalog.push_category(
            "ott",
            vec![
                SiteEntry::new("netflix.com", "Netflix"),
                SiteEntry::new(SHORTS_IDENTIFIER, "YouTube Shorts"),
                SiteEntry::new("primevideo.com", "Prime Video"),
                SiteEntry::new("hotstar.com", "JioHotstar"),
                SiteEntry::new("sonyliv.com", "SonyLiv"),
                SiteEntry::new("jiocinema.com", "JioCinema"),
                SiteEntry::new("mxplayer.in", "Amazon MX player"),
            ],
        );
        catalog
    }

    /// Append a category, replacing one with the same name in place.
    pub fn push_category(&mut self, name: &str, entries: Vec<SiteEntry>) {
        self.categories.insert(name.to_string(), entries);
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[SiteEntry])> {
        self.categories
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// Every entry with its position, in match order.
    pub fn entries(&self) -> impl Iterator<Item = (SiteRef, &SiteEntry)> {
        self.categories.iter().flat_map(|(name, entries)| {
            entries
                .iter()
                .enumerate()
                .map(move |(index, entry)| (SiteRef::new(name.as_str(), index), entry))
        })
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, site: &SiteRef) -> Result<&SiteEntry, ValidationError> {
        let entries = self
            .categories
            .get(&site.category)
            .ok_or_else(|| ValidationError::UnknownCategory(site.category.clone()))?;
        let len = entries.len();
        entries.get(site.index).ok_or(ValidationError::OutOfBounds {
            collection: site.category.clone(),
            index: site.index,
            len,
        })
    }

    pub fn get_mut(&mut self, site: &SiteRef) -> Result<&mut SiteEntry, ValidationError> {
        let entries = self
            .categories
            .get_mut(&site.category)
            .ok_or_else(|| ValidationError::UnknownCategory(site.category.clone()))?;
        let len = entries.len();
        entries.get_mut(site.index).ok_or(ValidationError::OutOfBounds {
            collection: site.category.clone(),
            index: site.index,
            len,
        })
    }

    /// Set the allowance of `site` to [`GRANT_SECS`], whatever it was before.
    pub fn grant(&mut self, site: &SiteRef) -> Result<&SiteEntry, ValidationError> {
        let entry = self.get_mut(site)?;
        entry.time_remaining = GRANT_SECS;
        Ok(entry)
    }

    /// Take one second off `site`. Returns the new remaining value.
    ///
    /// Never goes below zero.
    pub fn decrement(&mut self, site: &SiteRef) -> Result<u64, ValidationError> {
        let entry = self.get_mut(site)?;
        entry.time_remaining = entry.time_remaining.saturating_sub(1);
        Ok(entry.time_remaining)
    }
}

/// Format seconds as `m:ss`.
pub fn format_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

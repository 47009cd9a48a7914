//! URL to catalog entry resolution.
//!
//! Hosts are compared with a plain substring test, so `m.facebook.com` and
//! `facebook.com.evil.example` both hit `facebook.com`. The one path-qualified
//! entry (YouTube Shorts) needs an exact host and a `/shorts` path prefix.

use url::Url;

use crate::catalog::{Catalog, SiteEntry, SiteRef, SHORTS_IDENTIFIER};

const SHORTS_HOST: &str = "youtube.com";
const SHORTS_PATH: &str = "/shorts";

/// Host (without a leading `www.`) and path of a navigated URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlParts {
    pub host: String,
    pub path: String,
}

impl UrlParts {
    /// Split `url`. Unparseable input yields empty parts.
    pub fn parse(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or_default();
                let host = host.strip_prefix("www.").unwrap_or(host);
                Self {
                    host: host.to_string(),
                    path: parsed.path().to_string(),
                }
            }
            Err(_) => Self::default(),
        }
    }

    pub fn is_shorts(&self) -> bool {
        self.host == SHORTS_HOST && self.path.starts_with(SHORTS_PATH)
    }

    /// Whether this URL is on the site named by `identifier`.
    pub fn matches(&self, identifier: &str) -> bool {
        if self.host.is_empty() {
            return false;
        }
        if identifier == SHORTS_IDENTIFIER {
            self.is_shorts()
        } else {
            self.host.contains(identifier)
        }
    }
}

/// A catalog hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMatch<'a> {
    pub site: SiteRef,
    pub entry: &'a SiteEntry,
}

/// First entry of `catalog` that `parts` matches, in catalog order.
pub fn find_site<'a>(catalog: &'a Catalog, parts: &UrlParts) -> Option<SiteMatch<'a>> {
    catalog
        .entries()
        .find(|(_, entry)| parts.matches(&entry.identifier))
        .map(|(site, entry)| SiteMatch { site, entry })
}

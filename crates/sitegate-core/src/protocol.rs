//! Wire types exchanged with the browser host.
//!
//! Inbound: tab lifecycle events and page/block-surface messages.
//! Outbound: navigation commands and message replies. All types are JSON
//! with camelCase fields so a thin extension shim can forward them verbatim.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::catalog::SiteRef;
use crate::error::ValidationError;

/// Browser tab identifier.
pub type TabId = u64;

/// Messages sent by the page monitor or the block surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    UnblockSite {
        domain: String,
        category: String,
        index: usize,
    },
    ActivityPing {
        url: String,
    },
    InactivityNotification,
    TabHidden,
    TabVisible {
        url: String,
    },
}

/// Reply to a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Unblock { success: bool },
    Ack { received: bool },
}

/// Events delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// A tab finished loading `url`.
    #[serde(rename_all = "camelCase")]
    NavigationCompleted { tab_id: TabId, url: String },
    /// Focus moved to a tab currently showing `url`.
    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId, url: String },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    /// A message from a page in `tab_id`. `tab_url` is the sender tab's URL
    /// as the host reports it.
    #[serde(rename_all = "camelCase")]
    Message {
        tab_id: TabId,
        #[serde(default)]
        tab_url: Option<String>,
        /// Correlates the reply with the request.
        #[serde(default)]
        request_id: Option<u64>,
        message: Message,
    },
}

/// Commands for the host to carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    #[serde(rename_all = "camelCase")]
    Navigate { tab_id: TabId, url: String },
    #[serde(rename_all = "camelCase")]
    Reply {
        tab_id: TabId,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        reply: Reply,
    },
}

/// Parameters carried by the block surface address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    pub domain: String,
    pub category: String,
    pub index: usize,
}

impl BlockParams {
    pub fn new(domain: &str, site: &SiteRef) -> Self {
        Self {
            domain: domain.to_string(),
            category: site.category.clone(),
            index: site.index,
        }
    }

    /// `<page>?domain=..&category=..&index=..`, appended with `&` when
    /// `page` already has a query.
    pub fn to_url(&self, page: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("domain", &self.domain)
            .append_pair("category", &self.category)
            .append_pair("index", &self.index.to_string())
            .finish();
        let sep = match page.find('?') {
            None => "?",
            Some(i) if i + 1 == page.len() || page.ends_with('&') => "",
            Some(_) => "&",
        };
        format!("{page}{sep}{query}")
    }

    /// Parse the query part of a block surface address (with or without
    /// the leading `?`, or a whole address).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let query = input.split_once('?').map_or(input, |(_, q)| q);
        let mut domain = None;
        let mut category = None;
        let mut index = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "domain" => domain = Some(value.into_owned()),
                "category" => category = Some(value.into_owned()),
                "index" => {
                    index = Some(value.parse::<usize>().map_err(|e| {
                        ValidationError::InvalidValue {
                            field: "index".into(),
                            message: format!("'{value}': {e}"),
                        }
                    })?)
                }
                _ => {}
            }
        }
        let missing = |field: &str| ValidationError::InvalidValue {
            field: field.to_string(),
            message: "missing".into(),
        };
        Ok(Self {
            domain: domain.ok_or_else(|| missing("domain"))?,
            category: category.ok_or_else(|| missing("category"))?,
            index: index.ok_or_else(|| missing("index"))?,
        })
    }

    /// The message the block surface sends when the user clicks Unblock.
    pub fn unblock_message(&self) -> Message {
        Message::UnblockSite {
            domain: self.domain.clone(),
            category: self.category.clone(),
            index: self.index,
        }
    }

    pub fn site(&self) -> SiteRef {
        SiteRef::new(self.category.as_str(), self.index)
    }
}

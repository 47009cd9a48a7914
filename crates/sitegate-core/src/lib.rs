//! # sitegate Core Library
//!
//! Core logic for a timed website access controller: distracting sites are
//! blocked until the user asks for time, and the granted allowance counts
//! down only while the site is actually in use.
//!
//! The browser is an external collaborator. It feeds [`HostEvent`]s in and
//! carries out the [`HostCommand`]s that come back; nothing in this crate
//! reads a clock or spawns a thread.
//!
//! ## Architecture
//!
//! - **Matcher**: URL to catalog entry resolution
//! - **Storage**: the allowance store trait, a SQLite key-value store and
//!   TOML configuration
//! - **Timer Engine**: per-site countdown state machine on a wakeup queue
//! - **Gate**: the event handler tying the above together, plus grants
//! - **Activity**: page-side monitor producing activity messages
//!
//! ## Key Components
//!
//! - [`Controller`]: single entry point for host events and due wakeups
//! - [`TimerEngine`]: timer registry
//! - [`AllowanceStore`]: persistence seam
//! - [`Config`]: application configuration management

pub mod activity;
pub mod catalog;
pub mod error;
pub mod events;
pub mod gate;
pub mod matcher;
pub mod protocol;
pub mod storage;
pub mod timer;

pub use activity::{ActivityMonitor, Interaction};
pub use catalog::{format_remaining, Catalog, SiteEntry, SiteRef, GRANT_SECS};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::{Event, PauseReason};
pub use gate::{Controller, Outcome};
pub use matcher::{find_site, SiteMatch, UrlParts};
pub use protocol::{BlockParams, HostCommand, HostEvent, Message, Reply, TabId};
pub use storage::{AllowanceStore, Config, Database, MemoryStore, StoredState};
pub use timer::{TimerEngine, TimerState};

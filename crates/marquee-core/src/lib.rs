//! Marquee Core - player presentation and offline license renewal
//!
//! This crate provides the pieces of a video app that sit between the
//! player engine and the screen:
//! - A presentation state machine deriving chrome state from player events
//! - The chrome overlay model (auto-hide, scrub bar, time labels)
//! - A player controller with scoped event subscriptions
//! - A scheduler that periodically renews licenses of cached DRM content
//! - The offline library, catalog loading and network policy around it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Marquee Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   player events ──► ┌──────────────┐     ┌──────────────┐       │
//! │                     │  Controller  │ ──► │ Presentation │       │
//! │   user input ─────► │              │ ◄── │   Machine    │       │
//! │                     └──────┬───────┘     └──────────────┘       │
//! │                            │                                    │
//! │                     ┌──────┴───────┐                            │
//! │                     │    Chrome    │                            │
//! │                     │   Overlay    │                            │
//! │                     └──────────────┘                            │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐     ┌──────────────┐       │
//! │  │   Catalog    │ ─►│   Offline    │ ──► │   Renewal    │       │
//! │  │              │   │   Library    │     │  Scheduler   │       │
//! │  └──────────────┘   └──────────────┘     └──────┬───────┘       │
//! │                                                 │               │
//! │                     ┌──────────────┐     ┌──────┴───────┐       │
//! │                     │   Network    │     │   Renewal    │       │
//! │                     │   Monitor    │     │    Store     │       │
//! │                     └──────────────┘     └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod presentation;
pub mod chrome;
pub mod controller;
pub mod drm;
pub mod store;
pub mod renewal;
pub mod offline;
pub mod catalog;
pub mod network;

pub use error::{Error, Result};
pub use types::*;
pub use presentation::{transition, Affordances, Effect, PresentationMachine, Transition};
pub use chrome::{format_clock, ChromeOverlay};
pub use controller::{
    Listener, ListenerId, Player, PlayerChrome, PlayerController, PlayerSetup, PlayerSlot, Subscription,
};
pub use drm::{DrmConfig, LicenseRenewer, LogRenewer};
pub use store::{JsonFileStore, MemoryStore, RenewalRecord, RenewalStore};
pub use renewal::{AnchoredClock, Clock, RenewalScheduler, SystemClock};
pub use offline::{OfflineItem, OfflineLibrary};
pub use catalog::{Catalog, Content, Section, Stream};
pub use network::{Connection, DownloadPolicy, NetworkMonitor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}

//! Offcast Core - Download Session Coordination
//!
//! This crate provides the client-side state model for a streaming SDK's
//! offline downloads:
//! - an authoritative, insertion-ordered mapping of download records
//! - reconciliation against SDK event pushes and full-list fetches
//! - the single-active-download policy enforced on resume
//! - change notification for presentation layers
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       Offcast Core                         │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │   ┌──────────────┐        ┌─────────────────────────┐      │
//! │   │  SDK Client  │ events │       Download          │      │
//! │   │   Boundary   ├───────▶│      Coordinator        │      │
//! │   │  (external)  │◀───────┤  mapping + liveness     │      │
//! │   └──────────────┘ control└───────────┬─────────────┘      │
//! │                                       │ snapshot / watch   │
//! │                              ┌────────┴────────┐           │
//! │                              │  Presentation   │           │
//! │                              │ Layer (external)│           │
//! │                              └─────────────────┘           │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Playback, DRM licensing, transport, and on-device storage all live in
//! the native SDK behind the boundary trait; nothing here decodes video
//! or talks to the network.

pub mod boundary;
pub mod coordinator;
pub mod error;
pub mod helpers;
pub mod sim;
pub mod types;

pub use boundary::{EventBatch, EventSubscription, SdkClient};
pub use coordinator::DownloadCoordinator;
pub use error::{Error, Result};
pub use sim::SimulatedSdk;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Offcast Core initialized");
}

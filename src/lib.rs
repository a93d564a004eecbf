//! # castlink
//!
//! A control bridge between an application UI and cast-capable devices on
//! the local network.
//!
//! ## Features
//!
//! - Device discovery via mDNS
//! - Secure sessions with primary/fallback client certificates
//! - Receiver application launch and media playback control
//! - Wi-Fi pairing over the device's private settings channel
//! - Named events with JSON payloads for the host
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use castlink::state::EventBus;
//! use castlink::testing::{MockLink, MockTransport};
//! use castlink::{CastConfig, SessionController};
//!
//! # async fn example() -> Result<(), castlink::CastError> {
//! let config = CastConfig::default();
//!
//! // Discover devices
//! let devices = castlink::scan(&config).await?;
//!
//! if let Some(device) = devices.first() {
//!     let registry = Arc::new(castlink::discovery::DeviceRegistry::new());
//!     registry.insert(device.clone()).await;
//!
//!     // Connect and launch the receiver application
//!     let transport = Arc::new(MockTransport::new(Arc::new(MockLink::new())));
//!     let session =
//!         SessionController::new(&config, transport, registry, Arc::new(EventBus::new()));
//!     session.connect_to_device(&device.id, "receiver").await?;
//!
//!     // Control playback
//!     session.set_volume(50.0).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **High-level**: `CastBridge` - fire-and-forget commands, events only
//! - **Mid-level**: `SessionController` - awaitable commands on one session
//! - **Low-level**: negotiation, media and pairing primitives over the
//!   `DeviceTransport` / `DeviceLink` traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Boundary events
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod bridge;
pub mod connection;
pub mod control;
pub mod discovery;
pub mod net;
pub mod session;

// Re-exports
pub use bridge::CastBridge;
pub use connection::{DeviceLink, DeviceNotification, DeviceTransport, PrivateSettings};
pub use control::volume::Volume;
pub use discovery::{DeviceScanner, scan};
pub use error::{CastError, Result};
pub use session::SessionController;
pub use state::{CastEvent, ErrorCode, EventBus, EventSink};
pub use types::{
    CastConfig, CastDevice, ConnectionState, Metadata, PlaybackStatus, PlayerState, PrepareParams,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        CastBridge, CastConfig, CastDevice, CastError, CastEvent, ErrorCode, EventSink,
        PlayerState, SessionController, Volume, scan,
    };
}

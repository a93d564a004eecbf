//! Device discovery

mod mdns;
mod registry;
mod session;

pub use mdns::{MdnsScanner, parse_device};
pub use registry::DeviceRegistry;
pub use session::{DiscoverySession, DiscoveryTiming};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CastConfig, CastDevice};

/// Source of scan rounds for a `DiscoverySession`
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    /// Devices visible during a scan of `window`; finding none is not an error
    async fn scan(&self, window: Duration) -> Result<Vec<CastDevice>>;
}

/// Scan for devices once
///
/// # Example
///
/// ```rust,no_run
/// use castlink::CastConfig;
/// use castlink::discovery::scan;
///
/// # async fn example() -> Result<(), castlink::CastError> {
/// let devices = scan(&CastConfig::default()).await?;
///
/// for device in devices {
///     println!("{}: {}", device.name, device.address());
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the mDNS daemon cannot be initialized.
pub async fn scan(config: &CastConfig) -> Result<Vec<CastDevice>> {
    MdnsScanner::new(config.service_type.clone())
        .scan(config.scan_window)
        .await
}

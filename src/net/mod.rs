//! Network plumbing: bounded operations and secure channel material

pub mod secure;


pub use secure::{CertificateVariant, SecureChannelConfig, SecureChannelFactory};

use std::future::Future;
use std::time::Duration;

use crate::error::{CastError, Result};

/// Run a fallible device call, failing with `CastError::Timeout` after `duration`
///
/// # Errors
///
/// Returns the call's own error, or `Timeout` if it did not complete in time.
pub async fn bounded<F, T>(operation: &str, duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, duration);
            Err(CastError::Timeout {
                operation: operation.to_string(),
                duration,
            })
        }
    }
}

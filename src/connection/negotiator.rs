//! Certificate-failover connection negotiation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::transport::{DeviceConnection, DeviceTransport};
use crate::error::{CastError, Result};
use crate::net::{CertificateVariant, SecureChannelFactory, bounded};
use crate::state::ErrorCode;
use crate::types::CastDevice;

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
    /// No negotiation has run since the last reset
    #[default]
    Idle,
    /// Attempt in progress with the given certificate
    Connecting(CertificateVariant),
    /// Connected with the given certificate
    Connected(CertificateVariant),
    /// Both certificates failed
    Failed,
}

impl NegotiationState {
    /// Check if an attempt is in progress
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(self, NegotiationState::Connecting(_))
    }

    /// Check if the last negotiation succeeded
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, NegotiationState::Connected(_))
    }
}

/// Result of a successful negotiation
#[derive(Debug)]
pub struct Negotiated {
    /// Established connection
    pub connection: DeviceConnection,
    /// Certificate the device accepted
    pub variant: CertificateVariant,
    /// Number of certificate variants tried, including the successful one
    pub attempts: u32,
}

/// Connects to devices, falling back to the legacy client certificate once
pub struct ConnectionNegotiator {
    transport: Arc<dyn DeviceTransport>,
    channels: SecureChannelFactory,
    timeout: Duration,
    state: RwLock<NegotiationState>,
    /// Serializes negotiations, continuation included
    gate: Mutex<()>,
}

impl ConnectionNegotiator {
    /// Create a negotiator; every attempt is bounded by `timeout`
    #[must_use]
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        channels: SecureChannelFactory,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            channels,
            timeout,
            state: RwLock::new(NegotiationState::Idle),
            gate: Mutex::new(()),
        }
    }

    /// Get current negotiation state
    pub async fn state(&self) -> NegotiationState {
        *self.state.read().await
    }

    /// Return to `Idle` after the session dropped its connection
    pub async fn reset(&self) {
        self.set_state(NegotiationState::Idle).await;
    }

    /// Connect to `device` and hand the connection to `on_connected`.
    ///
    /// The primary certificate is tried first and the fallback exactly once
    /// after it. Concurrent calls wait for each other.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` tagged `CONNECT_FAILED` if both certificates
    /// fail, or whatever `on_connected` returns.
    pub async fn negotiate<T, F, Fut>(&self, device: &CastDevice, on_connected: F) -> Result<T>
    where
        F: FnOnce(Negotiated) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _gate = self.gate.lock().await;
        let negotiated = self.attempt_all(device).await?;
        on_connected(negotiated).await
    }

    /// Connect to `device` without a continuation
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` tagged `CONNECT_FAILED` if both certificates fail.
    pub async fn establish(&self, device: &CastDevice) -> Result<Negotiated> {
        self.negotiate(device, |negotiated| async move { Ok(negotiated) })
            .await
    }

    async fn attempt_all(&self, device: &CastDevice) -> Result<Negotiated> {
        let mut attempts = 0;
        let mut last_error = None;

        for variant in CertificateVariant::ATTEMPT_ORDER {
            attempts += 1;
            self.set_state(NegotiationState::Connecting(variant)).await;

            match self.attempt(device, variant).await {
                Ok(connection) => {
                    self.set_state(NegotiationState::Connected(variant)).await;
                    tracing::info!(
                        "Connected to {} with {:?} certificate after {} attempt(s)",
                        device.name,
                        variant,
                        attempts
                    );
                    return Ok(Negotiated {
                        connection,
                        variant,
                        attempts,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Connection to {} with {:?} certificate failed: {}",
                        device.name,
                        variant,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        self.set_state(NegotiationState::Failed).await;
        Err(CastError::ConnectionFailed {
            device_name: device.name.clone(),
            message: format!("no certificate accepted after {attempts} attempts"),
            source: last_error
                .map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
        .tagged(ErrorCode::ConnectFailed))
    }

    async fn attempt(
        &self,
        device: &CastDevice,
        variant: CertificateVariant,
    ) -> Result<DeviceConnection> {
        let channel = self.channels.build_variant(variant)?;
        tracing::debug!(
            "Connecting to {} at {}:{}",
            device.name,
            device.address(),
            device.port
        );
        bounded(
            "connect",
            self.timeout,
            self.transport.connect(device, &channel),
        )
        .await
    }

    async fn set_state(&self, new_state: NegotiationState) {
        let mut state = self.state.write().await;
        if *state != new_state {
            tracing::debug!("Negotiation state: {:?} -> {:?}", *state, new_state);
            *state = new_state;
        }
    }
}

//! Session controller
//!
//! Owns the single selected device, its link and the media binding. Every
//! selection and every disconnect starts a new generation; completions that
//! belong to an older generation are dropped instead of being reported.
//!
//! Operations report failures through the event sink as one error code each
//! and also return them to the caller.

mod pump;
#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use self::pump::NotificationPump;
use crate::connection::{
    ConnectionNegotiator, DeviceConnection, DeviceLink, DeviceTransport, NegotiationState,
};
use crate::control::{MediaCommandQueue, PairingController, PlayerStateTracker};
use crate::discovery::DeviceRegistry;
use crate::error::{CastError, Result};
use crate::net::{SecureChannelFactory, bounded};
use crate::state::{CastEvent, DeviceSummary, ErrorCode, EventSink};
use crate::types::{
    AccessPoint, AccessPointParams, CastConfig, CastDevice, ConnectionState, PlayerState,
    PrepareParams,
};

/// Mutable session data, guarded by one lock that is never held across a device call
#[derive(Default)]
struct SessionState {
    device: Option<CastDevice>,
    application: Option<String>,
    queue: Option<MediaCommandQueue>,
    tracker: PlayerStateTracker,
    generation: u64,
    connection: ConnectionState,
    pump: Option<JoinHandle<()>>,
}

/// Session controller
pub struct SessionController {
    registry: Arc<DeviceRegistry>,
    negotiator: ConnectionNegotiator,
    sink: Arc<dyn EventSink>,
    timeout: Duration,
    state: Arc<Mutex<SessionState>>,
    /// Serializes reconnects so concurrent commands share one new link
    reconnect: Mutex<()>,
}

impl SessionController {
    /// Create a controller with no selected device
    #[must_use]
    pub fn new(
        config: &CastConfig,
        transport: Arc<dyn DeviceTransport>,
        registry: Arc<DeviceRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let negotiator = ConnectionNegotiator::new(
            transport,
            SecureChannelFactory::new(config.certificates.clone()),
            config.operation_timeout,
        );

        Self {
            registry,
            negotiator,
            sink,
            timeout: config.operation_timeout,
            state: Arc::new(Mutex::new(SessionState::default())),
            reconnect: Mutex::new(()),
        }
    }

    /// The registry devices are selected from
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Currently selected device
    pub async fn selected_device(&self) -> Option<CastDevice> {
        self.state.lock().await.device.clone()
    }

    /// Receiver application of the current session
    pub async fn application_name(&self) -> Option<String> {
        self.state.lock().await.application.clone()
    }

    /// Connection state of the current session
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    /// Last known remote player state
    pub async fn player_state(&self) -> Option<PlayerState> {
        self.state.lock().await.tracker.last()
    }

    /// Current session generation
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// State of the certificate negotiation
    pub async fn negotiation_state(&self) -> NegotiationState {
        self.negotiator.state().await
    }

    // ===== Session lifecycle =====

    /// Select a discovered device and prepare it for pairing.
    ///
    /// Emits `PIN_NEEDED` once the device answered a firmware query.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown id, or the connection or
    /// settings failure; each is reported as `PAIRING_ERROR` except a failed
    /// negotiation, which stays `CONNECT_FAILED`.
    pub async fn pair_device(&self, device_id: &str) -> Result<()> {
        let Some(device) = self.registry.get(device_id).await else {
            let generation = self.generation().await;
            let err = CastError::DeviceNotFound {
                device_id: device_id.to_string(),
            };
            return self.report(generation, ErrorCode::Pairing, Err(err)).await;
        };

        tracing::info!("Pairing with {}", device.name);
        let generation = self.select(device.clone(), None).await;
        let result = self.pair(&device, generation).await;
        self.report(generation, ErrorCode::Pairing, result).await
    }

    /// Select a discovered device, connect and launch `application` on it.
    ///
    /// Emits `DEVICE_CONNECTED` once the application is running.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` for an unknown id, or the connection or launch
    /// failure; each is reported as `CONNECT_FAILED`.
    pub async fn connect_to_device(&self, device_id: &str, application: &str) -> Result<()> {
        let Some(device) = self.registry.get(device_id).await else {
            let generation = self.generation().await;
            let err = CastError::DeviceNotFound {
                device_id: device_id.to_string(),
            };
            return self.report(generation, ErrorCode::ConnectFailed, Err(err)).await;
        };

        tracing::info!("Connecting to {} for {}", device.name, application);
        let application = Some(application.to_string());
        let generation = self.select(device.clone(), application.clone()).await;
        let result = self.open(&device, generation, application).await.map(|_| ());
        self.report(generation, ErrorCode::ConnectFailed, result).await
    }

    /// Bind to the connected session, reconnecting first if the link is gone.
    ///
    /// A live session is returned without touching the transport.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if no device is selected, or the reconnection failure.
    pub async fn ensure_connected(&self) -> Result<MediaCommandQueue> {
        let (device, application, queue, generation) = {
            let state = self.state.lock().await;
            let device = state.device.clone().ok_or(CastError::NotConnected)?;
            let queue = state
                .queue
                .clone()
                .filter(|queue| state.connection.is_connected() && queue.link().is_connected());
            (
                device,
                state.application.clone(),
                queue,
                state.generation,
            )
        };

        if let Some(queue) = queue {
            tracing::debug!("{} is connected", device.name);
            return Ok(queue);
        }

        let _reconnect = self.reconnect.lock().await;
        let stale = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return Err(CastError::SessionSuperseded);
            }
            // Another command may have reconnected while we waited
            if let Some(queue) = state.queue.clone() {
                if state.connection.is_connected() && queue.link().is_connected() {
                    tracing::debug!("{} was reconnected concurrently", device.name);
                    return Ok(queue);
                }
            }
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
            state.connection = ConnectionState::Connecting;
            state.queue.take()
        };

        tracing::info!("{} is not connected, reconnecting", device.name);
        if let Some(queue) = stale {
            self.abandon(queue.link()).await;
        }
        self.open(&device, generation, application).await
    }

    /// Tear down the session and emit `DEVICE_DISCONNECTED`.
    ///
    /// The device stays selected so a later command reconnects it. Without a
    /// selected device this does nothing.
    ///
    /// # Errors
    ///
    /// Returns the device failure to close the link; it is never reported as an event.
    pub async fn disconnect(&self) -> Result<()> {
        let (device, queue) = {
            let mut state = self.state.lock().await;
            let Some(device) = state.device.clone() else {
                tracing::debug!("Disconnect without a selected device");
                return Ok(());
            };
            state.generation += 1;
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
            state.tracker.reset();
            state.connection = ConnectionState::Disconnected;
            (device, state.queue.take())
        };

        self.negotiator.reset().await;
        self.registry
            .set_state(&device.id, ConnectionState::Disconnected)
            .await;

        if let Some(queue) = queue {
            if let Err(e) = bounded("disconnect", self.timeout, queue.link().disconnect()).await {
                tracing::warn!("Failed to disconnect from {}: {}", device.name, e);
                return Err(e);
            }
        }

        tracing::info!("Disconnected from {}", device.name);
        self.sink
            .emit(CastEvent::DeviceDisconnected(DeviceSummary::from(&device)));
        Ok(())
    }

    // ===== Media commands =====

    /// Load media into the receiver
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `CAST_FAILED`.
    pub async fn cast_media(&self, params: PrepareParams) -> Result<()> {
        self.command(ErrorCode::CastFailed, |queue, _| async move {
            queue.prepare(&params).await?;
            tracing::info!("Media prepared: {}", params.title);
            Ok(())
        })
        .await
    }

    /// Resume playback if the player is paused
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `RESUME_FAILED`.
    pub async fn resume(&self) -> Result<()> {
        self.command(ErrorCode::ResumeFailed, |queue, generation| async move {
            if !self.tracker().await.should_resume() {
                tracing::debug!("Player is not paused, resume skipped");
                return Ok(());
            }
            queue.resume().await?;
            self.update_tracker(generation, PlayerStateTracker::confirm_resumed)
                .await
        })
        .await
    }

    /// Pause playback if the player is playing
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `PAUSE_FAILED`.
    pub async fn pause(&self) -> Result<()> {
        self.command(ErrorCode::PauseFailed, |queue, generation| async move {
            if !self.tracker().await.should_pause() {
                tracing::debug!("Player is not playing, pause skipped");
                return Ok(());
            }
            queue.pause().await?;
            self.update_tracker(generation, PlayerStateTracker::confirm_paused)
                .await
        })
        .await
    }

    /// Seek to `position_ms`, resuming a paused player first
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `SEEK_FAILED`, or `RESUME_FAILED` when
    /// the preceding resume failed and no seek was sent.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.command(ErrorCode::SeekFailed, |queue, generation| async move {
            if self.tracker().await.needs_resume_before_seek() {
                queue.resume().await?;
                self.update_tracker(generation, PlayerStateTracker::confirm_resumed)
                    .await?;
            }
            queue.seek(position_ms).await
        })
        .await
    }

    /// Stop playback
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `STOP_FAILED`.
    pub async fn stop(&self) -> Result<()> {
        self.command(ErrorCode::StopFailed, |queue, _| async move {
            queue.stop().await
        })
        .await
    }

    /// Set volume from a 0 - 100 level
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `VOLUME_FAILED`.
    pub async fn set_volume(&self, percent: f64) -> Result<()> {
        self.command(ErrorCode::VolumeFailed, |queue, _| async move {
            queue.set_volume(percent).await
        })
        .await
    }

    /// Mute or unmute
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `MUTE_FAILED`.
    pub async fn set_mute(&self, muted: bool) -> Result<()> {
        self.command(ErrorCode::MuteFailed, |queue, _| async move {
            queue.set_mute(muted).await
        })
        .await
    }

    /// Enable an audio track
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `SETTING_TRACK_FAILED`.
    pub async fn set_audio_track(&self, track_id: &str) -> Result<()> {
        self.command(ErrorCode::SettingTrackFailed, |queue, _| async move {
            queue.set_audio_track(track_id).await
        })
        .await
    }

    /// Pull metadata and emit `METADATA_CHANGED`
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `METADATA_UPDATE_FAILED`.
    pub async fn update_metadata(&self) -> Result<()> {
        self.command(
            ErrorCode::MetadataUpdateFailed,
            |queue, generation| async move {
                let metadata = queue.metadata().await?;
                self.emit_current(generation, CastEvent::MetadataChanged(metadata))
                    .await
            },
        )
        .await
    }

    /// Pull playback status, record its state and emit `PLAYBACK_STATUS_CHANGED`
    ///
    /// # Errors
    ///
    /// Returns the failure reported as `PLAYBACK_STATUS_UPDATE_FAILED`.
    pub async fn update_playback_status(&self) -> Result<()> {
        self.command(
            ErrorCode::PlaybackStatusUpdateFailed,
            |queue, generation| async move {
                let status = queue.playback_status().await?;
                self.update_tracker(generation, |tracker| tracker.observe(&status))
                    .await?;
                self.sink.emit(CastEvent::PlaybackStatusChanged(status));
                Ok(())
            },
        )
        .await
    }

    // ===== Pairing commands =====

    /// Scan for access points and emit `AP_LIST_OBTAINED`
    ///
    /// # Errors
    ///
    /// Returns the failure, or an empty scan, reported as `PAIRING_ERROR`.
    pub async fn scan_access_points(&self, pin_code: u32) -> Result<()> {
        self.command(ErrorCode::Pairing, |queue, generation| async move {
            let pairing = PairingController::for_link(queue.link().as_ref(), self.timeout)?;
            let access_points = pairing.scan_access_points(pin_code).await?;
            self.emit_current(
                generation,
                CastEvent::ApListObtained {
                    pin_code,
                    access_points,
                },
            )
            .await
        })
        .await
    }

    /// Access points from the last scan; failures are only logged
    ///
    /// # Errors
    ///
    /// Returns the failure; it is never reported as an event.
    pub async fn access_points(&self) -> Result<Vec<AccessPoint>> {
        let result = match self.pairing().await {
            Ok(pairing) => pairing.access_points().await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(access_points) => {
                tracing::info!("Device reports {} access point(s)", access_points.len());
            }
            Err(e) => tracing::warn!("Access point list unavailable: {}", e),
        }
        result
    }

    /// Join the device to an access point and emit `DEVICE_PAIRED`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` or the device failure, reported as `PAIRING_ERROR`.
    pub async fn set_access_point(&self, params: AccessPointParams) -> Result<()> {
        if let Err(e) = params.validate() {
            let generation = self.generation().await;
            return self.report(generation, ErrorCode::Pairing, Err(e)).await;
        }

        self.command(ErrorCode::Pairing, |queue, generation| async move {
            let pairing = PairingController::for_link(queue.link().as_ref(), self.timeout)?;
            pairing.set_access_point(&params).await?;

            let device = self
                .state
                .lock()
                .await
                .device
                .clone()
                .ok_or(CastError::NotConnected)?;
            self.emit_current(
                generation,
                CastEvent::DevicePaired(DeviceSummary::from(&device)),
            )
            .await
        })
        .await
    }

    /// Rename the device; failures are only logged
    ///
    /// # Errors
    ///
    /// Returns the failure; it is never reported as an event.
    pub async fn set_device_name(&self, name: &str) -> Result<()> {
        let result = match self.pairing().await {
            Ok(pairing) => pairing.set_device_name(name).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("Device renamed to {}", name),
            Err(e) => tracing::warn!("Failed to rename device: {}", e),
        }
        result
    }

    /// Reset the device settings; failures are only logged
    ///
    /// # Errors
    ///
    /// Returns the failure; it is never reported as an event.
    pub async fn reset(&self) -> Result<()> {
        let result = match self.pairing().await {
            Ok(pairing) => pairing.reset().await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("Device settings reset"),
            Err(e) => tracing::warn!("Failed to reset device: {}", e),
        }
        result
    }

    // ===== Internals =====

    /// Make `device` the selected device and start a new generation
    async fn select(&self, device: CastDevice, application: Option<String>) -> u64 {
        let device_id = device.id.clone();
        let (previous, generation) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
            let previous_id = state.device.take().map(|d| d.id);
            let previous_queue = state.queue.take();
            state.device = Some(device);
            state.application = application;
            state.tracker.reset();
            state.connection = ConnectionState::Connecting;
            ((previous_id, previous_queue), state.generation)
        };

        let (previous_id, previous_queue) = previous;
        if let Some(queue) = previous_queue {
            self.abandon(queue.link()).await;
        }
        if let Some(id) = previous_id.filter(|id| *id != device_id) {
            self.registry
                .set_state(&id, ConnectionState::Disconnected)
                .await;
        }
        self.registry
            .set_state(&device_id, ConnectionState::Connecting)
            .await;

        tracing::debug!("Selected {} as generation {}", device_id, generation);
        generation
    }

    /// Negotiate, query the firmware and emit `PIN_NEEDED`
    async fn pair(&self, device: &CastDevice, generation: u64) -> Result<()> {
        let result = self
            .negotiator
            .negotiate(device, |negotiated| async move {
                let link = Arc::clone(&negotiated.connection.link);
                let version = match PairingController::for_link(link.as_ref(), self.timeout) {
                    Ok(pairing) => pairing.version_info().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = version {
                    self.abandon(&link).await;
                    return Err(e);
                }
                self.install(generation, device, negotiated.connection)
                    .await
            })
            .await;

        match result {
            Ok(_) => {
                self.emit_current(generation, CastEvent::PinNeeded(DeviceSummary::from(device)))
                    .await
            }
            Err(e) => {
                self.mark_failed(generation, &device.id).await;
                Err(e)
            }
        }
    }

    /// Negotiate and, when an application is named, launch it and emit
    /// `DEVICE_CONNECTED`. A pairing session reconnects without either.
    async fn open(
        &self,
        device: &CastDevice,
        generation: u64,
        application: Option<String>,
    ) -> Result<MediaCommandQueue> {
        let launched = application.is_some();
        let result = self
            .negotiator
            .negotiate(device, |negotiated| async move {
                let link = Arc::clone(&negotiated.connection.link);
                if let Some(application) = application.as_deref() {
                    let launcher = MediaCommandQueue::new(Arc::clone(&link), self.timeout);
                    if let Err(e) = launcher.launch(application).await {
                        self.abandon(&link).await;
                        return Err(e);
                    }
                }
                self.install(generation, device, negotiated.connection)
                    .await
            })
            .await;

        match result {
            Ok(queue) if launched => {
                self.emit_current(
                    generation,
                    CastEvent::DeviceConnected(DeviceSummary::from(device)),
                )
                .await?;
                tracing::info!("Session ready on {}", device.name);
                Ok(queue)
            }
            Ok(queue) => {
                tracing::debug!("Settings link to {} restored", device.name);
                Ok(queue)
            }
            Err(e) => {
                self.mark_failed(generation, &device.id).await;
                Err(e)
            }
        }
    }

    /// Bind a fresh connection to the session if `generation` is still current
    async fn install(
        &self,
        generation: u64,
        device: &CastDevice,
        connection: DeviceConnection,
    ) -> Result<MediaCommandQueue> {
        let DeviceConnection {
            link,
            notifications,
        } = connection;
        let queue = MediaCommandQueue::new(Arc::clone(&link), self.timeout);

        let previous = {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                if let Some(pump) = state.pump.take() {
                    pump.abort();
                }
                let previous = state.queue.replace(queue.clone());
                state.connection = ConnectionState::Connected;
                let pump = NotificationPump {
                    state: Arc::clone(&self.state),
                    sink: Arc::clone(&self.sink),
                    registry: Arc::clone(&self.registry),
                    device_id: device.id.clone(),
                    generation,
                    timeout: self.timeout,
                };
                state.pump = Some(pump.spawn(notifications));
                Some(previous)
            } else {
                None
            }
        };

        let Some(previous) = previous else {
            self.abandon(&link).await;
            return Err(CastError::SessionSuperseded);
        };
        if let Some(previous) = previous.filter(|p| !Arc::ptr_eq(p.link(), &link)) {
            self.abandon(previous.link()).await;
        }

        self.registry
            .set_state(&device.id, ConnectionState::Connected)
            .await;
        Ok(queue)
    }

    /// Run a command against the connected session and report its failure
    async fn command<T, F, Fut>(&self, code: ErrorCode, operation: F) -> Result<T>
    where
        F: FnOnce(MediaCommandQueue, u64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let generation = self.generation().await;
        let result = match self.ensure_connected().await {
            Ok(queue) => operation(queue, generation).await,
            Err(e) => Err(e),
        };
        self.report(generation, code, result).await
    }

    async fn pairing(&self) -> Result<PairingController> {
        let queue = self.ensure_connected().await?;
        PairingController::for_link(queue.link().as_ref(), self.timeout)
    }

    /// Emit an error event for a failure of the current generation
    async fn report<T>(&self, generation: u64, code: ErrorCode, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let current = self.state.lock().await.generation == generation;
            if e.is_superseded() || !current {
                tracing::debug!("Discarding completion of a superseded session: {}", e);
            } else {
                let code = e.code_or(code);
                tracing::warn!("{}: {}", code, e);
                self.sink.emit(CastEvent::Error(code));
            }
        }
        result
    }

    async fn emit_current(&self, generation: u64, event: CastEvent) -> Result<()> {
        if self.state.lock().await.generation != generation {
            return Err(CastError::SessionSuperseded);
        }
        self.sink.emit(event);
        Ok(())
    }

    async fn tracker(&self) -> PlayerStateTracker {
        self.state.lock().await.tracker
    }

    async fn update_tracker<F>(&self, generation: u64, update: F) -> Result<()>
    where
        F: FnOnce(&mut PlayerStateTracker),
    {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Err(CastError::SessionSuperseded);
        }
        update(&mut state.tracker);
        Ok(())
    }

    async fn mark_failed(&self, generation: u64, device_id: &str) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return;
            }
            state.connection = ConnectionState::Disconnected;
        }
        self.registry
            .set_state(device_id, ConnectionState::Disconnected)
            .await;
    }

    async fn abandon(&self, link: &Arc<dyn DeviceLink>) {
        if let Err(e) = bounded("disconnect", self.timeout, link.disconnect()).await {
            tracing::warn!("Failed to close unused link: {}", e);
        }
    }
}

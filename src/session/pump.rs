//! Forwarding of device notifications for one session generation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::SessionState;
use crate::connection::DeviceNotification;
use crate::discovery::DeviceRegistry;
use crate::net::bounded;
use crate::state::{CastEvent, ErrorCode, EventSink};
use crate::types::ConnectionState;

pub(super) struct NotificationPump {
    pub(super) state: Arc<Mutex<SessionState>>,
    pub(super) sink: Arc<dyn EventSink>,
    pub(super) registry: Arc<DeviceRegistry>,
    pub(super) device_id: String,
    pub(super) generation: u64,
    pub(super) timeout: Duration,
}

impl NotificationPump {
    pub(super) fn spawn(
        self,
        notifications: mpsc::Receiver<DeviceNotification>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(notifications))
    }

    async fn run(self, mut notifications: mpsc::Receiver<DeviceNotification>) {
        while let Some(notification) = notifications.recv().await {
            match notification {
                DeviceNotification::StatusChanged(status) => {
                    {
                        let mut state = self.state.lock().await;
                        if state.generation != self.generation {
                            break;
                        }
                        state.tracker.observe(&status);
                    }
                    self.sink.emit(CastEvent::PlaybackStatusChanged(status));
                }
                DeviceNotification::MetadataChanged(metadata) => {
                    if self.state.lock().await.generation != self.generation {
                        break;
                    }
                    self.sink.emit(CastEvent::MetadataChanged(metadata));
                }
                DeviceNotification::ChannelFailed { message } => {
                    tracing::warn!("Device channel failed: {}", message);
                    let stale = {
                        let mut state = self.state.lock().await;
                        if state.generation != self.generation {
                            break;
                        }
                        state.connection = ConnectionState::Disconnected;
                        // Our own handle; dropping it detaches this task
                        state.pump = None;
                        state.queue.take()
                    };
                    if let Some(queue) = stale {
                        let closing = queue.link().disconnect();
                        if let Err(e) = bounded("disconnect", self.timeout, closing).await {
                            tracing::warn!("Failed to close failed link: {}", e);
                        }
                    }
                    self.registry
                        .set_state(&self.device_id, ConnectionState::Disconnected)
                        .await;
                    self.sink.emit(CastEvent::Error(ErrorCode::DeviceError));
                    break;
                }
            }
        }
        tracing::debug!("Notification pump for generation {} ended", self.generation);
    }
}

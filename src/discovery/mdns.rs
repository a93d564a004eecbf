//! mDNS scanner

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::DeviceScanner;
use crate::error::{CastError, Result};
use crate::types::{CastDevice, ConnectionState};

/// Scanner browsing an mDNS service type for one window per round
#[derive(Debug, Clone)]
pub struct MdnsScanner {
    service_type: String,
}

impl MdnsScanner {
    /// Browse `service_type` (e.g. `"_ocast._tcp.local."`)
    #[must_use]
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
        }
    }

    /// The browsed service type
    #[must_use]
    pub fn service_type(&self) -> &str {
        &self.service_type
    }
}

#[async_trait]
impl DeviceScanner for MdnsScanner {
    async fn scan(&self, window: Duration) -> Result<Vec<CastDevice>> {
        let mdns = mdns_sd::ServiceDaemon::new().map_err(|e| CastError::DiscoveryFailed {
            message: format!("Failed to create mDNS daemon: {e}"),
            source: Some(Box::new(e)),
        })?;

        let receiver =
            mdns.browse(&self.service_type)
                .map_err(|e| CastError::DiscoveryFailed {
                    message: format!("Failed to browse {}: {e}", self.service_type),
                    source: Some(Box::new(e)),
                })?;
        let mut stream = receiver.into_stream();

        let mut devices: HashMap<String, CastDevice> = HashMap::new();
        let mut fullnames: HashMap<String, String> = HashMap::new();
        let deadline = tokio::time::Instant::now() + window;

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                event = stream.next() => match event {
                    Some(mdns_sd::ServiceEvent::ServiceResolved(info)) => {
                        if let Some(device) = device_from_info(&info, &self.service_type) {
                            fullnames.insert(info.get_fullname().to_string(), device.id.clone());
                            devices.insert(device.id.clone(), device);
                        }
                    }
                    Some(mdns_sd::ServiceEvent::ServiceRemoved(_, fullname)) => {
                        if let Some(id) = fullnames.remove(&fullname) {
                            devices.remove(&id);
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        let _ = mdns.stop_browse(&self.service_type);
        let _ = mdns.shutdown();

        Ok(devices.into_values().collect())
    }
}

fn device_from_info(info: &mdns_sd::ServiceInfo, service_type: &str) -> Option<CastDevice> {
    let txt_records: HashMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();
    let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();

    parse_device(
        info.get_fullname(),
        service_type,
        addresses,
        info.get_port(),
        txt_records,
    )
}

/// Build a device from a resolved service.
///
/// The id comes from the `id`/`deviceid` TXT keys, else the full service
/// name; the display name from `fn`/`name`, else the instance name. Services
/// without an address are skipped.
#[must_use]
pub fn parse_device(
    fullname: &str,
    service_type: &str,
    addresses: Vec<IpAddr>,
    port: u16,
    txt_records: HashMap<String, String>,
) -> Option<CastDevice> {
    if addresses.is_empty() {
        tracing::debug!("Skipping {} without address", fullname);
        return None;
    }

    let id = txt_records
        .get("id")
        .or_else(|| txt_records.get("deviceid"))
        .filter(|id| !id.is_empty())
        .cloned()
        .unwrap_or_else(|| fullname.to_string());

    let name = txt_records
        .get("fn")
        .or_else(|| txt_records.get("name"))
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| instance_name(fullname, service_type));

    Some(CastDevice {
        id,
        name,
        model: txt_records.get("md").or_else(|| txt_records.get("model")).cloned(),
        addresses,
        port,
        txt_records,
        state: ConnectionState::Disconnected,
    })
}

fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(service_type)
        .map(|instance| instance.trim_end_matches('.'))
        .filter(|instance| !instance.is_empty())
        .or_else(|| fullname.split('.').next())
        .unwrap_or(fullname)
        .to_string()
}

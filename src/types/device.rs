use std::collections::HashMap;
use std::net::IpAddr;

/// Connection state of a discovered device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Negotiation in progress
    Connecting,
    /// Connected and ready
    Connected,
}

impl ConnectionState {
    /// Check if fully connected
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Represents a cast-capable device discovered on the network
#[derive(Debug, Clone, PartialEq)]
pub struct CastDevice {
    /// Stable device identifier (e.g. the UPnP/mDNS unique id)
    pub id: String,

    /// Human-readable device name (e.g., "Living Room Stick")
    pub name: String,

    /// Device model identifier, when advertised
    pub model: Option<String>,

    /// Resolved IP addresses
    pub addresses: Vec<IpAddr>,

    /// Control service port
    pub port: u16,

    /// Raw TXT record data
    pub txt_records: HashMap<String, String>,

    /// Last known connection state
    pub state: ConnectionState,
}

impl CastDevice {
    /// Create a device with a single address and no TXT records
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: IpAddr, port: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: None,
            addresses: vec![address],
            port,
            txt_records: HashMap::new(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Address to connect to: IPv4 first, then routable IPv6, then anything.
    ///
    /// Unspecified when discovery resolved no address.
    #[must_use]
    pub fn address(&self) -> IpAddr {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| {
                self.addresses
                    .iter()
                    .find(|addr| matches!(addr, IpAddr::V6(v6) if v6.segments()[0] != 0xfe80))
            })
            .or_else(|| self.addresses.first())
            .copied()
            .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
    }

    /// Refresh discovery-provided fields from a newer sighting.
    ///
    /// The connection state is session-owned and survives the merge.
    pub fn merge(&mut self, newer: CastDevice) {
        let state = self.state;
        *self = newer;
        self.state = state;
    }
}

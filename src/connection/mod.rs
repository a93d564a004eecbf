//! Device connections: SDK seams and certificate negotiation

mod negotiator;
mod transport;

pub use negotiator::{ConnectionNegotiator, Negotiated, NegotiationState};
pub use transport::{
    DeviceConnection, DeviceLink, DeviceNotification, DeviceTransport, PrivateSettings,
};

//! Media and pairing control

pub mod media;
pub mod pairing;
pub mod volume;

#[cfg(test)]
mod tests;

pub use media::{MediaCommandQueue, PlayerStateTracker, seek_position};
pub use pairing::PairingController;
pub use volume::Volume;

//! Boundary events

mod events;

pub use events::{
    CallbackSink, CastEvent, DeviceSummary, ErrorCode, EventBus, EventFilter, EventSink,
};

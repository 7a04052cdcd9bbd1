//! Typed status event bus
//!
//! Replaces string-keyed signal emission with an explicit event enumeration
//! and an observer registry. The dispatcher publishes; any number of UI
//! observers subscribe, either with synchronous handlers or through a
//! broadcast receiver.

pub mod bus;
pub mod events;

pub use bus::{EventBus, EventFilter, SubscriptionId};
pub use events::{EventCategory, LogStamp, StatusEvent};

//! # CNCAction Core
//!
//! Core vocabulary for the CNCAction command dispatch layer:
//! - Machine-level types (task modes, trajectory modes, axes, faults)
//! - The dispatch error taxonomy
//! - A typed status event bus connecting the dispatcher to UI observers

pub mod error;
pub mod event_bus;
pub mod machine;

pub use error::{DispatchError, Result};

pub use machine::{
    fault_codes, Axis, CoordinateSystem, ExecState, JointType, MachineFault, SequenceOutcome,
    TaskMode, TrajMode, WaitOutcome,
};

pub use event_bus::{
    EventBus, EventCategory, EventFilter, LogStamp, StatusEvent, SubscriptionId,
};

//! # CNCAction Dispatch
//!
//! The command dispatch facade: the single choke point through which operator
//! intent reaches a CNC machine-control runtime. Every state-changing
//! operation funnels through the mode guard, the blocking MDI and custom-code
//! sequencers handle timeouts and machine faults uniformly, and homing and
//! jogging requests are validated against the machine configuration before
//! anything touches the command port.
//!
//! The machine itself sits behind two injected seams, [`CommandPort`] and
//! [`StatusSource`]; [`sim::SimMachine`] implements both for tests and demos.

pub mod config;
pub mod facade;
pub mod homing;
pub mod jog;
pub mod ports;
pub mod sim;

pub use config::MachineConfig;
pub use facade::{Dispatcher, ModeChange, DEFAULT_WAIT};
pub use jog::{JogInput, JogSettings};
pub use ports::{
    AutoOp, CommandPort, HomeTarget, JogTarget, MachinePower, SpindleOp, StatusSource,
};

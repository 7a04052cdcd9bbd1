//! # CNCAction
//!
//! A command dispatch facade for CNC machine control. Operator intent
//! (homing, jogging, MDI blocks, offset writes, program control) is funneled
//! through one mode-guarded dispatcher that validates requests against the
//! machine configuration, sequences blocking commands with uniform timeout
//! and fault handling, and publishes status events to whoever is watching.
//!
//! ## Architecture
//!
//! CNCAction is organized as a workspace:
//!
//! 1. **cncaction-core** - machine vocabulary, error taxonomy, status event bus
//! 2. **cncaction-dispatch** - the dispatcher, its port traits, configuration,
//!    and a simulated machine
//! 3. **cncaction** - demo binary driving a simulated machine

pub use cncaction_core::{
    fault_codes, Axis, CoordinateSystem, DispatchError, EventBus, EventCategory, EventFilter,
    ExecState, JointType, LogStamp, MachineFault, Result, SequenceOutcome, StatusEvent,
    SubscriptionId, TaskMode, TrajMode, WaitOutcome,
};

pub use cncaction_dispatch::{
    AutoOp, CommandPort, Dispatcher, HomeTarget, JogInput, JogSettings, JogTarget, MachineConfig,
    MachinePower, ModeChange, SpindleOp, StatusSource,
};

pub use cncaction_dispatch::sim;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Console output with pretty formatting, `RUST_LOG` environment variable
/// support, INFO level by default.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

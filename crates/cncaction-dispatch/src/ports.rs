//! Port traits for the machine-control runtime
//!
//! The dispatcher talks to the machine through two explicit seams: a
//! [`CommandPort`] that issues commands and a [`StatusSource`] that reports
//! state. Both are injected at construction; production code wires them to
//! the real control runtime, tests and the demo binary wire them to
//! [`crate::sim::SimMachine`].

use cncaction_core::{Axis, ExecState, JointType, MachineFault, TaskMode, TrajMode, WaitOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Target of a homing or unhoming command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeTarget {
    /// Every configured joint at once (requires the home-all capability)
    All,
    /// A single joint by index
    Joint(usize),
}

/// Target of a jog command
///
/// In free (joint) trajectory mode jogs address joints by index; otherwise
/// they address axes by letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogTarget {
    /// Joint jog by joint index
    Joint(usize),
    /// Axis jog by axis letter
    Axis(Axis),
}

/// Machine power/estop state requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachinePower {
    /// Enter emergency stop
    Estop,
    /// Leave emergency stop (machine stays off)
    EstopReset,
    /// Power the machine on
    On,
    /// Power the machine off
    Off,
}

/// Program execution commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOp {
    /// Start (or restart) the loaded program at the given line
    Run {
        /// Source line to start from; 0 runs from the beginning.
        line: u32,
    },
    /// Pause execution
    Pause,
    /// Resume paused execution
    Resume,
    /// Execute a single line while paused
    Step,
}

/// Spindle commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpindleOp {
    /// Spin forward at the given speed
    Forward {
        /// Target speed in RPM.
        rpm: f64,
    },
    /// Spin in reverse at the given speed
    Reverse {
        /// Target speed in RPM.
        rpm: f64,
    },
    /// Step the speed up
    Increase,
    /// Step the speed down
    Decrease,
    /// Stop the spindle
    Off,
}

/// The Machine Command Port
///
/// Commands are asynchronous at the machine; completion of the most recent
/// command is observed through [`wait_complete`](CommandPort::wait_complete).
/// The dispatcher guarantees at most one outstanding blocking wait at a time.
pub trait CommandPort {
    /// Request a task mode change
    fn set_task_mode(&mut self, mode: TaskMode);

    /// Block up to `timeout` for the most recent command to complete
    fn wait_complete(&mut self, timeout: Duration) -> WaitOutcome;

    /// Submit one MDI command line
    fn submit_mdi(&mut self, line: &str);

    /// Abort whatever the task layer is doing
    fn abort(&mut self);

    /// Begin homing
    fn home(&mut self, target: HomeTarget);

    /// Drop the position reference
    fn unhome(&mut self, target: HomeTarget);

    /// Enable or disable teleoperation mode
    fn set_teleop(&mut self, enable: bool);

    /// Change machine power/estop state
    fn set_machine_state(&mut self, power: MachinePower);

    /// Program execution control
    fn auto(&mut self, op: AutoOp);

    /// Stop a jog in progress (no-op at the machine if none is)
    fn jog_stop(&mut self, target: JogTarget);

    /// Start a continuous jog at the signed velocity (units per second)
    fn jog_continuous(&mut self, target: JogTarget, velocity: f64);

    /// Jog a bounded increment at the signed velocity
    fn jog_increment(&mut self, target: JogTarget, velocity: f64, distance: f64);

    /// Toggle the hard-limit override latch
    fn override_limits(&mut self);

    /// Spindle control for one spindle
    fn spindle(&mut self, spindle: usize, op: SpindleOp);

    /// Flood coolant on/off
    fn set_flood(&mut self, on: bool);

    /// Mist coolant on/off
    fn set_mist(&mut self, on: bool);

    /// Honor optional-stop (M1) on/off
    fn set_optional_stop(&mut self, on: bool);

    /// Block-delete filtering on/off
    fn set_block_delete(&mut self, on: bool);

    /// Reload the tool table from disk
    fn load_tool_table(&mut self);

    /// Load a program file for automatic execution
    fn program_open(&mut self, path: &Path);

    /// Set the max velocity ceiling (units per second)
    fn set_max_velocity(&mut self, units_per_sec: f64);

    /// Set the feed override factor (1.0 = 100%)
    fn set_feed_override(&mut self, factor: f64);

    /// Set the rapid override factor (1.0 = 100%)
    fn set_rapid_override(&mut self, factor: f64);

    /// Set the spindle speed override factor for one spindle
    fn set_spindle_override(&mut self, spindle: usize, factor: f64);

    /// Drain one entry from the asynchronous error channel, if any
    fn poll_fault(&mut self) -> Option<MachineFault>;
}

/// The Machine Status Source
///
/// Read-only view of machine state. Mode and homed state can change
/// underneath the dispatcher at any time (another actor, a hardware event),
/// so every guarded operation re-reads immediately before acting.
pub trait StatusSource {
    /// Current task mode
    fn task_mode(&self) -> TaskMode;

    /// Current trajectory (kinematic) mode
    fn traj_mode(&self) -> TrajMode;

    /// Current interpreter execution state
    fn exec_state(&self) -> ExecState;

    /// Whether one joint has a position reference
    fn is_homed(&self, joint: usize) -> bool;

    /// Whether every configured joint is homed
    fn is_all_homed(&self) -> bool;

    /// Whether the machine is powered on and out of estop
    fn machine_is_on(&self) -> bool;

    /// Whether a program is executing
    fn is_auto_running(&self) -> bool;

    /// Whether program execution is paused
    fn is_auto_paused(&self) -> bool;

    /// Mechanical type of one joint
    fn joint_type(&self, joint: usize) -> JointType;

    /// Whether the machine has identity (one joint per axis) kinematics
    fn kinematics_identity(&self) -> bool;

    /// Tool currently in the spindle
    fn tool_in_spindle(&self) -> i32;

    /// Program file currently loaded, if any
    fn loaded_file(&self) -> Option<PathBuf>;

    /// Commanded speed of one spindle (signed; negative is reverse)
    fn spindle_speed(&self, spindle: usize) -> f64;

    /// Flood coolant state
    fn flood_on(&self) -> bool;

    /// Mist coolant state
    fn mist_on(&self) -> bool;

    /// Optional-stop state
    fn optional_stop_on(&self) -> bool;

    /// Block-delete state
    fn block_delete_on(&self) -> bool;

    /// Whether the hard-limit override latch is set
    fn limits_override_set(&self) -> bool;

    /// Whether any hard limit switch is currently tripped
    fn hard_limits_tripped(&self) -> bool;
}

//! Machine-level vocabulary shared by the dispatcher and its ports
//!
//! These types mirror what the machine-control runtime reports and accepts:
//! task modes, trajectory modes, interpreter execution states, axis letters,
//! and the fault records drained from the asynchronous error channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the machine task layer
///
/// Exactly one mode is active at any time. The dispatcher never assumes a
/// mode set earlier still holds; it re-reads before every guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskMode {
    /// Manual control (jogging, homing)
    Manual,
    /// Automatic program execution
    Auto,
    /// Manual data input - single command lines executed immediately
    Mdi,
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Auto => write!(f, "Auto"),
            Self::Mdi => write!(f, "MDI"),
        }
    }
}

/// Trajectory (kinematic) mode reported by the status source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrajMode {
    /// Free/joint motion - joints move independently, jogs address joints
    Free,
    /// Coordinated world motion - jogs address axis letters
    Coord,
    /// Teleoperation mode
    Teleop,
}

impl fmt::Display for TrajMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Coord => write!(f, "Coord"),
            Self::Teleop => write!(f, "Teleop"),
        }
    }
}

/// Interpreter execution state
///
/// The custom-code sequencer spin-polls this until the machine leaves its
/// motion/IO wait states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecState {
    /// No command executing
    Done,
    /// Last command ended in error
    Error,
    /// Waiting on queued motion
    WaitingForMotion,
    /// Waiting on I/O completion
    WaitingForIo,
    /// Waiting on both motion and I/O
    WaitingForMotionAndIo,
    /// Waiting on a dwell
    WaitingForDelay,
}

impl ExecState {
    /// True while the machine is still executing motion (or motion plus IO).
    /// This is the condition the custom-code poll loop spins on.
    pub fn is_waiting_for_motion(&self) -> bool {
        matches!(self, Self::WaitingForMotion | Self::WaitingForMotionAndIo)
    }
}

/// Mechanical type of a joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointType {
    /// Linear joint (millimeters or inches)
    Linear,
    /// Angular joint (degrees)
    Angular,
}

/// Named coordinate axis
///
/// An axis letter may map many-to-one or one-to-one to joints depending on
/// machine kinematics; the mapping itself lives in `MachineConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    A,
    B,
    C,
    U,
    V,
    W,
}

impl Axis {
    /// All axes in canonical letter order
    pub const ALL: [Axis; 9] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::A,
        Axis::B,
        Axis::C,
        Axis::U,
        Axis::V,
        Axis::W,
    ];

    /// Parse a single axis letter (case-insensitive)
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'X' => Some(Self::X),
            'Y' => Some(Self::Y),
            'Z' => Some(Self::Z),
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'U' => Some(Self::U),
            'V' => Some(Self::V),
            'W' => Some(Self::W),
            _ => None,
        }
    }

    /// Axis for a position in the canonical `XYZABCUVW` order
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Position of this axis in the canonical `XYZABCUVW` order
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|a| a == self)
            .unwrap_or_default()
    }

    /// The axis letter
    pub fn letter(&self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::U => 'U',
            Self::V => 'V',
            Self::W => 'W',
        }
    }

    /// True for the rotary axes A, B, C
    pub fn is_rotary(&self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Work coordinate system selector (G54 through G59.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum CoordinateSystem {
    G54,
    G55,
    G56,
    G57,
    G58,
    G59,
    G59_1,
    G59_2,
    G59_3,
}

impl CoordinateSystem {
    /// All systems in P-number order
    pub const ALL: [CoordinateSystem; 9] = [
        Self::G54,
        Self::G55,
        Self::G56,
        Self::G57,
        Self::G58,
        Self::G59,
        Self::G59_1,
        Self::G59_2,
        Self::G59_3,
    ];

    /// The P number used by `G10 L2` offset writes (G54 is 1)
    pub fn p_number(&self) -> u8 {
        match self {
            Self::G54 => 1,
            Self::G55 => 2,
            Self::G56 => 3,
            Self::G57 => 4,
            Self::G58 => 5,
            Self::G59 => 6,
            Self::G59_1 => 7,
            Self::G59_2 => 8,
            Self::G59_3 => 9,
        }
    }

    /// The G-code that selects this system
    pub fn as_gcode(&self) -> &'static str {
        match self {
            Self::G54 => "G54",
            Self::G55 => "G55",
            Self::G56 => "G56",
            Self::G57 => "G57",
            Self::G58 => "G58",
            Self::G59 => "G59",
            Self::G59_1 => "G59.1",
            Self::G59_2 => "G59.2",
            Self::G59_3 => "G59.3",
        }
    }

    /// Parse a selector like `"G55"` or `"g59.1"`
    pub fn from_gcode(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|s| s.as_gcode() == code)
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_gcode())
    }
}

/// Conventional codes for faults the dispatcher raises itself
///
/// Faults drained from the machine's error channel carry whatever code the
/// runtime assigned; these constants cover dispatcher-originated events.
pub mod fault_codes {
    /// System-level error report
    pub const NML_ERROR: i32 = 1;
    /// Operator error (bad request, interlock)
    pub const OPERATOR_ERROR: i32 = 11;
    /// Transient advisory text, informational only
    pub const ADVISORY: i32 = 255;
}

/// An asynchronous fault report from the machine's error channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineFault {
    /// Runtime-assigned fault code
    pub code: i32,
    /// Human-readable fault text
    pub message: String,
}

impl MachineFault {
    /// Create a fault record
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for MachineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

/// Result of one bounded blocking wait on the command port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Command completed
    Done,
    /// Wait expired before completion
    Timeout,
    /// The port reported a runtime error for the command
    Error,
    /// The outstanding command was aborted externally
    Aborted,
}

/// Outcome of a blocking command sequence (MDI block, custom-code block)
///
/// Any non-`Completed` outcome means the sequence stopped early; callers must
/// not assume all lines ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Every line completed with a clean error channel
    Completed,
    /// A wait expired; the sequence was aborted and abandoned
    TimedOut,
    /// The machine reported an error during the sequence
    MachineError {
        /// Runtime-assigned fault code
        code: i32,
        /// Fault text as reported
        message: String,
    },
    /// The sequence was aborted externally mid-wait
    Aborted,
}

impl SequenceOutcome {
    /// True only for `Completed`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Build a `MachineError` outcome from a drained fault
    pub fn from_fault(fault: MachineFault) -> Self {
        Self::MachineError {
            code: fault.code,
            message: fault.message,
        }
    }
}

impl fmt::Display for SequenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::MachineError { code, message } => {
                write!(f, "machine error {}: {}", code, message)
            }
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

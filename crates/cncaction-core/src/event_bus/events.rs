//! Status event definitions

use crate::machine::MachineFault;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Timestamp treatment for a machine-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogStamp {
    /// Log the text as given
    #[default]
    None,
    /// Prefix the entry with the time of day
    Time,
    /// Prefix the entry with date and time
    Date,
    /// Request that the log view be cleared
    Delete,
}

/// Events the dispatcher publishes for the surrounding UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// An error or advisory to surface to the operator. Carries the fault
    /// code and message, whether drained from the machine's error channel or
    /// raised by the dispatcher itself.
    Fault(MachineFault),
    /// A machine-log entry (already stamped by the dispatcher)
    MachineLog {
        /// The log text to append, or empty for `LogStamp::Delete`.
        text: String,
        /// How the entry was stamped.
        stamp: LogStamp,
    },
    /// Offsets or tool data changed; position displays should refresh
    ReloadDisplay,
    /// A program file was (re)loaded
    FileLoaded(PathBuf),
}

/// Coarse event grouping used by subscription filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Errors and advisories
    Fault,
    /// Machine log traffic
    Log,
    /// Display refresh requests
    Display,
}

impl StatusEvent {
    /// Category this event belongs to
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Fault(_) => EventCategory::Fault,
            Self::MachineLog { .. } => EventCategory::Log,
            Self::ReloadDisplay | Self::FileLoaded(_) => EventCategory::Display,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "{}", fault),
            Self::MachineLog { text, .. } => write!(f, "log: {}", text),
            Self::ReloadDisplay => write!(f, "reload display"),
            Self::FileLoaded(path) => write!(f, "file loaded: {}", path.display()),
        }
    }
}

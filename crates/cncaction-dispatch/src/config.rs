//! Machine configuration
//!
//! The static facts the dispatcher needs about the machine it fronts: joint
//! and axis inventory, the axis-to-joint mapping, the homing order, and the
//! preconfigured MDI command list. Loaded from JSON and validated before use;
//! every field is an explicit, enumerated value (no by-name lookups).

use cncaction_core::{Axis, DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Static machine description consumed by the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Number of configured joints
    pub joint_count: usize,
    /// Joints that may actually be commanded (subset of `0..joint_count`)
    pub available_joints: Vec<usize>,
    /// Axis letters this machine exposes
    pub available_axes: Vec<Axis>,
    /// Joint order used by the fallback homing sequencer
    pub joint_sequence: Vec<usize>,
    /// Mapping from axis letter to the joint that moves it
    pub axis_joints: HashMap<Axis, usize>,
    /// Whether the machine supports a single home-all command
    pub home_all: bool,
    /// Preconfigured MDI commands; each entry holds `;`-separated lines
    #[serde(default)]
    pub mdi_commands: Vec<String>,
    /// Per-spindle maximum speed in RPM; the length is the spindle count
    #[serde(default)]
    pub max_spindle_speeds: Vec<f64>,
}

impl MachineConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DispatchError::config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    ///
    /// Every joint reference must fall inside `0..joint_count` so the rest of
    /// the dispatcher can index without re-checking.
    pub fn validate(&self) -> Result<()> {
        if self.joint_count == 0 {
            return Err(DispatchError::config("joint_count must be at least 1"));
        }
        for &joint in &self.available_joints {
            if joint >= self.joint_count {
                return Err(DispatchError::config(format!(
                    "available joint {} exceeds joint count {}",
                    joint, self.joint_count
                )));
            }
        }
        for &joint in &self.joint_sequence {
            if joint >= self.joint_count {
                return Err(DispatchError::config(format!(
                    "homing sequence joint {} exceeds joint count {}",
                    joint, self.joint_count
                )));
            }
        }
        for (axis, &joint) in &self.axis_joints {
            if joint >= self.joint_count {
                return Err(DispatchError::config(format!(
                    "axis {} maps to joint {} but joint count is {}",
                    axis, joint, self.joint_count
                )));
            }
        }
        if !self.home_all && self.joint_sequence.is_empty() {
            return Err(DispatchError::config(
                "a machine without home-all needs a homing joint sequence",
            ));
        }
        Ok(())
    }

    /// Joint that moves the given axis, if one is mapped
    pub fn joint_for_axis(&self, axis: Axis) -> Option<usize> {
        self.axis_joints.get(&axis).copied()
    }

    /// Number of configured spindles
    pub fn spindle_count(&self) -> usize {
        self.max_spindle_speeds.len()
    }
}

impl Default for MachineConfig {
    /// A three-joint XYZ mill with identity kinematics and no home-all
    fn default() -> Self {
        Self {
            joint_count: 3,
            available_joints: vec![0, 1, 2],
            available_axes: vec![Axis::X, Axis::Y, Axis::Z],
            joint_sequence: vec![0, 1, 2],
            axis_joints: HashMap::from([(Axis::X, 0), (Axis::Y, 1), (Axis::Z, 2)]),
            home_all: false,
            mdi_commands: Vec::new(),
            max_spindle_speeds: vec![24000.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.joint_for_axis(Axis::Z), Some(2));
        assert_eq!(config.joint_for_axis(Axis::B), None);
        assert_eq!(config.spindle_count(), 1);
    }

    #[test]
    fn rejects_out_of_range_joint_references() {
        let mut config = MachineConfig::default();
        config.available_joints.push(7);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DispatchError::Config { .. }));

        let mut config = MachineConfig::default();
        config.axis_joints.insert(Axis::A, 9);
        assert!(config.validate().is_err());

        let mut config = MachineConfig::default();
        config.joint_sequence = vec![0, 5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_missing_homing_sequence() {
        let mut config = MachineConfig::default();
        config.joint_sequence.clear();
        assert!(config.validate().is_err());

        // with home-all the sequence is not needed
        config.home_all = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let config = MachineConfig::default();
        let text = serde_json::to_string_pretty(&config).unwrap();
        let back: MachineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.joint_count, config.joint_count);
        assert_eq!(back.axis_joints, config.axis_joints);
        assert_eq!(back.joint_sequence, config.joint_sequence);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.json");
        let config = MachineConfig {
            mdi_commands: vec!["G53 G0 Z0;G53 G0 X0 Y0".to_string()],
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = MachineConfig::load(&path).unwrap();
        assert_eq!(loaded.mdi_commands.len(), 1);

        let err = MachineConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, DispatchError::Config { .. }));
    }
}

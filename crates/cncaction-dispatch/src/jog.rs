//! Jog dispatch
//!
//! Jogs address joints in free (joint) trajectory mode and axis letters
//! otherwise; the resolver picks the right target from the live trajectory
//! mode at dispatch time. Rates are held in units per minute (matching the
//! operator-facing controls) and converted to units per second at the port.

use crate::facade::Dispatcher;
use crate::ports::{CommandPort, JogTarget, StatusSource};
use cncaction_core::{Axis, DispatchError, Result, TrajMode};

/// Operator jog settings, kept by the dispatcher between jog requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogSettings {
    /// Linear jog rate in machine units per minute
    pub linear_rate: f64,
    /// Angular jog rate in degrees per minute
    pub angular_rate: f64,
    /// Linear jog increment; 0 selects continuous jogging
    pub linear_increment: f64,
    /// Angular jog increment; 0 selects continuous jogging
    pub angular_increment: f64,
}

impl Default for JogSettings {
    fn default() -> Self {
        Self {
            linear_rate: 300.0,
            angular_rate: 360.0,
            linear_increment: 0.0,
            angular_increment: 0.0,
        }
    }
}

/// What the operator asked to jog, before trajectory-mode resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogInput {
    /// A joint by index
    Joint(usize),
    /// An axis by letter
    Axis(Axis),
}

impl<C: CommandPort, S: StatusSource> Dispatcher<C, S> {
    /// Current jog settings
    pub fn jog_settings(&self) -> JogSettings {
        self.jog
    }

    /// Set the linear jog rate (units per minute)
    pub fn set_jog_rate(&mut self, rate: f64) {
        self.jog.linear_rate = rate;
    }

    /// Set the angular jog rate (degrees per minute)
    pub fn set_jog_rate_angular(&mut self, rate: f64) {
        self.jog.angular_rate = rate;
    }

    /// Set the linear jog increment; 0 selects continuous jogging
    ///
    /// Stops any jog in progress: a continuous jog must not keep running
    /// under settings the operator just changed.
    pub fn set_jog_increment(&mut self, increment: f64) {
        self.jog.linear_increment = increment;
        self.stop_all_jogs();
    }

    /// Set the angular jog increment; 0 selects continuous jogging
    pub fn set_jog_increment_angular(&mut self, increment: f64) {
        self.jog.angular_increment = increment;
        self.stop_all_jogs();
    }

    /// Jog a named axis or joint using the stored settings
    ///
    /// `direction` is +1/-1 to jog, 0 to stop. Angular settings apply to the
    /// rotary letters; in free mode the resolved joint's mechanical type
    /// decides instead.
    pub fn jog_by_name(&mut self, input: JogInput, direction: i32) -> Result<()> {
        let target = self.resolve_jog_target(input)?;
        let angular = match target {
            JogTarget::Joint(joint) => {
                matches!(self.status.joint_type(joint), cncaction_core::JointType::Angular)
            }
            JogTarget::Axis(axis) => axis.is_rotary(),
        };
        let (rate, increment) = if angular {
            (self.jog.angular_rate, self.jog.angular_increment)
        } else {
            (self.jog.linear_rate, self.jog.linear_increment)
        };
        self.dispatch_jog(target, direction, rate / 60.0, increment);
        Ok(())
    }

    /// Jog a joint or axis at an explicit rate
    ///
    /// `rate` is in units per second. `distance` of 0 starts a continuous
    /// jog; nonzero jogs that increment. `direction` 0 stops.
    pub fn jog(&mut self, input: JogInput, direction: i32, rate: f64, distance: f64) -> Result<()> {
        let target = self.resolve_jog_target(input)?;
        self.dispatch_jog(target, direction, rate, distance);
        Ok(())
    }

    /// Stop a jog in progress
    ///
    /// Deliberately infallible: a stop request must never be refused. If the
    /// target no longer resolves (trajectory mode changed mid-jog) the stop
    /// is sent for both interpretations.
    pub fn stop_jog(&mut self, input: JogInput) {
        if !self.status.machine_is_on() {
            return;
        }
        match self.resolve_jog_target(input) {
            Ok(target) => self.command.jog_stop(target),
            Err(error) => {
                tracing::warn!(%error, ?input, "jog stop target did not resolve, stopping both ways");
                match input {
                    JogInput::Joint(joint) => {
                        self.command.jog_stop(JogTarget::Joint(joint));
                        if let Some(axis) = Axis::from_index(joint) {
                            self.command.jog_stop(JogTarget::Axis(axis));
                        }
                    }
                    JogInput::Axis(axis) => {
                        self.command.jog_stop(JogTarget::Axis(axis));
                        if let Some(joint) = self.config.joint_for_axis(axis) {
                            self.command.jog_stop(JogTarget::Joint(joint));
                        }
                    }
                }
            }
        }
    }

    /// Stop every joint and axis jog
    pub fn stop_all_jogs(&mut self) {
        if !self.status.machine_is_on() {
            return;
        }
        for &joint in &self.config.available_joints.clone() {
            self.command.jog_stop(JogTarget::Joint(joint));
        }
        for &axis in &self.config.available_axes.clone() {
            self.command.jog_stop(JogTarget::Axis(axis));
        }
    }

    fn dispatch_jog(&mut self, target: JogTarget, direction: i32, rate: f64, distance: f64) {
        if direction == 0 {
            self.command.jog_stop(target);
            return;
        }
        let velocity = f64::from(direction.signum()) * rate;
        if distance == 0.0 {
            tracing::debug!(?target, velocity, "continuous jog");
            self.command.jog_continuous(target, velocity);
        } else {
            tracing::debug!(?target, velocity, distance, "incremental jog");
            self.command.jog_increment(target, velocity, distance);
        }
    }

    /// Resolve operator intent to the port-level jog target
    ///
    /// Free mode jogs joints: an axis letter is translated through the
    /// configured mapping, a joint index is validated against the joint count
    /// and the available set. Any other trajectory mode jogs axis letters.
    fn resolve_jog_target(&self, input: JogInput) -> Result<JogTarget> {
        match self.status.traj_mode() {
            TrajMode::Free => {
                if !self.status.kinematics_identity() {
                    tracing::warn!("joint jog on non-identity kinematics");
                }
                let joint = match input {
                    JogInput::Joint(joint) => joint,
                    JogInput::Axis(axis) => self.config.joint_for_axis(axis).ok_or_else(|| {
                        tracing::warn!(%axis, "no joint is mapped to this axis");
                        DispatchError::invalid(format!("no joint is mapped to axis {}", axis))
                    })?,
                };
                if joint >= self.config.joint_count {
                    tracing::warn!(
                        joint,
                        joint_count = self.config.joint_count,
                        "jog joint number exceeds joint count"
                    );
                    return Err(DispatchError::invalid(format!(
                        "joint {} exceeds joint count {}",
                        joint, self.config.joint_count
                    )));
                }
                if !self.config.available_joints.contains(&joint) {
                    tracing::warn!(joint, "jog joint is not in the available set");
                    return Err(DispatchError::declined(format!(
                        "joint {} is not joggable on this machine",
                        joint
                    )));
                }
                Ok(JogTarget::Joint(joint))
            }
            TrajMode::Coord | TrajMode::Teleop => {
                let axis = match input {
                    JogInput::Axis(axis) => axis,
                    JogInput::Joint(joint) => Axis::from_index(joint).ok_or_else(|| {
                        tracing::warn!(joint, "no axis letter at this index");
                        DispatchError::invalid(format!("no axis at index {}", joint))
                    })?,
                };
                if !self.config.available_axes.contains(&axis) {
                    tracing::warn!(%axis, "jog axis is not available on this machine");
                    return Err(DispatchError::declined(format!(
                        "axis {} is not joggable on this machine",
                        axis
                    )));
                }
                Ok(JogTarget::Axis(axis))
            }
        }
    }
}

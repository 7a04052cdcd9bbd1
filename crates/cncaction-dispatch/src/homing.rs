//! Homing and unhoming
//!
//! Machines with the home-all capability get a single command. Without it,
//! joints must be homed one at a time in the configured order, Z first so the
//! tool is clear before any lateral move, with the operator re-pressing
//! home-all once per joint. The warned-once flag drives that walk and is
//! cleared when the walk completes so a later re-home starts a fresh cycle.

use crate::facade::Dispatcher;
use crate::ports::{CommandPort, HomeTarget, StatusSource};
use cncaction_core::{fault_codes, Axis, DispatchError, Result, TaskMode};

impl<C: CommandPort, S: StatusSource> Dispatcher<C, S> {
    /// Home a joint, or all joints
    ///
    /// Always establishes manual mode and free (joint) trajectory mode first;
    /// homing is a per-joint operation at the machine. On machines without
    /// home-all, `HomeTarget::All` runs one step of the fallback walk per
    /// call.
    pub fn home(&mut self, target: HomeTarget) -> Result<()> {
        self.ensure_mode(TaskMode::Manual);
        self.command.set_teleop(false);
        match target {
            HomeTarget::Joint(joint) => {
                self.require_valid_joint(joint)?;
                tracing::info!(joint, "homing joint");
                self.command.home(HomeTarget::Joint(joint));
                Ok(())
            }
            HomeTarget::All if self.config.home_all => {
                tracing::info!("homing all joints");
                self.command.home(HomeTarget::All);
                Ok(())
            }
            HomeTarget::All => self.home_all_fallback(),
        }
    }

    /// Drop the position reference of a joint, or of all joints
    pub fn unhome(&mut self, target: HomeTarget) -> Result<()> {
        self.ensure_mode(TaskMode::Manual);
        self.command.set_teleop(false);
        if let HomeTarget::Joint(joint) = target {
            self.require_valid_joint(joint)?;
        }
        tracing::info!(?target, "unhoming");
        self.command.unhome(target);
        Ok(())
    }

    /// One step of the sequential home-all walk
    ///
    /// Invariant: at most one joint is commanded per call. The first call of
    /// a cycle homes Z (when present and unhomed) and warns that more presses
    /// are coming; subsequent calls home the next unhomed joint in sequence.
    /// The flag clears when the joint just commanded is the last one left, so
    /// no trailing advisory is emitted for a walk that is about to finish.
    fn home_all_fallback(&mut self) -> Result<()> {
        if self.status.is_all_homed() {
            tracing::debug!("all joints already homed, clearing homing walk state");
            self.home_all_warned = false;
            return Ok(());
        }

        let z_joint = self.config.joint_for_axis(Axis::Z);
        if !self.home_all_warned {
            if let Some(z) = z_joint {
                if !self.status.is_homed(z) {
                    self.home_all_warned = true;
                    self.emit_fault(
                        fault_codes::OPERATOR_ERROR,
                        "machine cannot home all joints at once - homing Z axis first, press again for the next joint",
                    );
                    tracing::info!(joint = z, "homing Z joint first");
                    self.command.home(HomeTarget::Joint(z));
                    return Ok(());
                }
            }
        }

        self.home_all_warned = true;
        let sequence = self.config.joint_sequence.clone();
        let last = sequence.len();
        for (num, &joint) in sequence.iter().enumerate() {
            // the joint commanded now is the last unhomed one: end the walk
            if num + 1 == last {
                self.home_all_warned = false;
            } else if num + 2 == last {
                if let Some(z) = z_joint {
                    if self.status.is_homed(z) {
                        self.home_all_warned = false;
                    }
                }
            }
            if Some(joint) == z_joint {
                continue;
            }
            if self.status.is_homed(joint) {
                continue;
            }
            tracing::info!(joint, "homing next joint in sequence");
            self.command.home(HomeTarget::Joint(joint));
            if self.home_all_warned {
                self.emit_fault(fault_codes::ADVISORY, "press home again for the next joint");
            }
            return Ok(());
        }

        // Every joint in the sequence is homed but the status source still
        // reports unhomed joints: the sequence does not cover them.
        self.home_all_warned = false;
        Err(DispatchError::config(
            "homing sequence exhausted but not all joints are homed",
        ))
    }
}

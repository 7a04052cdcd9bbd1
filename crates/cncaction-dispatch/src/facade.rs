//! The command dispatch facade
//!
//! [`Dispatcher`] translates operator intent into machine-control calls. It
//! owns no machine state of its own beyond small bookkeeping (the saved-mode
//! slot, the homing warned-once flag, jog settings); everything else is read
//! from the status source immediately before acting, because mode and homed
//! state can change underneath it at any time.
//!
//! Failure semantics: timeouts and machine errors are logged, surfaced as
//! status events, and returned as values. A timeout always triggers an
//! abort-and-restore-Auto step before being reported. Validation failures
//! never reach the command port.

use crate::config::MachineConfig;
use crate::jog::JogSettings;
use crate::ports::{AutoOp, CommandPort, MachinePower, SpindleOp, StatusSource};
use cncaction_core::{
    fault_codes, Axis, CoordinateSystem, DispatchError, EventBus, LogStamp, MachineFault, Result,
    SequenceOutcome, StatusEvent, TaskMode, WaitOutcome,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default bound for a single blocking wait on the command port
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Result of a mode-guard call
///
/// `previous` lets callers bracket a temporary mode switch and restore the
/// mode that was active before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    /// False when the machine was already in the requested mode and no
    /// command was issued.
    pub changed: bool,
    /// The mode that was active before this call.
    pub previous: TaskMode,
}

/// Command dispatch facade over a machine command port and status source
pub struct Dispatcher<C, S> {
    pub(crate) command: C,
    pub(crate) status: S,
    pub(crate) config: MachineConfig,
    events: Arc<EventBus>,
    saved_mode: Option<TaskMode>,
    pub(crate) home_all_warned: bool,
    pub(crate) jog: JogSettings,
    default_wait: Duration,
}

impl<C: CommandPort, S: StatusSource> Dispatcher<C, S> {
    /// Create a dispatcher over the given ports
    ///
    /// Validates the configuration up front so later joint indexing is safe.
    pub fn new(command: C, status: S, config: MachineConfig, events: Arc<EventBus>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            command,
            status,
            config,
            events,
            saved_mode: None,
            home_all_warned: false,
            jog: JogSettings::default(),
            default_wait: DEFAULT_WAIT,
        })
    }

    /// The event bus this dispatcher publishes to
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The machine configuration in use
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Change the default bound for blocking waits
    pub fn set_default_wait(&mut self, wait: Duration) {
        self.default_wait = wait;
    }

    /// Whether the fallback homing sequencer is mid-walk awaiting the next
    /// home-all request
    pub fn homing_warning_pending(&self) -> bool {
        self.home_all_warned
    }

    /// The mode currently held in the saved-mode slot, if any
    pub fn recorded_mode(&self) -> Option<TaskMode> {
        self.saved_mode
    }

    // ------------------------------------------------------------------
    // Mode guard
    // ------------------------------------------------------------------

    /// Put the machine in `mode`, if it is not there already
    ///
    /// Re-reads the current mode first; when it already matches, returns
    /// without issuing any command. Otherwise issues exactly one mode change
    /// and blocks until the port confirms completion. A wait that does not
    /// complete cleanly is logged but not retried; the port's own error
    /// signaling is the failure path.
    pub fn ensure_mode(&mut self, mode: TaskMode) -> ModeChange {
        let previous = self.status.task_mode();
        if previous == mode {
            return ModeChange {
                changed: false,
                previous,
            };
        }
        self.command.set_task_mode(mode);
        match self.command.wait_complete(self.default_wait) {
            WaitOutcome::Done => {}
            outcome => {
                tracing::warn!(?outcome, %mode, "mode change wait did not complete cleanly");
            }
        }
        ModeChange {
            changed: true,
            previous,
        }
    }

    /// Record the current mode in the saved-mode slot and return it
    ///
    /// The slot holds one mode and is overwritten by each call; nested
    /// record/restore brackets are not supported.
    pub fn record_current_mode(&mut self) -> TaskMode {
        let mode = self.status.task_mode();
        self.saved_mode = Some(mode);
        mode
    }

    /// Restore the mode held in the saved-mode slot, consuming it
    ///
    /// Calling this without a prior [`record_current_mode`] is a programming
    /// error and returns `InvalidArgument` without touching the port.
    ///
    /// [`record_current_mode`]: Dispatcher::record_current_mode
    pub fn restore_recorded_mode(&mut self) -> Result<ModeChange> {
        let mode = self.saved_mode.take().ok_or_else(|| {
            DispatchError::invalid("restore_recorded_mode called with no recorded mode")
        })?;
        Ok(self.ensure_mode(mode))
    }

    /// Switch to automatic mode
    pub fn set_auto_mode(&mut self) {
        self.ensure_mode(TaskMode::Auto);
    }

    /// Switch to MDI mode
    pub fn set_mdi_mode(&mut self) {
        self.ensure_mode(TaskMode::Mdi);
    }

    /// Switch to manual mode
    pub fn set_manual_mode(&mut self) {
        self.ensure_mode(TaskMode::Manual);
    }

    // ------------------------------------------------------------------
    // Blocking command sequencers
    // ------------------------------------------------------------------

    /// Submit MDI code without waiting for completion
    pub fn call_mdi(&mut self, code: &str) {
        self.ensure_mode(TaskMode::Mdi);
        self.command.submit_mdi(code);
    }

    /// Execute an MDI block line by line, waiting for each
    ///
    /// Stops at the first non-success: a timeout aborts the machine and
    /// returns `TimedOut`, a port runtime error returns `MachineError`, and a
    /// fault drained from the error channel after a successful wait is
    /// surfaced as a status event and returned. Remaining lines are not
    /// issued; callers must not assume the whole block ran.
    pub fn call_mdi_wait(&mut self, code: &str, timeout: Duration) -> SequenceOutcome {
        tracing::debug!(%code, timeout_s = timeout.as_secs_f64(), "waited MDI block");
        self.ensure_mode(TaskMode::Mdi);
        for line in code.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!(%line, "MDI command");
            self.command.submit_mdi(line);
            match self.command.wait_complete(timeout) {
                WaitOutcome::Done => {}
                WaitOutcome::Timeout => {
                    tracing::debug!(timeout_s = timeout.as_secs_f64(), %line, "MDI wait timed out");
                    self.abort();
                    return SequenceOutcome::TimedOut;
                }
                WaitOutcome::Error => {
                    tracing::debug!(%line, "MDI wait reported a runtime error");
                    return self.runtime_error_outcome();
                }
                WaitOutcome::Aborted => {
                    tracing::debug!(%line, "MDI wait interrupted by an external abort");
                    return SequenceOutcome::Aborted;
                }
            }
            if let Some(outcome) = self.drain_fault_channel() {
                return outcome;
            }
        }
        SequenceOutcome::Completed
    }

    /// Execute a preconfigured MDI command by its index
    ///
    /// Entries hold `;`-separated lines which are submitted without waiting.
    pub fn call_ini_mdi(&mut self, index: usize) -> Result<()> {
        let entry = self.config.mdi_commands.get(index).cloned().ok_or_else(|| {
            tracing::error!(index, "preconfigured MDI command not found");
            DispatchError::invalid(format!("MDI command #{} is not configured", index))
        })?;
        self.ensure_mode(TaskMode::Mdi);
        for code in entry.split(';') {
            let code = code.trim();
            if !code.is_empty() {
                self.command.submit_mdi(code);
            }
        }
        Ok(())
    }

    /// Execute a custom-code (O-word subroutine) call and wait it out
    ///
    /// Completion here is not just "command accepted": the machine is polled
    /// until it leaves its motion/IO wait states, with the usual three-way
    /// wait classification applied on every pass, then one final completion
    /// and error-channel check catches a fault that lands exactly at loop
    /// exit.
    pub fn call_oword_wait(&mut self, code: &str, timeout: Duration) -> SequenceOutcome {
        tracing::debug!(%code, "O-word call");
        self.ensure_mode(TaskMode::Mdi);
        self.command.submit_mdi(code.trim());
        while self.status.exec_state().is_waiting_for_motion() {
            match self.command.wait_complete(timeout) {
                WaitOutcome::Done => {}
                WaitOutcome::Timeout => {
                    tracing::error!(timeout_s = timeout.as_secs_f64(), "O-word wait timed out");
                    self.abort();
                    return SequenceOutcome::TimedOut;
                }
                WaitOutcome::Error => {
                    tracing::error!("O-word wait reported a runtime error");
                    return self.runtime_error_outcome();
                }
                WaitOutcome::Aborted => return SequenceOutcome::Aborted,
            }
            if let Some(outcome) = self.drain_fault_channel() {
                return outcome;
            }
        }
        match self.command.wait_complete(timeout) {
            WaitOutcome::Done => {}
            WaitOutcome::Timeout => {
                self.abort();
                return SequenceOutcome::TimedOut;
            }
            WaitOutcome::Error => return self.runtime_error_outcome(),
            WaitOutcome::Aborted => return SequenceOutcome::Aborted,
        }
        if let Some(outcome) = self.drain_fault_channel() {
            return outcome;
        }
        tracing::debug!("O-word call complete");
        SequenceOutcome::Completed
    }

    /// Abort the task layer, restoring Auto mode first
    pub fn abort(&mut self) {
        self.ensure_mode(TaskMode::Auto);
        self.command.abort();
    }

    // ------------------------------------------------------------------
    // Program execution
    // ------------------------------------------------------------------

    /// Start or resume the loaded program
    ///
    /// When paused and asked to run from the top, steps instead (resuming
    /// one line); otherwise starts from `line` unless already running.
    pub fn run(&mut self, line: u32) {
        self.ensure_mode(TaskMode::Auto);
        if self.status.is_auto_paused() && line == 0 {
            self.command.auto(AutoOp::Step);
        } else if !self.status.is_auto_running() {
            self.command.auto(AutoOp::Run { line });
        }
    }

    /// Single-step: pause a running program, or execute one line of a paused
    /// one
    pub fn step(&mut self) {
        if self.status.is_auto_running() && !self.status.is_auto_paused() {
            self.command.auto(AutoOp::Pause);
            return;
        }
        if self.status.is_auto_paused() {
            self.command.auto(AutoOp::Step);
        }
    }

    /// Toggle pause/resume of the running program
    pub fn pause(&mut self) {
        if !self.status.is_auto_paused() {
            self.command.auto(AutoOp::Pause);
        } else {
            tracing::debug!("resume");
            self.command.auto(AutoOp::Resume);
        }
    }

    /// Load a program file for automatic execution
    ///
    /// Status alone cannot tell a reload of the same file apart from a no-op
    /// (for instance after editing), so reloading the current file re-emits
    /// the loaded notification.
    pub fn program_open(&mut self, path: &Path) {
        self.ensure_mode(TaskMode::Auto);
        let previous = self.status.loaded_file();
        tracing::debug!(path = %path.display(), "loading program");
        self.command.program_open(path);
        if previous.as_deref() == Some(path) {
            self.events.publish(StatusEvent::FileLoaded(path.to_path_buf()));
        }
    }

    // ------------------------------------------------------------------
    // Machine power and interlocks
    // ------------------------------------------------------------------

    /// Enter or leave emergency stop
    pub fn set_estop(&mut self, active: bool) {
        self.command.set_machine_state(if active {
            MachinePower::Estop
        } else {
            MachinePower::EstopReset
        });
    }

    /// Power the machine on or off
    pub fn set_machine_power(&mut self, on: bool) {
        self.command
            .set_machine_state(if on { MachinePower::On } else { MachinePower::Off });
    }

    /// Toggle the hard-limit override latch
    ///
    /// Called while sitting on a hard limit this sets the latch so the
    /// machine can be driven off the switch; called again once clear of the
    /// limits it resets the latch. Resetting while still on a limit is
    /// refused.
    pub fn toggle_limits_override(&mut self) {
        let latched = self.status.limits_override_set();
        let tripped = self.status.hard_limits_tripped();
        if latched && tripped {
            self.emit_fault(
                fault_codes::OPERATOR_ERROR,
                "cannot reset limits override - still on hard limits",
            );
        } else if !latched && tripped {
            self.emit_fault(fault_codes::OPERATOR_ERROR, "hard limits are overridden!");
            self.command.override_limits();
        } else {
            self.emit_fault(fault_codes::ADVISORY, "hard limits are reset to active");
            self.command.override_limits();
        }
    }

    // ------------------------------------------------------------------
    // Offsets (bracketed temporary-MDI operations)
    // ------------------------------------------------------------------

    /// Set the work origin of one axis so the current position reads `value`
    pub fn set_axis_origin(&mut self, axis: Axis, value: f64) -> Result<()> {
        self.require_available_axis(axis)?;
        let change = self.ensure_mode(TaskMode::Mdi);
        self.command
            .submit_mdi(&format!("G10 L20 P0 {}{:.6}", axis, value));
        self.wait_default();
        self.ensure_mode(change.previous);
        self.reload_display();
        Ok(())
    }

    /// Adjust the current tool's offset so the position reads `value`
    ///
    /// `fixture` selects fixture-relative (L11) instead of plain (L10)
    /// calculation. Reapplies tool length compensation afterwards.
    pub fn set_tool_offset(&mut self, axis: Axis, value: f64, fixture: bool) -> Result<()> {
        self.require_available_axis(axis)?;
        let lnum = 10 + i32::from(fixture);
        let tool = self.status.tool_in_spindle();
        let change = self.ensure_mode(TaskMode::Mdi);
        self.command
            .submit_mdi(&format!("G10 L{} P{} {}{:.6}", lnum, tool, axis, value));
        self.wait_default();
        self.command.submit_mdi("G43");
        self.wait_default();
        self.ensure_mode(change.previous);
        self.reload_display();
        Ok(())
    }

    /// Write the current tool's table entry for one axis directly
    pub fn set_direct_tool_offset(&mut self, axis: Axis, value: f64) -> Result<()> {
        self.require_available_axis(axis)?;
        let tool = self.status.tool_in_spindle();
        let change = self.ensure_mode(TaskMode::Mdi);
        self.command
            .submit_mdi(&format!("G10 L1 P{} {}{:.6}", tool, axis, value));
        self.wait_default();
        self.command.submit_mdi("G43");
        self.wait_default();
        self.ensure_mode(change.previous);
        self.reload_display();
        Ok(())
    }

    /// Select a work coordinate system (G54 through G59.3)
    pub fn set_user_system(&mut self, system: CoordinateSystem) {
        let change = self.ensure_mode(TaskMode::Mdi);
        self.command.submit_mdi(system.as_gcode());
        self.wait_default();
        self.ensure_mode(change.previous);
    }

    /// Cancel the G92 offset
    pub fn zero_g92_offset(&mut self) {
        self.call_mdi("G92.1");
        self.reload_display();
    }

    /// Zero the coordinate system rotation
    pub fn zero_rotational_offset(&mut self) {
        self.call_mdi("G10 L2 P0 R0");
        self.reload_display();
    }

    /// Zero every available axis of one work coordinate system
    pub fn zero_g5x_offset(&mut self, system: CoordinateSystem) {
        let mut code = format!("G10 L2 P{} R0", system.p_number());
        for axis in &self.config.available_axes {
            code.push_str(&format!(" {}0", axis));
        }
        let change = self.ensure_mode(TaskMode::Mdi);
        self.command.submit_mdi(&code);
        self.wait_default();
        self.ensure_mode(change.previous);
        self.reload_display();
    }

    /// Cycle through manual and MDI mode so the interpreter flushes its
    /// parameter state to the var file
    pub fn sync_parameters(&mut self) {
        self.ensure_mode(TaskMode::Manual);
        self.ensure_mode(TaskMode::Mdi);
    }

    // ------------------------------------------------------------------
    // Rates and overrides
    // ------------------------------------------------------------------

    /// Set the max velocity ceiling from a units-per-minute rate
    pub fn set_max_velocity_rate(&mut self, units_per_min: f64) {
        self.command.set_max_velocity(units_per_min / 60.0);
    }

    /// Set the rapid override from a percentage
    pub fn set_rapid_rate(&mut self, percent: f64) {
        self.command.set_rapid_override(percent / 100.0);
    }

    /// Set the feed override from a percentage
    pub fn set_feed_rate(&mut self, percent: f64) {
        self.command.set_feed_override(percent / 100.0);
    }

    /// Set one spindle's speed override from a percentage
    pub fn set_spindle_rate(&mut self, percent: f64, spindle: usize) {
        self.command.set_spindle_override(spindle, percent / 100.0);
    }

    // ------------------------------------------------------------------
    // Spindles
    // ------------------------------------------------------------------

    /// Issue a spindle command to one spindle, or to all when `None`
    pub fn set_spindle(&mut self, spindle: Option<usize>, op: SpindleOp) -> Result<()> {
        for index in self.spindle_range(spindle)? {
            self.command.spindle(index, op);
        }
        Ok(())
    }

    /// Step spindle speed up, honoring each spindle's configured maximum
    pub fn spindle_faster(&mut self, spindle: Option<usize>) -> Result<()> {
        for index in self.spindle_range(spindle)? {
            if self.status.spindle_speed(index).abs() >= self.config.max_spindle_speeds[index] {
                continue;
            }
            self.command.spindle(index, SpindleOp::Increase);
        }
        Ok(())
    }

    /// Step spindle speed down
    pub fn spindle_slower(&mut self, spindle: Option<usize>) -> Result<()> {
        self.set_spindle(spindle, SpindleOp::Decrease)
    }

    /// Stop the spindle(s)
    pub fn spindle_off(&mut self, spindle: Option<usize>) -> Result<()> {
        self.set_spindle(spindle, SpindleOp::Off)
    }

    fn spindle_range(&self, spindle: Option<usize>) -> Result<std::ops::Range<usize>> {
        match spindle {
            None => Ok(0..self.config.spindle_count()),
            Some(index) if index < self.config.spindle_count() => Ok(index..index + 1),
            Some(index) => {
                tracing::warn!(index, count = self.config.spindle_count(), "bad spindle index");
                Err(DispatchError::invalid(format!(
                    "spindle {} is not configured",
                    index
                )))
            }
        }
    }

    // ------------------------------------------------------------------
    // Coolant and interpreter switches
    // ------------------------------------------------------------------

    /// Toggle flood coolant
    pub fn toggle_flood(&mut self) {
        let on = self.status.flood_on();
        self.command.set_flood(!on);
    }

    /// Flood coolant on/off
    pub fn set_flood(&mut self, on: bool) {
        self.command.set_flood(on);
    }

    /// Toggle mist coolant
    pub fn toggle_mist(&mut self) {
        let on = self.status.mist_on();
        self.command.set_mist(!on);
    }

    /// Mist coolant on/off
    pub fn set_mist(&mut self, on: bool) {
        self.command.set_mist(on);
    }

    /// Toggle optional-stop handling
    pub fn toggle_optional_stop(&mut self) {
        let on = self.status.optional_stop_on();
        self.command.set_optional_stop(!on);
    }

    /// Optional-stop handling on/off
    pub fn set_optional_stop(&mut self, on: bool) {
        self.command.set_optional_stop(on);
    }

    /// Toggle block-delete filtering
    pub fn toggle_block_delete(&mut self) {
        let on = self.status.block_delete_on();
        self.command.set_block_delete(!on);
    }

    /// Block-delete filtering on/off
    pub fn set_block_delete(&mut self, on: bool) {
        self.command.set_block_delete(on);
    }

    /// Reload the tool table from disk
    pub fn reload_tool_table(&mut self) {
        self.command.load_tool_table();
    }

    // ------------------------------------------------------------------
    // Status events
    // ------------------------------------------------------------------

    /// Ask position displays to refresh
    pub fn reload_display(&mut self) {
        self.events.publish(StatusEvent::ReloadDisplay);
    }

    /// Append to the machine log, stamping the entry as requested
    ///
    /// `LogStamp::Delete` is a clear request, not an entry: the published
    /// event carries empty text and any caller-supplied text is dropped.
    pub fn update_machine_log(&mut self, text: &str, stamp: LogStamp) {
        let entry = match stamp {
            LogStamp::None => text.to_string(),
            LogStamp::Delete => String::new(),
            LogStamp::Time => {
                format!("{} {}", chrono::Local::now().format("%H:%M:%S"), text)
            }
            LogStamp::Date => format!(
                "{} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                text
            ),
        };
        self.events.publish(StatusEvent::MachineLog { text: entry, stamp });
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    pub(crate) fn emit_fault(&self, code: i32, message: &str) {
        self.events
            .publish(StatusEvent::Fault(MachineFault::new(code, message)));
    }

    pub(crate) fn wait_default(&mut self) {
        match self.command.wait_complete(self.default_wait) {
            WaitOutcome::Done => {}
            outcome => tracing::warn!(?outcome, "wait did not complete cleanly"),
        }
    }

    pub(crate) fn require_valid_joint(&self, joint: usize) -> Result<()> {
        if joint >= self.config.joint_count {
            tracing::error!(
                joint,
                joint_count = self.config.joint_count,
                "joint number exceeds joint count"
            );
            return Err(DispatchError::invalid(format!(
                "joint {} exceeds joint count {}",
                joint, self.config.joint_count
            )));
        }
        Ok(())
    }

    fn require_available_axis(&self, axis: Axis) -> Result<()> {
        if !self.config.available_axes.contains(&axis) {
            tracing::warn!(%axis, "axis is not available on this machine");
            return Err(DispatchError::invalid(format!(
                "axis {} is not available on this machine",
                axis
            )));
        }
        Ok(())
    }

    fn drain_fault_channel(&mut self) -> Option<SequenceOutcome> {
        let fault = self.command.poll_fault()?;
        tracing::error!(code = fault.code, message = %fault.message, "error channel fault");
        self.events.publish(StatusEvent::Fault(fault.clone()));
        Some(SequenceOutcome::from_fault(fault))
    }

    fn runtime_error_outcome(&mut self) -> SequenceOutcome {
        // The port rejected the command; the error channel usually carries
        // the detail.
        match self.command.poll_fault() {
            Some(fault) => {
                self.events.publish(StatusEvent::Fault(fault.clone()));
                SequenceOutcome::from_fault(fault)
            }
            None => SequenceOutcome::MachineError {
                code: fault_codes::NML_ERROR,
                message: "command port reported a runtime error".to_string(),
            },
        }
    }
}

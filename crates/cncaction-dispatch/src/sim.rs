//! An in-memory machine for tests and the demo binary
//!
//! [`SimMachine`] hands out a command port and a status source over one
//! shared state. Commands are recorded in issue order and mutate the
//! simulated status the way the real runtime would (mode changes apply
//! immediately, homing marks joints homed, estop drops power). Wait outcomes,
//! execution states, and error-channel faults can be scripted ahead of time
//! to exercise the failure paths.

use crate::ports::{
    AutoOp, CommandPort, HomeTarget, JogTarget, MachinePower, SpindleOp, StatusSource,
};
use cncaction_core::{
    ExecState, JointType, MachineFault, TaskMode, TrajMode, WaitOutcome,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One recorded command port call
///
/// `wait_complete` and `poll_fault` are observations, not commands, and are
/// counted separately rather than recorded here.
#[derive(Debug, Clone, PartialEq)]
pub enum PortCall {
    SetTaskMode(TaskMode),
    SubmitMdi(String),
    Abort,
    Home(HomeTarget),
    Unhome(HomeTarget),
    SetTeleop(bool),
    SetMachineState(MachinePower),
    Auto(AutoOp),
    JogStop(JogTarget),
    JogContinuous(JogTarget, f64),
    JogIncrement(JogTarget, f64, f64),
    OverrideLimits,
    Spindle(usize, SpindleOp),
    SetFlood(bool),
    SetMist(bool),
    SetOptionalStop(bool),
    SetBlockDelete(bool),
    LoadToolTable,
    ProgramOpen(PathBuf),
    SetMaxVelocity(f64),
    SetFeedOverride(f64),
    SetRapidOverride(f64),
    SetSpindleOverride(usize, f64),
}

#[derive(Debug)]
struct SimState {
    task_mode: TaskMode,
    traj_mode: TrajMode,
    exec_states: VecDeque<ExecState>,
    homed: Vec<bool>,
    joint_types: Vec<JointType>,
    identity_kinematics: bool,
    machine_on: bool,
    estop: bool,
    auto_running: bool,
    auto_paused: bool,
    tool_in_spindle: i32,
    loaded_file: Option<PathBuf>,
    spindle_speeds: Vec<f64>,
    flood: bool,
    mist: bool,
    optional_stop: bool,
    block_delete: bool,
    limits_override: bool,
    hard_limits: bool,
    wait_script: VecDeque<WaitOutcome>,
    faults: VecDeque<MachineFault>,
    calls: Vec<PortCall>,
    wait_calls: usize,
}

impl SimState {
    fn new(joint_count: usize) -> Self {
        Self {
            task_mode: TaskMode::Manual,
            traj_mode: TrajMode::Free,
            exec_states: VecDeque::new(),
            homed: vec![false; joint_count],
            joint_types: vec![JointType::Linear; joint_count],
            identity_kinematics: true,
            machine_on: false,
            estop: true,
            auto_running: false,
            auto_paused: false,
            tool_in_spindle: 0,
            loaded_file: None,
            spindle_speeds: vec![0.0],
            flood: false,
            mist: false,
            optional_stop: false,
            block_delete: false,
            limits_override: false,
            hard_limits: false,
            wait_script: VecDeque::new(),
            faults: VecDeque::new(),
            calls: Vec::new(),
            wait_calls: 0,
        }
    }
}

/// Simulated machine; create one, then take its ports
#[derive(Clone)]
pub struct SimMachine {
    state: Arc<Mutex<SimState>>,
}

impl SimMachine {
    /// A powered-down simulated machine with the given joint count
    pub fn new(joint_count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(joint_count))),
        }
    }

    /// The command port and status source views of this machine
    pub fn ports(&self) -> (SimCommandPort, SimStatusSource) {
        (
            SimCommandPort {
                state: self.state.clone(),
            },
            SimStatusSource {
                state: self.state.clone(),
            },
        )
    }

    // ----- scripting -----

    /// Queue the outcome of an upcoming `wait_complete`; unscripted waits
    /// return `Done`
    pub fn script_wait(&self, outcome: WaitOutcome) {
        self.state.lock().wait_script.push_back(outcome);
    }

    /// Queue an execution state for an upcoming `exec_state` read;
    /// unscripted reads return `Done`
    pub fn script_exec_state(&self, state: ExecState) {
        self.state.lock().exec_states.push_back(state);
    }

    /// Queue a fault on the error channel
    pub fn push_fault(&self, fault: MachineFault) {
        self.state.lock().faults.push_back(fault);
    }

    // ----- state setup -----

    /// Power on and leave estop
    pub fn power_on(&self) {
        let mut state = self.state.lock();
        state.estop = false;
        state.machine_on = true;
    }

    pub fn set_task_mode(&self, mode: TaskMode) {
        self.state.lock().task_mode = mode;
    }

    pub fn set_traj_mode(&self, mode: TrajMode) {
        self.state.lock().traj_mode = mode;
    }

    pub fn set_homed(&self, joint: usize, homed: bool) {
        self.state.lock().homed[joint] = homed;
    }

    pub fn set_joint_type(&self, joint: usize, joint_type: JointType) {
        self.state.lock().joint_types[joint] = joint_type;
    }

    pub fn set_identity_kinematics(&self, identity: bool) {
        self.state.lock().identity_kinematics = identity;
    }

    pub fn set_auto_state(&self, running: bool, paused: bool) {
        let mut state = self.state.lock();
        state.auto_running = running;
        state.auto_paused = paused;
    }

    pub fn set_tool_in_spindle(&self, tool: i32) {
        self.state.lock().tool_in_spindle = tool;
    }

    pub fn set_loaded_file(&self, path: Option<PathBuf>) {
        self.state.lock().loaded_file = path;
    }

    pub fn set_spindle_speed(&self, spindle: usize, rpm: f64) {
        let mut state = self.state.lock();
        if state.spindle_speeds.len() <= spindle {
            state.spindle_speeds.resize(spindle + 1, 0.0);
        }
        state.spindle_speeds[spindle] = rpm;
    }

    pub fn set_limits(&self, tripped: bool, overridden: bool) {
        let mut state = self.state.lock();
        state.hard_limits = tripped;
        state.limits_override = overridden;
    }

    // ----- inspection -----

    /// Every recorded command call, in issue order
    pub fn calls(&self) -> Vec<PortCall> {
        self.state.lock().calls.clone()
    }

    /// Forget the recorded calls (keeps state and scripts)
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of `wait_complete` calls seen so far
    pub fn wait_calls(&self) -> usize {
        self.state.lock().wait_calls
    }

    /// The MDI lines submitted so far, in order
    pub fn mdi_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PortCall::SubmitMdi(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Command side of a [`SimMachine`]
pub struct SimCommandPort {
    state: Arc<Mutex<SimState>>,
}

impl CommandPort for SimCommandPort {
    fn set_task_mode(&mut self, mode: TaskMode) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetTaskMode(mode));
        state.task_mode = mode;
    }

    fn wait_complete(&mut self, _timeout: Duration) -> WaitOutcome {
        let mut state = self.state.lock();
        state.wait_calls += 1;
        state.wait_script.pop_front().unwrap_or(WaitOutcome::Done)
    }

    fn submit_mdi(&mut self, line: &str) {
        self.state.lock().calls.push(PortCall::SubmitMdi(line.to_string()));
    }

    fn abort(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::Abort);
        state.auto_running = false;
        state.auto_paused = false;
    }

    fn home(&mut self, target: HomeTarget) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::Home(target));
        match target {
            HomeTarget::All => state.homed.fill(true),
            HomeTarget::Joint(joint) => {
                if let Some(flag) = state.homed.get_mut(joint) {
                    *flag = true;
                }
            }
        }
    }

    fn unhome(&mut self, target: HomeTarget) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::Unhome(target));
        match target {
            HomeTarget::All => state.homed.fill(false),
            HomeTarget::Joint(joint) => {
                if let Some(flag) = state.homed.get_mut(joint) {
                    *flag = false;
                }
            }
        }
    }

    fn set_teleop(&mut self, enable: bool) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetTeleop(enable));
        state.traj_mode = if enable { TrajMode::Teleop } else { TrajMode::Free };
    }

    fn set_machine_state(&mut self, power: MachinePower) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetMachineState(power));
        match power {
            MachinePower::Estop => {
                state.estop = true;
                state.machine_on = false;
            }
            MachinePower::EstopReset => state.estop = false,
            MachinePower::On => {
                if !state.estop {
                    state.machine_on = true;
                }
            }
            MachinePower::Off => state.machine_on = false,
        }
    }

    fn auto(&mut self, op: AutoOp) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::Auto(op));
        match op {
            AutoOp::Run { .. } => {
                state.auto_running = true;
                state.auto_paused = false;
            }
            AutoOp::Pause => state.auto_paused = true,
            AutoOp::Resume | AutoOp::Step => state.auto_paused = false,
        }
    }

    fn jog_stop(&mut self, target: JogTarget) {
        self.state.lock().calls.push(PortCall::JogStop(target));
    }

    fn jog_continuous(&mut self, target: JogTarget, velocity: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::JogContinuous(target, velocity));
    }

    fn jog_increment(&mut self, target: JogTarget, velocity: f64, distance: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::JogIncrement(target, velocity, distance));
    }

    fn override_limits(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::OverrideLimits);
        state.limits_override = !state.limits_override;
    }

    fn spindle(&mut self, spindle: usize, op: SpindleOp) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::Spindle(spindle, op));
        if state.spindle_speeds.len() <= spindle {
            state.spindle_speeds.resize(spindle + 1, 0.0);
        }
        let speed = &mut state.spindle_speeds[spindle];
        match op {
            SpindleOp::Forward { rpm } => *speed = rpm,
            SpindleOp::Reverse { rpm } => *speed = -rpm,
            SpindleOp::Increase => *speed += 100.0 * if *speed < 0.0 { -1.0 } else { 1.0 },
            SpindleOp::Decrease => *speed -= 100.0 * if *speed < 0.0 { -1.0 } else { 1.0 },
            SpindleOp::Off => *speed = 0.0,
        }
    }

    fn set_flood(&mut self, on: bool) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetFlood(on));
        state.flood = on;
    }

    fn set_mist(&mut self, on: bool) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetMist(on));
        state.mist = on;
    }

    fn set_optional_stop(&mut self, on: bool) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetOptionalStop(on));
        state.optional_stop = on;
    }

    fn set_block_delete(&mut self, on: bool) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::SetBlockDelete(on));
        state.block_delete = on;
    }

    fn load_tool_table(&mut self) {
        self.state.lock().calls.push(PortCall::LoadToolTable);
    }

    fn program_open(&mut self, path: &Path) {
        let mut state = self.state.lock();
        state.calls.push(PortCall::ProgramOpen(path.to_path_buf()));
        state.loaded_file = Some(path.to_path_buf());
    }

    fn set_max_velocity(&mut self, units_per_sec: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::SetMaxVelocity(units_per_sec));
    }

    fn set_feed_override(&mut self, factor: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::SetFeedOverride(factor));
    }

    fn set_rapid_override(&mut self, factor: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::SetRapidOverride(factor));
    }

    fn set_spindle_override(&mut self, spindle: usize, factor: f64) {
        self.state
            .lock()
            .calls
            .push(PortCall::SetSpindleOverride(spindle, factor));
    }

    fn poll_fault(&mut self) -> Option<MachineFault> {
        self.state.lock().faults.pop_front()
    }
}

/// Status side of a [`SimMachine`]
pub struct SimStatusSource {
    state: Arc<Mutex<SimState>>,
}

impl StatusSource for SimStatusSource {
    fn task_mode(&self) -> TaskMode {
        self.state.lock().task_mode
    }

    fn traj_mode(&self) -> TrajMode {
        self.state.lock().traj_mode
    }

    fn exec_state(&self) -> ExecState {
        self.state
            .lock()
            .exec_states
            .pop_front()
            .unwrap_or(ExecState::Done)
    }

    fn is_homed(&self, joint: usize) -> bool {
        self.state.lock().homed.get(joint).copied().unwrap_or(false)
    }

    fn is_all_homed(&self) -> bool {
        self.state.lock().homed.iter().all(|&homed| homed)
    }

    fn machine_is_on(&self) -> bool {
        self.state.lock().machine_on
    }

    fn is_auto_running(&self) -> bool {
        self.state.lock().auto_running
    }

    fn is_auto_paused(&self) -> bool {
        self.state.lock().auto_paused
    }

    fn joint_type(&self, joint: usize) -> JointType {
        self.state
            .lock()
            .joint_types
            .get(joint)
            .copied()
            .unwrap_or(JointType::Linear)
    }

    fn kinematics_identity(&self) -> bool {
        self.state.lock().identity_kinematics
    }

    fn tool_in_spindle(&self) -> i32 {
        self.state.lock().tool_in_spindle
    }

    fn loaded_file(&self) -> Option<PathBuf> {
        self.state.lock().loaded_file.clone()
    }

    fn spindle_speed(&self, spindle: usize) -> f64 {
        self.state
            .lock()
            .spindle_speeds
            .get(spindle)
            .copied()
            .unwrap_or(0.0)
    }

    fn flood_on(&self) -> bool {
        self.state.lock().flood
    }

    fn mist_on(&self) -> bool {
        self.state.lock().mist
    }

    fn optional_stop_on(&self) -> bool {
        self.state.lock().optional_stop
    }

    fn block_delete_on(&self) -> bool {
        self.state.lock().block_delete
    }

    fn limits_override_set(&self) -> bool {
        self.state.lock().limits_override
    }

    fn hard_limits_tripped(&self) -> bool {
        self.state.lock().hard_limits
    }
}

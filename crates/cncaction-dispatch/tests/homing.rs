//! Homing dispatch and the sequential home-all fallback

use cncaction_core::{
    fault_codes, DispatchError, EventBus, EventFilter, StatusEvent, TaskMode,
};
use cncaction_dispatch::sim::{PortCall, SimCommandPort, SimMachine, SimStatusSource};
use cncaction_dispatch::{Dispatcher, HomeTarget, MachineConfig, StatusSource};
use std::sync::{Arc, Mutex};

fn dispatcher_with(
    sim: &SimMachine,
    config: MachineConfig,
) -> (Dispatcher<SimCommandPort, SimStatusSource>, Arc<Mutex<Vec<i32>>>) {
    let (command, status) = sim.ports();
    let events = Arc::new(EventBus::new());
    let codes = Arc::new(Mutex::new(Vec::new()));
    let sink = codes.clone();
    events.subscribe(EventFilter::All, move |event| {
        if let StatusEvent::Fault(fault) = event {
            sink.lock().unwrap().push(fault.code);
        }
    });
    let d = Dispatcher::new(command, status, config, events).unwrap();
    (d, codes)
}

fn homed_joints(sim: &SimMachine, count: usize) -> Vec<bool> {
    let (_, status) = sim.ports();
    (0..count).map(|j| status.is_homed(j)).collect()
}

#[test]
fn direct_joint_home_forces_manual_and_free() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    let (mut d, _) = dispatcher_with(&sim, MachineConfig::default());

    d.home(HomeTarget::Joint(1)).unwrap();
    let calls = sim.calls();
    assert_eq!(
        calls,
        vec![
            PortCall::SetTaskMode(TaskMode::Manual),
            PortCall::SetTeleop(false),
            PortCall::Home(HomeTarget::Joint(1)),
        ]
    );
    assert_eq!(homed_joints(&sim, 3), vec![false, true, false]);
}

#[test]
fn out_of_range_joint_never_reaches_the_port() {
    let sim = SimMachine::new(3);
    let (mut d, _) = dispatcher_with(&sim, MachineConfig::default());

    let err = d.home(HomeTarget::Joint(7)).unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArgument { .. }));
    assert!(!sim.calls().iter().any(|c| matches!(c, PortCall::Home(_))));

    assert!(d.unhome(HomeTarget::Joint(7)).is_err());
}

#[test]
fn home_all_capability_issues_one_command() {
    let sim = SimMachine::new(3);
    let config = MachineConfig {
        home_all: true,
        joint_sequence: Vec::new(),
        ..Default::default()
    };
    let (mut d, _) = dispatcher_with(&sim, config);

    d.home(HomeTarget::All).unwrap();
    assert!(sim.calls().contains(&PortCall::Home(HomeTarget::All)));
    assert_eq!(homed_joints(&sim, 3), vec![true, true, true]);
}

#[test]
fn fallback_walk_homes_one_joint_per_request() {
    let sim = SimMachine::new(3);
    let (mut d, codes) = dispatcher_with(&sim, MachineConfig::default());

    // request 1: Z (joint 2) first, with the one-time warning
    d.home(HomeTarget::All).unwrap();
    assert_eq!(homed_joints(&sim, 3), vec![false, false, true]);
    assert_eq!(*codes.lock().unwrap(), vec![fault_codes::OPERATOR_ERROR]);
    assert!(d.homing_warning_pending());

    // request 2: first joint in sequence, with a press-again advisory
    d.home(HomeTarget::All).unwrap();
    assert_eq!(homed_joints(&sim, 3), vec![true, false, true]);
    assert_eq!(
        *codes.lock().unwrap(),
        vec![fault_codes::OPERATOR_ERROR, fault_codes::ADVISORY]
    );
    assert!(d.homing_warning_pending());

    // request 3: the last joint, walk complete, no further advisory
    d.home(HomeTarget::All).unwrap();
    assert_eq!(homed_joints(&sim, 3), vec![true, true, true]);
    assert_eq!(codes.lock().unwrap().len(), 2);
    assert!(!d.homing_warning_pending());

    // exactly one home command per request
    let homes: Vec<_> = sim
        .calls()
        .into_iter()
        .filter(|c| matches!(c, PortCall::Home(_)))
        .collect();
    assert_eq!(
        homes,
        vec![
            PortCall::Home(HomeTarget::Joint(2)),
            PortCall::Home(HomeTarget::Joint(0)),
            PortCall::Home(HomeTarget::Joint(1)),
        ]
    );
}

#[test]
fn fallback_walk_on_all_homed_machine_is_a_no_op() {
    let sim = SimMachine::new(3);
    for joint in 0..3 {
        sim.set_homed(joint, true);
    }
    let (mut d, codes) = dispatcher_with(&sim, MachineConfig::default());

    d.home(HomeTarget::All).unwrap();
    assert!(!sim.calls().iter().any(|c| matches!(c, PortCall::Home(_))));
    assert!(codes.lock().unwrap().is_empty());
    assert!(!d.homing_warning_pending());
}

#[test]
fn fallback_walk_resumes_after_partial_homing() {
    let sim = SimMachine::new(3);
    // Z and X already homed from an earlier, interrupted walk
    sim.set_homed(2, true);
    sim.set_homed(0, true);
    let (mut d, codes) = dispatcher_with(&sim, MachineConfig::default());

    d.home(HomeTarget::All).unwrap();
    assert_eq!(homed_joints(&sim, 3), vec![true, true, true]);
    // Z was homed, so no Z-first warning; the walk went straight to Y
    assert!(codes.lock().unwrap().is_empty());
    assert!(!d.homing_warning_pending());
}

#[test]
fn exhausted_sequence_reports_a_config_error() {
    let sim = SimMachine::new(3);
    let config = MachineConfig {
        // sequence covers only Z; joints 0 and 1 can never be reached
        joint_sequence: vec![2],
        ..Default::default()
    };
    let (mut d, _) = dispatcher_with(&sim, config);

    d.home(HomeTarget::All).unwrap();
    let err = d.home(HomeTarget::All).unwrap_err();
    assert!(matches!(err, DispatchError::Config { .. }));
    assert!(!d.homing_warning_pending());
}

#[test]
fn unhome_all_drops_every_reference() {
    let sim = SimMachine::new(3);
    for joint in 0..3 {
        sim.set_homed(joint, true);
    }
    let (mut d, _) = dispatcher_with(&sim, MachineConfig::default());

    d.unhome(HomeTarget::All).unwrap();
    assert_eq!(homed_joints(&sim, 3), vec![false, false, false]);
}

//! Mode guard and saved-mode slot behavior

use cncaction_core::{DispatchError, EventBus, TaskMode};
use cncaction_dispatch::sim::{PortCall, SimCommandPort, SimMachine, SimStatusSource};
use cncaction_dispatch::{Dispatcher, MachineConfig};
use std::sync::Arc;

fn dispatcher(sim: &SimMachine) -> Dispatcher<SimCommandPort, SimStatusSource> {
    let (command, status) = sim.ports();
    Dispatcher::new(command, status, MachineConfig::default(), Arc::new(EventBus::new())).unwrap()
}

#[test]
fn matching_mode_is_a_no_op() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    let change = d.ensure_mode(TaskMode::Manual);
    assert!(!change.changed);
    assert_eq!(change.previous, TaskMode::Manual);
    assert!(sim.calls().is_empty());
    assert_eq!(sim.wait_calls(), 0);
}

#[test]
fn mode_change_issues_one_command_and_waits() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    let change = d.ensure_mode(TaskMode::Mdi);
    assert!(change.changed);
    assert_eq!(change.previous, TaskMode::Manual);
    assert_eq!(sim.calls(), vec![PortCall::SetTaskMode(TaskMode::Mdi)]);
    assert_eq!(sim.wait_calls(), 1);

    // now a no-op
    let change = d.ensure_mode(TaskMode::Mdi);
    assert!(!change.changed);
    assert_eq!(sim.wait_calls(), 1);
}

#[test]
fn record_then_restore_round_trips() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    assert_eq!(d.record_current_mode(), TaskMode::Manual);
    d.ensure_mode(TaskMode::Mdi);

    let change = d.restore_recorded_mode().unwrap();
    assert!(change.changed);
    assert_eq!(change.previous, TaskMode::Mdi);

    let (_, status) = sim.ports();
    use cncaction_dispatch::StatusSource;
    assert_eq!(status.task_mode(), TaskMode::Manual);
}

#[test]
fn restore_without_record_is_an_error() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    let err = d.restore_recorded_mode().unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArgument { .. }));
    assert!(sim.calls().is_empty());
}

#[test]
fn restore_consumes_the_slot() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    d.record_current_mode();
    d.ensure_mode(TaskMode::Auto);
    d.restore_recorded_mode().unwrap();

    // slot is empty now; a second restore is a programming error
    assert!(d.restore_recorded_mode().is_err());
    assert_eq!(d.recorded_mode(), None);
}

#[test]
fn record_overwrites_the_slot() {
    let sim = SimMachine::new(3);
    let mut d = dispatcher(&sim);

    d.record_current_mode();
    sim.set_task_mode(TaskMode::Auto);
    assert_eq!(d.record_current_mode(), TaskMode::Auto);
    assert_eq!(d.recorded_mode(), Some(TaskMode::Auto));
}

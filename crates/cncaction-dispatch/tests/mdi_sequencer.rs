//! Blocking MDI and custom-code sequencer behavior

use cncaction_core::{
    fault_codes, EventBus, EventFilter, ExecState, MachineFault, SequenceOutcome, StatusEvent,
    TaskMode, WaitOutcome,
};
use cncaction_dispatch::sim::{PortCall, SimCommandPort, SimMachine, SimStatusSource};
use cncaction_dispatch::{Dispatcher, MachineConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn dispatcher_with(
    sim: &SimMachine,
    config: MachineConfig,
) -> (Dispatcher<SimCommandPort, SimStatusSource>, Arc<Mutex<Vec<StatusEvent>>>) {
    let (command, status) = sim.ports();
    let events = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    events.subscribe(EventFilter::All, move |event| {
        sink.lock().unwrap().push(event.clone());
    });
    let d = Dispatcher::new(command, status, config, events).unwrap();
    (d, seen)
}

fn dispatcher(
    sim: &SimMachine,
) -> (Dispatcher<SimCommandPort, SimStatusSource>, Arc<Mutex<Vec<StatusEvent>>>) {
    dispatcher_with(sim, MachineConfig::default())
}

#[test]
fn block_runs_line_by_line_in_order() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_mdi_wait("G0 X1\n\n  G0 X2  \n", TIMEOUT);
    assert_eq!(outcome, SequenceOutcome::Completed);
    assert_eq!(sim.mdi_lines(), vec!["G0 X1", "G0 X2"]);
    // one wait per line, none for the mode (already MDI)
    assert_eq!(sim.wait_calls(), 2);
}

#[test]
fn timeout_aborts_and_abandons_the_block() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_wait(WaitOutcome::Timeout);
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_mdi_wait("G0 X1\nG0 X2", TIMEOUT);
    assert_eq!(outcome, SequenceOutcome::TimedOut);
    // the second line was never issued
    assert_eq!(sim.mdi_lines(), vec!["G0 X1"]);
    // the abort switched to Auto first
    let calls = sim.calls();
    assert_eq!(
        calls.last(),
        Some(&PortCall::Abort),
        "timeout must end in an abort: {:?}",
        calls
    );
    assert!(calls.contains(&PortCall::SetTaskMode(TaskMode::Auto)));
}

#[test]
fn runtime_error_stops_the_block_with_fault_detail() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_wait(WaitOutcome::Error);
    sim.push_fault(MachineFault::new(9, "linear move exceeds limits"));
    let (mut d, seen) = dispatcher(&sim);

    let outcome = d.call_mdi_wait("G0 X9999", TIMEOUT);
    assert_eq!(
        outcome,
        SequenceOutcome::MachineError {
            code: 9,
            message: "linear move exceeds limits".into()
        }
    );
    // no abort on a plain runtime error
    assert!(!sim.calls().contains(&PortCall::Abort));
    let seen = seen.lock().unwrap();
    assert!(matches!(seen.as_slice(), [StatusEvent::Fault(f)] if f.code == 9));
}

#[test]
fn runtime_error_without_fault_detail_reports_generic() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_wait(WaitOutcome::Error);
    let (mut d, _) = dispatcher(&sim);

    match d.call_mdi_wait("G0 X1", TIMEOUT) {
        SequenceOutcome::MachineError { code, .. } => assert_eq!(code, fault_codes::NML_ERROR),
        other => panic!("expected a machine error, got {:?}", other),
    }
}

#[test]
fn fault_on_the_error_channel_stops_the_block() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.push_fault(MachineFault::new(11, "probe tripped"));
    let (mut d, seen) = dispatcher(&sim);

    let outcome = d.call_mdi_wait("G38.2 Z-10 F50\nG0 Z5", TIMEOUT);
    assert_eq!(
        outcome,
        SequenceOutcome::MachineError {
            code: 11,
            message: "probe tripped".into()
        }
    );
    assert_eq!(sim.mdi_lines(), vec!["G38.2 Z-10 F50"]);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn external_abort_surfaces_without_a_second_abort() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_wait(WaitOutcome::Aborted);
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_mdi_wait("G0 X1", TIMEOUT);
    assert_eq!(outcome, SequenceOutcome::Aborted);
    assert!(!sim.calls().contains(&PortCall::Abort));
}

#[test]
fn preconfigured_mdi_commands_split_on_semicolons() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    let config = MachineConfig {
        mdi_commands: vec!["G53 G0 Z0; G53 G0 X0 Y0".to_string()],
        ..Default::default()
    };
    let (mut d, _) = dispatcher_with(&sim, config);

    d.call_ini_mdi(0).unwrap();
    assert_eq!(sim.mdi_lines(), vec!["G53 G0 Z0", "G53 G0 X0 Y0"]);

    let err = d.call_ini_mdi(1).unwrap_err();
    assert!(matches!(err, cncaction_core::DispatchError::InvalidArgument { .. }));
}

#[test]
fn oword_call_polls_until_motion_settles() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_exec_state(ExecState::WaitingForMotion);
    sim.script_exec_state(ExecState::WaitingForMotionAndIo);
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_oword_wait("o<touch_plate> call", TIMEOUT);
    assert_eq!(outcome, SequenceOutcome::Completed);
    assert_eq!(sim.mdi_lines(), vec!["o<touch_plate> call"]);
    // two poll-loop waits plus the final completion wait
    assert_eq!(sim.wait_calls(), 3);
}

#[test]
fn oword_timeout_mid_poll_aborts() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.script_exec_state(ExecState::WaitingForMotion);
    sim.script_wait(WaitOutcome::Timeout);
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_oword_wait("o<touch_plate> call", TIMEOUT);
    assert_eq!(outcome, SequenceOutcome::TimedOut);
    assert_eq!(sim.calls().last(), Some(&PortCall::Abort));
}

#[test]
fn oword_fault_at_final_check_is_caught() {
    let sim = SimMachine::new(3);
    sim.set_task_mode(TaskMode::Mdi);
    sim.push_fault(MachineFault::new(1, "o-word subroutine errored"));
    let (mut d, _) = dispatcher(&sim);

    let outcome = d.call_oword_wait("o<broken> call", TIMEOUT);
    assert!(!outcome.is_success());
}

#[test]
fn unwaited_mdi_ensures_mode_only() {
    let sim = SimMachine::new(3);
    let (mut d, _) = dispatcher(&sim);

    d.call_mdi("G0 X1");
    assert_eq!(
        sim.calls(),
        vec![
            PortCall::SetTaskMode(TaskMode::Mdi),
            PortCall::SubmitMdi("G0 X1".to_string())
        ]
    );
    // mode-change wait only; the command itself is not waited on
    assert_eq!(sim.wait_calls(), 1);
}

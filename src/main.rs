//! Demo session against a simulated machine
//!
//! Powers up, walks the sequential home-all fallback to completion, runs a
//! waited MDI block, jogs, and writes a work offset, printing every status
//! event the dispatcher publishes along the way.

use cncaction::sim::SimMachine;
use cncaction::{
    init_logging, Axis, Dispatcher, EventBus, EventFilter, HomeTarget, JogInput, MachineConfig,
    TaskMode,
};
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!(
        version = cncaction::VERSION,
        built = cncaction::BUILD_DATE,
        "cncaction demo"
    );

    let sim = SimMachine::new(3);
    let (command, status) = sim.ports();

    let events = Arc::new(EventBus::new());
    events.subscribe(EventFilter::All, |event| {
        println!("  [event] {}", event);
    });

    let mut dispatcher = Dispatcher::new(command, status, MachineConfig::default(), events)?;

    println!("== power up ==");
    dispatcher.set_estop(false);
    dispatcher.set_machine_power(true);

    println!("== home all (sequential fallback, one joint per request) ==");
    let mut presses = 0;
    loop {
        presses += 1;
        dispatcher.home(HomeTarget::All)?;
        if !dispatcher.homing_warning_pending() {
            break;
        }
    }
    println!("  homed in {} requests", presses);

    println!("== waited MDI block ==");
    let outcome = dispatcher.call_mdi_wait("G0 X10 Y10\nG1 Z-1 F100", Duration::from_secs(5));
    println!("  outcome: {}", outcome);

    println!("== jog ==");
    dispatcher.ensure_mode(TaskMode::Manual);
    dispatcher.jog(JogInput::Axis(Axis::X), 1, 5.0, 0.0)?;
    dispatcher.stop_jog(JogInput::Axis(Axis::X));

    println!("== zero the Z work origin ==");
    dispatcher.set_axis_origin(Axis::Z, 0.0)?;

    println!("== session transcript ==");
    for call in sim.calls() {
        println!("  {:?}", call);
    }

    Ok(())
}

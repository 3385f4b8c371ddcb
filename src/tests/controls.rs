use crate::driver::run_power_flow;
use crate::options::{PowerFlowOptions, PowerFlowOptionsBuilder};
use crate::tests::support::*;
use spsolve::rlu::RLU;

#[test]
fn regulating_transformer_holds_its_setpoint() {
    let circuit = with_regulating_transformer(1.01);
    let options = PowerFlowOptions::default();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    assert!((results.voltage[2].norm() - 1.01).abs() < 1e-12);
    // the tap moved off its neutral position to do it
    assert!((results.tap[2] - 1.0).abs() > 1e-6);
}

#[test]
fn reactive_limit_demotes_pv_bus() {
    let mut circuit = three_bus();
    circuit.gen[1].qmax = 5.0;

    let options = PowerFlowOptions::default();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    // the PV bus could not hold 1.02 p.u. with 5 MVAr
    assert!(results.voltage[1].norm() < 1.02);
    assert!(results
        .report
        .events
        .iter()
        .any(|e| e.message.contains("reactive limit")));
}

#[test]
fn reactive_limit_enforcement_is_monotonic() {
    let options = PowerFlowOptions::default();

    let unlimited = run_power_flow(&three_bus(), &options, &RLU::default()).unwrap();
    assert!(unlimited.converged);

    let mut circuit = three_bus();
    circuit.gen[1].qmax = 5.0;
    let limited = run_power_flow(&circuit, &options, &RLU::default()).unwrap();
    assert!(limited.converged);

    // less reactive headroom can only lower the held voltage
    assert!(limited.voltage[1].norm() < unlimited.voltage[1].norm());
}

#[test]
fn disabled_q_control_keeps_the_setpoint() {
    let mut circuit = three_bus();
    circuit.gen[1].qmax = 5.0;

    let options = PowerFlowOptionsBuilder::default()
        .control_q(false)
        .build()
        .unwrap();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    assert!((results.voltage[1].norm() - 1.02).abs() < 1e-9);
}

#[test]
fn tap_module_clamp_fixes_the_branch() {
    let mut circuit = with_regulating_transformer(1.08);
    circuit.branch[2].tap_min = 0.98;
    circuit.branch[2].tap_max = 1.01;

    let options = PowerFlowOptions::default();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    // boosting the "to" side means lowering the module, so the lower
    // bound is the one that binds
    assert_eq!(results.tap[2], 0.98);
    // the setpoint was out of reach
    assert!(results.voltage[2].norm() < 1.08);
    assert!(results
        .report
        .events
        .iter()
        .any(|e| e.message.contains("tap module limit")));
}

#[test]
fn droop_converter_follows_its_characteristic() {
    let mut circuit = with_converter();
    let br = &mut circuit.branch[2];
    br.br_b = 0.0;
    br.is_converter = true;
    br.control_mode = crate::circuit::ControlMode::Droop;
    br.pset = 0.2;
    br.vset = 1.0;
    br.kdp = 0.1;

    let options = PowerFlowOptions::default();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    // Pf = Pset + kdp * (Vmf - Vset) on the droop branch
    let pf = results.s_f[2].re;
    let vmf = results.voltage[1].norm();
    assert!((-pf + 0.2 + 0.1 * (vmf - 1.0)).abs() < 1e-7);
}

#[test]
fn distributed_slack_spreads_the_mismatch() {
    let circuit = three_bus();
    let options = PowerFlowOptionsBuilder::default()
        .distributed_slack(true)
        .max_iterations(40usize)
        .build()
        .unwrap();
    let results = run_power_flow(&circuit, &options, &RLU::default()).unwrap();

    assert!(results.converged);
    assert!(results
        .report
        .events
        .iter()
        .any(|e| e.message.contains("slack power distributed")));
}

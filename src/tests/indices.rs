use crate::circuit::{BusType, ControlMode};
use crate::errors::PowerFlowError;
use crate::indices::SimulationIndices;
use crate::options::PowerFlowOptions;
use crate::report::SolveReport;
use crate::tests::support::*;

fn compile(
    circuit: &crate::circuit::Circuit,
) -> Result<(SimulationIndices, Vec<BusType>), PowerFlowError> {
    let options = PowerFlowOptions::default();
    let mut bus_types: Vec<BusType> = circuit.bus.iter().map(|b| b.bus_type).collect();
    let control_modes: Vec<ControlMode> =
        circuit.branch.iter().map(|br| br.control_mode).collect();
    let mut report = SolveReport::new();
    let ix = SimulationIndices::compile(
        circuit,
        &options,
        &mut bus_types,
        &control_modes,
        &mut report,
    )?;
    Ok((ix, bus_types))
}

#[test]
fn plain_case_partition() {
    let circuit = three_bus();
    let (ix, _) = compile(&circuit).unwrap();

    assert_eq!(ix.vd, vec![0]);
    assert_eq!(ix.pv, vec![1]);
    assert_eq!(ix.pq, vec![2]);
    assert_eq!(ix.idx_dva, vec![1, 2]);
    assert_eq!(ix.idx_dvm, vec![2]);
    assert!(ix.idx_dm.is_empty());
    assert!(ix.idx_dtau.is_empty());
    assert!(ix.idx_dbeq.is_empty());
    assert_eq!(ix.n_unknowns(), ix.n_rows());
    assert_eq!(ix.n_unknowns(), 3);
}

#[test]
fn regulating_transformer_marks_pqv() {
    let circuit = with_regulating_transformer(1.01);
    let (ix, bus_types) = compile(&circuit).unwrap();

    assert_eq!(bus_types[2], BusType::PQV);
    assert_eq!(ix.k_v_m, vec![2]);
    assert_eq!(ix.idx_dm, vec![2]);
    assert!(ix.idx_dvm.is_empty());
    assert_eq!(ix.idx_dq, vec![2]);
    assert_eq!(ix.n_unknowns(), ix.n_rows());
}

#[test]
fn converter_gets_zero_qf_constraint() {
    let circuit = with_converter();
    let (ix, _) = compile(&circuit).unwrap();

    assert_eq!(ix.k_zero_beq, vec![1]);
    assert_eq!(ix.idx_dbeq, vec![1]);
    assert_eq!(ix.idx_dqf, vec![1]);
    assert_eq!(ix.n_unknowns(), ix.n_rows());
}

#[test]
fn converter_holding_own_bus_frees_beq_instead_of_tap() {
    let mut circuit = with_converter();
    let br = &mut circuit.branch[1];
    br.f_bus = 2;
    br.t_bus = 0;
    br.control_mode = ControlMode::VoltageModule;
    br.ctrl_bus = Some(2);
    let (ix, bus_types) = compile(&circuit).unwrap();

    assert_eq!(ix.k_vf_beq, vec![1]);
    assert!(ix.k_v_m.is_empty());
    assert!(ix.k_zero_beq.is_empty());
    assert_eq!(bus_types[2], BusType::PQV);
    assert_eq!(ix.n_unknowns(), ix.n_rows());
}

#[test]
fn no_slack_is_a_configuration_error() {
    let mut circuit = three_bus();
    circuit.bus[0].bus_type = BusType::PQ;
    circuit.gen.remove(0);

    assert!(matches!(
        compile(&circuit),
        Err(PowerFlowError::Configuration(_))
    ));
}

#[test]
fn multiple_slacks_are_a_configuration_error() {
    let mut circuit = three_bus();
    circuit.bus[1].bus_type = BusType::Slack;

    assert!(matches!(
        compile(&circuit),
        Err(PowerFlowError::Configuration(_))
    ));
}

#[test]
fn disabled_tap_control_leaves_branch_fixed() {
    let circuit = with_regulating_transformer(1.01);
    let options = PowerFlowOptions {
        control_taps_modules: false,
        ..Default::default()
    };
    let mut bus_types: Vec<BusType> = circuit.bus.iter().map(|b| b.bus_type).collect();
    let control_modes: Vec<ControlMode> =
        circuit.branch.iter().map(|br| br.control_mode).collect();
    let mut report = SolveReport::new();
    let ix = SimulationIndices::compile(
        &circuit,
        &options,
        &mut bus_types,
        &control_modes,
        &mut report,
    )
    .unwrap();

    assert!(ix.k_v_m.is_empty());
    assert_eq!(bus_types[2], BusType::PQ);
    assert_eq!(ix.n_unknowns(), 3);
}

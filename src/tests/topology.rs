use crate::circuit::ControlMode;
use crate::report::SolveReport;
use crate::tests::support::*;
use crate::topology::{adjacency, find_islands, split_into_islands};

#[test]
fn connected_circuit_is_one_island() {
    let circuit = three_bus();
    let islands = split_into_islands(&circuit, true, &mut SolveReport::new());

    assert_eq!(islands.len(), 1);
    assert_eq!(islands[0].bus_idx, vec![0, 1, 2]);
    assert_eq!(islands[0].branch_idx, vec![0, 1, 2]);
    assert_eq!(islands[0].gen_idx, vec![0, 1]);
}

#[test]
fn two_components_split_and_remap() {
    let circuit = two_component();
    let islands = split_into_islands(&circuit, true, &mut SolveReport::new());

    assert_eq!(islands.len(), 2);
    assert_eq!(islands[0].bus_idx, vec![0, 1, 2]);
    assert_eq!(islands[1].bus_idx, vec![3, 4]);

    let second = &islands[1];
    assert_eq!(second.circuit.nb(), 2);
    assert_eq!(second.branch_idx, vec![3]);
    // the 3-4 line is remapped to local numbering
    assert_eq!(second.circuit.branch[0].f_bus, 0);
    assert_eq!(second.circuit.branch[0].t_bus, 1);
    // the slack generator at original bus 3 follows its bus
    assert_eq!(second.gen_idx, vec![2]);
    assert_eq!(second.circuit.gen[0].gen_bus, 0);
    // bus numbering is consecutive again
    assert!(second.circuit.validate().is_ok());
}

#[test]
fn inactive_branch_splits_the_circuit() {
    let mut circuit = three_bus();
    circuit.branch[0].in_service = false;
    circuit.branch[1].in_service = false;
    let islands = split_into_islands(&circuit, false, &mut SolveReport::new());

    assert_eq!(islands.len(), 2);
    assert_eq!(islands[0].bus_idx, vec![0]);
    assert_eq!(islands[1].bus_idx, vec![1, 2]);
}

#[test]
fn single_bus_islands_can_be_ignored() {
    let mut circuit = three_bus();
    circuit.branch[0].in_service = false;
    circuit.branch[1].in_service = false;

    let islands = split_into_islands(&circuit, true, &mut SolveReport::new());
    assert_eq!(islands.len(), 1);
    assert_eq!(islands[0].bus_idx, vec![1, 2]);
}

#[test]
fn control_targeting_another_island_is_fixed() {
    let mut circuit = two_component();
    // branch 1-2 tries to hold a bus that splits into the other component
    let br = &mut circuit.branch[2];
    br.control_mode = ControlMode::VoltageModule;
    br.ctrl_bus = Some(4);
    br.vset = 1.05;

    let mut report = SolveReport::new();
    let islands = split_into_islands(&circuit, true, &mut report);

    let sliced = &islands[0].circuit.branch[2];
    assert_eq!(sliced.control_mode, ControlMode::Fixed);
    assert_eq!(sliced.ctrl_bus, None);
    assert!(report
        .events
        .iter()
        .any(|e| e.message.contains("outside the island")));
}

#[test]
fn traversal_ignores_inactive_buses() {
    let circuit = two_component();
    let adj = adjacency(&circuit);
    let mut active: Vec<bool> = circuit.bus.iter().map(|b| b.is_on()).collect();
    active[1] = false;

    let islands = find_islands(&adj, &active);
    // bus 1 drops out; 0 and 2 stay joined by the 0-2 line
    assert_eq!(islands, vec![vec![0, 2], vec![3, 4]]);
}

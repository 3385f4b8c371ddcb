use crate::circuit::{Circuit, ControlMode};
use crate::formulation::Formulation;
use crate::options::{PowerFlowOptions, PowerFlowOptionsBuilder};
use crate::tests::support::*;

/// Circuit exercising every unknown family: free angle on branch 0,
/// free Beq on the converter, free module on the regulating transformer.
fn controlled_circuit() -> Circuit {
    let mut c = with_converter();
    c.branch[0].control_mode = ControlMode::ActiveFrom;
    c.branch[0].pset = 0.2;
    let br = &mut c.branch[2];
    br.control_mode = ControlMode::VoltageModule;
    br.ctrl_bus = Some(2);
    br.vset = 1.01;
    c
}

#[test]
fn analytic_jacobian_matches_finite_differences() {
    let circuit = controlled_circuit();

    let analytic_opts = PowerFlowOptions::default();
    let mut fm = Formulation::new(&circuit, &analytic_opts).unwrap();
    let f0 = fm.residual();
    let jac = fm.jacobian().unwrap().to_csr();

    let fd_opts = PowerFlowOptionsBuilder::default()
        .finite_difference(true)
        .build()
        .unwrap();
    let mut fm_fd = Formulation::new(&circuit, &fd_opts).unwrap();
    let f0_fd = fm_fd.residual();
    let jac_fd = fm_fd.jacobian().unwrap().to_csr();

    assert_eq!(f0.len(), f0_fd.len());
    assert_eq!(jac.rows(), f0.len());
    assert_eq!(jac.rows(), jac.cols());

    // compare through a matrix-vector product; entrywise access is not
    // needed to catch a wrong block or a wrong sign
    let x: Vec<f64> = (0..jac.cols())
        .map(|j| 0.1 + 0.05 * (j as f64) * if j % 2 == 0 { 1.0 } else { -1.0 })
        .collect();
    let y = &jac * x.as_slice();
    let y_fd = &jac_fd * x.as_slice();

    for (row, (a, b)) in y.iter().zip(&y_fd).enumerate() {
        assert!(
            (a - b).abs() < 1e-4,
            "row {}: analytic {} vs finite difference {}",
            row,
            a,
            b
        );
    }
}

#[test]
fn jacobian_is_square_for_the_plain_case() {
    let circuit = three_bus();
    let options = PowerFlowOptions::default();
    let mut fm = Formulation::new(&circuit, &options).unwrap();
    let f = fm.residual();
    let jac = fm.jacobian().unwrap();

    assert_eq!(jac.rows(), 3);
    assert_eq!(jac.cols(), 3);
    assert_eq!(f.len(), 3);
}

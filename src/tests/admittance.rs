use crate::admittance::make_admittances;
use crate::circuit::Circuit;
use crate::cmplx;
use crate::options::PowerFlowOptions;
use crate::tests::support::*;
use num_complex::Complex64;

fn build(circuit: &Circuit) -> crate::admittance::Admittances {
    let options = PowerFlowOptions::default();
    let tap: Vec<f64> = circuit.branch.iter().map(|br| br.tap).collect();
    let tap_angle: Vec<f64> = circuit.branch.iter().map(|br| br.tap_angle).collect();
    let beq: Vec<f64> = circuit.branch.iter().map(|br| br.beq).collect();
    make_admittances(circuit, &options, &tap, &tap_angle, &beq)
}

fn close(a: Complex64, b: Complex64) -> bool {
    (a - b).norm() < 1e-12
}

#[test]
fn plain_line_is_symmetric() {
    let circuit = three_bus();
    let adm = build(&circuit);

    for k in 0..circuit.nl() {
        assert!(close(adm.yff[k], adm.ytt[k]), "branch {}", k);
        assert!(close(adm.yft[k], adm.ytf[k]), "branch {}", k);
    }
}

#[test]
fn pi_model_values() {
    let circuit = three_bus();
    let adm = build(&circuit);

    let br = &circuit.branch[0];
    let ys = cmplx!(1.0) / cmplx!(br.br_r + 1e-20, br.br_x);
    assert!(close(adm.yff[0], ys + cmplx!(0.0, br.br_b / 2.0)));
    assert!(close(adm.yft[0], -ys));
}

#[test]
fn tap_module_scales_the_from_side() {
    let mut circuit = three_bus();
    circuit.branch[0].tap = 1.05;
    let adm = build(&circuit);

    let br = &circuit.branch[0];
    let ys = cmplx!(1.0) / cmplx!(br.br_r + 1e-20, br.br_x);
    let ytt = ys + cmplx!(0.0, br.br_b / 2.0);
    assert!(close(adm.yff[0], ytt / cmplx!(1.05 * 1.05)));
    assert!(close(adm.yft[0], -ys / cmplx!(1.05)));
    assert!(close(adm.ytt[0], ytt));
}

#[test]
fn tap_angle_shifts_the_off_diagonals() {
    let mut circuit = three_bus();
    let tau = 0.1;
    circuit.branch[0].tap_angle = tau;
    let adm = build(&circuit);

    let br = &circuit.branch[0];
    let ys = cmplx!(1.0) / cmplx!(br.br_r + 1e-20, br.br_x);
    assert!(close(adm.yft[0], -ys / Complex64::from_polar(1.0, -tau)));
    assert!(close(adm.ytf[0], -ys / Complex64::from_polar(1.0, tau)));
    // the angle does not touch the diagonal terms
    assert!(close(adm.yff[0], ys + cmplx!(0.0, br.br_b / 2.0)));
}

#[test]
fn beq_enters_the_from_diagonal_only() {
    let mut circuit = with_converter();
    circuit.branch[1].beq = 0.25;
    let adm = build(&circuit);

    let br = &circuit.branch[1];
    let ys = cmplx!(1.0) / cmplx!(br.br_r + 1e-20, br.br_x);
    assert!(close(adm.yff[1], ys + cmplx!(0.0, 0.25)));
    assert!(close(adm.ytt[1], ys));
}

#[test]
fn bus_shunts_land_on_the_diagonal() {
    let mut circuit = three_bus();
    circuit.bus[2].gs = 5.0;
    circuit.bus[2].bs = -20.0;
    let adm = build(&circuit);

    assert!(close(adm.y_sh[2], cmplx!(0.05, -0.2)));

    // Ybus(2,2) = Yff/Ytt contributions of the incident lines + shunt
    let diag = adm.ytt[1] + adm.ytt[2] + adm.y_sh[2];
    let row: Vec<Complex64> = (0..circuit.nb())
        .map(|j| {
            let dense = adm.y_bus.select(Some(&[2]), Some(&[j])).unwrap();
            dense.values().iter().sum()
        })
        .collect();
    assert!(close(row[2], diag));
}

#[test]
fn ybus_equals_the_incidence_assembly() {
    let mut circuit = three_bus();
    circuit.bus[1].bs = 10.0;
    circuit.branch[0].tap = 1.04;
    circuit.branch[1].tap_angle = 0.05;
    let adm = build(&circuit);

    // Ybus = Cf'*Yf + Ct'*Yt + diag(Ysh)
    let (cf, ct) = circuit.incidence();
    let y_alt = (&cf.t() * &adm.y_f + &ct.t() * &adm.y_t).to_csr()
        + sparsetools::csr::CSR::with_diagonal(adm.y_sh.clone());

    let v: Vec<Complex64> = (0..circuit.nb())
        .map(|i| Complex64::from_polar(1.0 + 0.01 * i as f64, 0.02 * i as f64))
        .collect();
    let i1 = &adm.y_bus * v.as_slice();
    let i2 = &y_alt * v.as_slice();
    for (a, b) in i1.iter().zip(&i2) {
        assert!(close(*a, *b));
    }
}

#[test]
fn inactive_branch_contributes_nothing() {
    let mut circuit = three_bus();
    circuit.branch[2].in_service = false;
    let adm = build(&circuit);

    assert_eq!(adm.yff[2], Complex64::default());
    assert_eq!(adm.yft[2], Complex64::default());
}

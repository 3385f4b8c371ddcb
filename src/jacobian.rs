use anyhow::Result;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;
use sparsetools::csr::CCSR;

use crate::admittance::Admittances;
use crate::circuit::Circuit;
use crate::derivatives::{branch_derivatives, d_sbus_d_v};
use crate::indices::SimulationIndices;
use crate::power::{d_zip_d_vm, ScheduledPowers};

/// Forms the power flow Jacobian for the controlled formulation.
///
/// The residual rows are (P, Q, Pf, Qf, Pt, Qt) and the unknown columns
/// are (Va, Vm, m, tau, Beq), both restricted to the index lists of the
/// current partition. Every block is selected out of the closed-form
/// full-space derivative matrices and composed into one sparse matrix.
/// The units for all quantities are in per unit with radians for voltage
/// angles.
pub fn build_jacobian(
    circuit: &Circuit,
    adm: &Admittances,
    powers: &ScheduledPowers,
    v: &[Complex64],
    tap: &[f64],
    ix: &SimulationIndices,
) -> Result<CSC<usize, f64>> {
    let (dsbus_dva, dsbus_dvm) = d_sbus_d_v(&adm.y_bus, v, false);

    // the scheduled injection follows Vm through its ZIP terms, so the
    // residual derivative carries the correction
    let vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();
    let dsbus_dvm = dsbus_dvm - d_zip_d_vm(&powers.i0, &powers.y0, &vm);

    let bd = branch_derivatives(circuit, adm, v, tap, &ix.is_droop);

    let dp = Some(ix.idx_dp.as_slice());
    let dq = Some(ix.idx_dq.as_slice());
    let dpf = Some(ix.idx_dpf.as_slice());
    let dqf = Some(ix.idx_dqf.as_slice());
    let dpt = Some(ix.idx_dpt.as_slice());
    let dqt = Some(ix.idx_dqt.as_slice());

    let dva = Some(ix.idx_dva.as_slice());
    let dvm = Some(ix.idx_dvm.as_slice());
    let dm = Some(ix.idx_dm.as_slice());
    let dtau = Some(ix.idx_dtau.as_slice());
    let dbeq = Some(ix.idx_dbeq.as_slice());

    let j11 = dsbus_dva.select(dp, dva)?.real();
    let j12 = dsbus_dvm.select(dp, dvm)?.real();
    let j13 = bd.dsbus_dm.select(dp, dm)?.real();
    let j14 = bd.dsbus_dtau.select(dp, dtau)?.real();
    let j15 = bd.dsbus_dbeq.select(dp, dbeq)?.real();

    let j21 = dsbus_dva.select(dq, dva)?.imag();
    let j22 = dsbus_dvm.select(dq, dvm)?.imag();
    let j23 = bd.dsbus_dm.select(dq, dm)?.imag();
    let j24 = bd.dsbus_dtau.select(dq, dtau)?.imag();
    let j25 = bd.dsbus_dbeq.select(dq, dbeq)?.imag();

    let j31 = bd.dpf_dva.select(dpf, dva)?.real();
    let j32 = bd.dpf_dvm.select(dpf, dvm)?.real();
    let j33 = bd.dpf_dm.select(dpf, dm)?.real();
    let j34 = bd.dpf_dtau.select(dpf, dtau)?.real();
    let j35 = bd.dpf_dbeq.select(dpf, dbeq)?.real();

    let j41 = bd.dsf_dva.select(dqf, dva)?.imag();
    let j42 = bd.dsf_dvm.select(dqf, dvm)?.imag();
    let j43 = bd.dsf_dm.select(dqf, dm)?.imag();
    let j44 = bd.dsf_dtau.select(dqf, dtau)?.imag();
    let j45 = bd.dsf_dbeq.select(dqf, dbeq)?.imag();

    let j51 = bd.dst_dva.select(dpt, dva)?.real();
    let j52 = bd.dst_dvm.select(dpt, dvm)?.real();
    let j53 = bd.dst_dm.select(dpt, dm)?.real();
    let j54 = bd.dst_dtau.select(dpt, dtau)?.real();
    let j55 = bd.dst_dbeq.select(dpt, dbeq)?.real();

    let j61 = bd.dst_dva.select(dqt, dva)?.imag();
    let j62 = bd.dst_dvm.select(dqt, dvm)?.imag();
    let j63 = bd.dst_dm.select(dqt, dm)?.imag();
    let j64 = bd.dst_dtau.select(dqt, dtau)?.imag();
    let j65 = bd.dst_dbeq.select(dqt, dbeq)?.imag();

    let r1 = block_row(&j11.to_coo(), &j12.to_coo(), &j13.to_coo(), &j14.to_coo(), &j15.to_coo())?;
    let r2 = block_row(&j21.to_coo(), &j22.to_coo(), &j23.to_coo(), &j24.to_coo(), &j25.to_coo())?;
    let r3 = block_row(&j31.to_coo(), &j32.to_coo(), &j33.to_coo(), &j34.to_coo(), &j35.to_coo())?;
    let r4 = block_row(&j41.to_coo(), &j42.to_coo(), &j43.to_coo(), &j44.to_coo(), &j45.to_coo())?;
    let r5 = block_row(&j51.to_coo(), &j52.to_coo(), &j53.to_coo(), &j54.to_coo(), &j55.to_coo())?;
    let r6 = block_row(&j61.to_coo(), &j62.to_coo(), &j63.to_coo(), &j64.to_coo(), &j65.to_coo())?;

    let jac = Coo::v_stack(
        &Coo::v_stack3(&r1, &r2, &r3)?,
        &Coo::v_stack3(&r4, &r5, &r6)?,
    )?
    .to_csc();
    log::trace!("J:\n{}", jac.to_csr().to_table());

    Ok(jac)
}

/// Joins the five column blocks of one residual row group.
fn block_row(
    va: &Coo<usize, f64>,
    vm: &Coo<usize, f64>,
    m: &Coo<usize, f64>,
    tau: &Coo<usize, f64>,
    beq: &Coo<usize, f64>,
) -> Result<Coo<usize, f64>> {
    Coo::h_stack(&Coo::h_stack3(va, vm, m)?, &Coo::h_stack(tau, beq)?)
}

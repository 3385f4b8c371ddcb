use crate::admittance::Admittances;
use crate::circuit::Circuit;
use crate::cmplx;
use crate::math::J;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::{CCSR, CSR};

/// Computes partial derivatives of the bus power injections w.r.t. voltage.
///
/// The derivatives can be taken with respect to polar or cartesian
/// coordinates of voltage, depending on the 3rd argument.
pub fn d_sbus_d_v(
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
    cartesian: bool,
) -> (CSR<usize, Complex64>, CSR<usize, Complex64>) {
    let i_bus = y_bus * v;

    let diag_v = CSR::<usize, Complex64>::with_diagonal(v.to_vec());
    let diag_i_bus = CSR::<usize, Complex64>::with_diagonal(i_bus);

    if cartesian {
        // dSbus/dVr = conj(diagIbus) + diagV * conj(Ybus)
        // dSbus/dVi = 1j * (conj(diagIbus) - diagV * conj(Ybus))

        let d_sbus_d_vr = diag_i_bus.conj() + &diag_v * y_bus.conj();
        let d_sbus_d_vi = (diag_i_bus.conj() - &diag_v * y_bus.conj()) * Complex64::i();

        (d_sbus_d_vr, d_sbus_d_vi)
    } else {
        let v_norm = v
            .iter()
            .map(|v| v / Complex64::new(v.norm(), 0.0))
            .collect();
        let diag_v_norm = CSR::<usize, Complex64>::with_diagonal(v_norm);

        // dSbus/dVa = 1j * diagV * conj(diagIbus - Ybus * diagV)
        // dSbus/dVm = diagV * conj(Ybus * diagVnorm) + conj(diagIbus) * diagVnorm

        let mut d_sbus_d_va = &diag_v * (&diag_i_bus - y_bus * &diag_v).conj() * Complex64::i();
        let d_sbus_d_vm =
            &diag_v * (y_bus * &diag_v_norm).conj() + diag_i_bus.conj() * &diag_v_norm;

        d_sbus_d_va.sort_indexes();

        (d_sbus_d_va, d_sbus_d_vm)
    }
}

/// Closed-form derivatives of the branch flows and of the bus injections
/// with respect to voltage and to the three controlled branch quantities
/// (tap module, tap angle, equivalent susceptance).
///
/// All matrices span the full bus/branch index spaces; the Jacobian
/// assembly selects the controlled rows and columns out of them. The
/// `dpf_*` matrices carry the "from" active flow rows with the droop
/// convention applied: for droop branches the residual is
/// `-Pf + Pset + kdp*(Vmf - Vset)`, so those rows are negated and the
/// droop gain lands on the Vm column of the "from" bus.
pub struct BranchDerivatives {
    pub dsf_dva: CSR<usize, Complex64>,
    pub dsf_dvm: CSR<usize, Complex64>,
    pub dst_dva: CSR<usize, Complex64>,
    pub dst_dvm: CSR<usize, Complex64>,

    pub dpf_dva: CSR<usize, Complex64>,
    pub dpf_dvm: CSR<usize, Complex64>,

    pub dsbus_dm: CSR<usize, Complex64>,
    pub dsbus_dtau: CSR<usize, Complex64>,
    pub dsbus_dbeq: CSR<usize, Complex64>,

    pub dsf_dm: CSR<usize, Complex64>,
    pub dsf_dtau: CSR<usize, Complex64>,
    pub dsf_dbeq: CSR<usize, Complex64>,

    pub dst_dm: CSR<usize, Complex64>,
    pub dst_dtau: CSR<usize, Complex64>,
    pub dst_dbeq: CSR<usize, Complex64>,

    pub dpf_dm: CSR<usize, Complex64>,
    pub dpf_dtau: CSR<usize, Complex64>,
    pub dpf_dbeq: CSR<usize, Complex64>,
}

#[allow(clippy::too_many_arguments)]
pub fn branch_derivatives(
    circuit: &Circuit,
    adm: &Admittances,
    v: &[Complex64],
    tap: &[f64],
    is_droop: &[bool],
) -> BranchDerivatives {
    let nb = circuit.nb();
    let nl = circuit.nl();

    let mut dsf_dva = Coo::with_size(nl, nb);
    let mut dsf_dvm = Coo::with_size(nl, nb);
    let mut dst_dva = Coo::with_size(nl, nb);
    let mut dst_dvm = Coo::with_size(nl, nb);
    let mut dpf_dva = Coo::with_size(nl, nb);
    let mut dpf_dvm = Coo::with_size(nl, nb);

    let mut dsbus_dm = Coo::with_size(nb, nl);
    let mut dsbus_dtau = Coo::with_size(nb, nl);
    let mut dsbus_dbeq = Coo::with_size(nb, nl);

    let mut dsf_dm = Coo::with_size(nl, nl);
    let mut dsf_dtau = Coo::with_size(nl, nl);
    let mut dsf_dbeq = Coo::with_size(nl, nl);
    let mut dst_dm = Coo::with_size(nl, nl);
    let mut dst_dtau = Coo::with_size(nl, nl);
    let dst_dbeq = Coo::with_size(nl, nl); // St does not depend on Beq

    let mut dpf_dm = Coo::with_size(nl, nl);
    let mut dpf_dtau = Coo::with_size(nl, nl);
    let mut dpf_dbeq = Coo::with_size(nl, nl);

    for (k, br) in circuit.branch.iter().enumerate() {
        if !br.is_on() {
            continue;
        }
        let (f, t) = (br.f_bus, br.t_bus);
        let (vf, vt) = (v[f], v[t]);
        let (ef, et) = (vf / vf.norm(), vt / vt.norm());
        let (vmf, vmt) = (vf.norm(), vt.norm());

        let (yff, yft) = (adm.yff[k], adm.yft[k]);
        let (ytf, ytt) = (adm.ytf[k], adm.ytt[k]);

        // flow sensitivities to the voltage state
        let sf_va_f = J * vf * (yft * vt).conj();
        let sf_vm_f = ef * (yft * vt).conj() + cmplx!(2.0 * vmf) * yff.conj();
        let sf_vm_t = vf * (yft * et).conj();

        let st_va_t = J * vt * (ytf * vf).conj();
        let st_vm_t = et * (ytf * vf).conj() + cmplx!(2.0 * vmt) * ytt.conj();
        let st_vm_f = vt * (ytf * ef).conj();

        dsf_dva.push(k, f, sf_va_f);
        dsf_dva.push(k, t, -sf_va_f);
        dsf_dvm.push(k, f, sf_vm_f);
        dsf_dvm.push(k, t, sf_vm_t);

        dst_dva.push(k, f, -st_va_t);
        dst_dva.push(k, t, st_va_t);
        dst_dvm.push(k, f, st_vm_f);
        dst_dvm.push(k, t, st_vm_t);

        // "from" active flow rows with the droop sign convention
        let dp = if is_droop[k] { -1.0 } else { 1.0 };
        dpf_dva.push(k, f, dp * sf_va_f);
        dpf_dva.push(k, t, dp * -sf_va_f);
        dpf_dvm.push(
            k,
            f,
            dp * sf_vm_f + if is_droop[k] { cmplx!(br.kdp) } else { cmplx!() },
        );
        dpf_dvm.push(k, t, dp * sf_vm_t);

        // tap module: Yff ~ 1/m^2, Yft and Ytf ~ 1/m, Ytt constant
        let m = tap[k];
        let dyff_dm = -2.0 * yff / m;
        let dyft_dm = -yft / m;
        let dytf_dm = -ytf / m;

        let val_f_m = vf * (dyff_dm * vf + dyft_dm * vt).conj();
        let val_t_m = vt * (dytf_dm * vf).conj();

        dsbus_dm.push(f, k, val_f_m);
        dsbus_dm.push(t, k, val_t_m);
        dsf_dm.push(k, k, val_f_m);
        dst_dm.push(k, k, val_t_m);
        dpf_dm.push(k, k, dp * val_f_m);

        // tap angle: Yft ~ e^{j tau}, Ytf ~ e^{-j tau}
        let dyft_dtau = J * yft;
        let dytf_dtau = -J * ytf;

        let val_f_tau = vf * (dyft_dtau * vt).conj();
        let val_t_tau = vt * (dytf_dtau * vf).conj();

        dsbus_dtau.push(f, k, val_f_tau);
        dsbus_dtau.push(t, k, val_t_tau);
        dsf_dtau.push(k, k, val_f_tau);
        dst_dtau.push(k, k, val_t_tau);
        dpf_dtau.push(k, k, dp * val_f_tau);

        // equivalent susceptance: only Yff depends on it
        let mp = br.k * m;
        let dyff_dbeq = J / cmplx!(mp * mp * br.vtap_f * br.vtap_f);
        let val_f_beq = vf * (dyff_dbeq * vf).conj();

        dsbus_dbeq.push(f, k, val_f_beq);
        dsf_dbeq.push(k, k, val_f_beq);
        dpf_dbeq.push(k, k, dp * val_f_beq);
    }

    BranchDerivatives {
        dsf_dva: dsf_dva.to_csr(),
        dsf_dvm: dsf_dvm.to_csr(),
        dst_dva: dst_dva.to_csr(),
        dst_dvm: dst_dvm.to_csr(),
        dpf_dva: dpf_dva.to_csr(),
        dpf_dvm: dpf_dvm.to_csr(),
        dsbus_dm: dsbus_dm.to_csr(),
        dsbus_dtau: dsbus_dtau.to_csr(),
        dsbus_dbeq: dsbus_dbeq.to_csr(),
        dsf_dm: dsf_dm.to_csr(),
        dsf_dtau: dsf_dtau.to_csr(),
        dsf_dbeq: dsf_dbeq.to_csr(),
        dst_dm: dst_dm.to_csr(),
        dst_dtau: dst_dtau.to_csr(),
        dst_dbeq: dst_dbeq.to_csr(),
        dpf_dm: dpf_dm.to_csr(),
        dpf_dtau: dpf_dtau.to_csr(),
        dpf_dbeq: dpf_dbeq.to_csr(),
    }
}

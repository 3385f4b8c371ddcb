use crate::circuit::Circuit;
use crate::cmplx;
use num_complex::Complex64;
use sparsetools::csr::CSR;

/// Per-bus aggregation of every injection device, in per unit with the
/// generation-minus-load sign convention. The three ZIP vectors hold the
/// constant power, constant current and constant impedance portions of the
/// scheduled injection.
#[derive(Debug, Clone)]
pub struct ScheduledPowers {
    /// Constant power portion (p.u.).
    pub s0: Vec<Complex64>,

    /// Constant current portion at V = 1.0 p.u.
    pub i0: Vec<Complex64>,

    /// Constant impedance portion at V = 1.0 p.u.
    pub y0: Vec<Complex64>,

    /// Aggregated reactive limits of the in-service generators (p.u.).
    pub qmin: Vec<f64>,
    pub qmax: Vec<f64>,

    /// Generator voltage setpoint per bus (p.u.); the bus voltage guess
    /// where no generator regulates the bus.
    pub vset: Vec<f64>,

    /// Scheduled generator reactive output per bus (p.u.).
    pub qg0: Vec<f64>,

    /// Installed controllable power per bus (p.u.), for distributed slack.
    pub installed_p: Vec<f64>,

    /// Buses with at least one in-service controllable generator.
    pub has_gen: Vec<bool>,
}

impl ScheduledPowers {
    pub fn new(circuit: &Circuit) -> Self {
        let nb = circuit.nb();
        let base_mva = cmplx!(circuit.base_mva);

        let mut s0 = vec![Complex64::default(); nb];
        let mut i0 = vec![Complex64::default(); nb];
        let mut y0 = vec![Complex64::default(); nb];
        let mut qmin = vec![0.0; nb];
        let mut qmax = vec![0.0; nb];
        let mut qg0 = vec![0.0; nb];
        let mut installed_p = vec![0.0; nb];
        let mut has_gen = vec![false; nb];
        let mut vset: Vec<f64> = circuit.bus.iter().map(|b| b.vm).collect();

        for b in &circuit.bus {
            s0[b.bus_i] -= cmplx!(b.pd, b.qd) / base_mva;
            i0[b.bus_i] -= cmplx!(b.pd_i, b.qd_i) / base_mva;
            y0[b.bus_i] -= cmplx!(b.pd_z, b.qd_z) / base_mva;
        }

        for g in circuit.gen.iter().filter(|g| g.is_on()) {
            s0[g.gen_bus] += cmplx!(g.pg, g.qg) / base_mva;
            qmin[g.gen_bus] += g.qmin / circuit.base_mva;
            qmax[g.gen_bus] += g.qmax / circuit.base_mva;
            qg0[g.gen_bus] += g.qg / circuit.base_mva;
            if g.controllable {
                installed_p[g.gen_bus] += g.pmax / circuit.base_mva;
                has_gen[g.gen_bus] = true;
                vset[g.gen_bus] = g.vg;
            }
        }

        Self {
            s0,
            i0,
            y0,
            qmin,
            qmax,
            qg0,
            vset,
            installed_p,
            has_gen,
        }
    }
}

/// Evaluates the scheduled ZIP injection for the given voltage magnitudes:
/// `Sbus = S0 + I0*Vm + Y0*Vm^2`.
pub fn compute_zip_power(
    s0: &[Complex64],
    i0: &[Complex64],
    y0: &[Complex64],
    vm: &[f64],
) -> Vec<Complex64> {
    s0.iter()
        .zip(i0)
        .zip(y0)
        .zip(vm)
        .map(|(((&s, &i), &y), &vm)| s + i * vm + y * (vm * vm))
        .collect()
}

/// Derivative of the scheduled ZIP injection w.r.t. voltage magnitude,
/// as a diagonal matrix: `dSbus/dVm = I0 + 2*Vm*Y0`.
pub fn d_zip_d_vm(i0: &[Complex64], y0: &[Complex64], vm: &[f64]) -> CSR<usize, Complex64> {
    let diag = i0
        .iter()
        .zip(y0)
        .zip(vm)
        .map(|((&i, &y), &vm)| i + y * (2.0 * vm))
        .collect();
    CSR::with_diagonal(diag)
}

/// Calculated complex bus injection: `Scalc = V . conj(Ybus*V)`.
pub fn compute_power(y_bus: &CSR<usize, Complex64>, v: &[Complex64]) -> Vec<Complex64> {
    let i_bus = y_bus * v;
    v.iter().zip(&i_bus).map(|(&v, i)| v * i.conj()).collect()
}

/// Complex flow entering each branch from its "from" bus:
/// `Sf = Vf . conj(Yf*V)`.
pub fn compute_branch_flows(
    y_side: &CSR<usize, Complex64>,
    v: &[Complex64],
    side_bus: &[usize],
) -> Vec<Complex64> {
    let i_side = y_side * v;
    side_bus
        .iter()
        .zip(&i_side)
        .map(|(&b, i)| v[b] * i.conj())
        .collect()
}

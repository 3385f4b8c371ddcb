use num_complex::Complex64;
use std::fmt;

use crate::circuit::Circuit;
use crate::cmplx;
use crate::formulation::Formulation;
use crate::newton::NewtonSummary;
use crate::report::SolveReport;
use crate::topology::Island;

/// Full-size solution arrays plus per-island diagnostics.
///
/// Slots of buses and branches belonging to islands that failed or were
/// skipped keep their initial values: flat voltage, zero flows and the
/// input tap state.
#[derive(Debug, Clone)]
pub struct PowerFlowResults {
    /// True when every island converged (and at least one was solved).
    pub converged: bool,

    /// Convergence flag, iteration count and final mismatch per island.
    pub island_converged: Vec<bool>,
    pub island_iterations: Vec<usize>,
    pub island_errors: Vec<f64>,

    /// Complex bus voltage (p.u.).
    pub voltage: Vec<Complex64>,

    /// Calculated bus injection (p.u.).
    pub s_bus: Vec<Complex64>,

    /// Branch flows at each end (p.u.).
    pub s_f: Vec<Complex64>,
    pub s_t: Vec<Complex64>,

    /// Branch currents entering each end (p.u.).
    pub i_f: Vec<Complex64>,
    pub i_t: Vec<Complex64>,

    /// "From" side apparent flow over the branch rating.
    pub loading: Vec<f64>,

    /// Final controlled branch state.
    pub tap: Vec<f64>,
    pub tap_angle: Vec<f64>,
    pub beq: Vec<f64>,

    /// Largest final mismatch over the solved islands.
    pub error: f64,

    /// Wall clock time of the whole solve (seconds).
    pub elapsed: f64,

    /// Control actions, warnings and island failures.
    pub report: SolveReport,
}

impl PowerFlowResults {
    pub fn new(circuit: &Circuit) -> Self {
        let nb = circuit.nb();
        let nl = circuit.nl();
        Self {
            converged: false,
            island_converged: Vec::new(),
            island_iterations: Vec::new(),
            island_errors: Vec::new(),
            voltage: vec![cmplx!(1.0); nb],
            s_bus: vec![Complex64::default(); nb],
            s_f: vec![Complex64::default(); nl],
            s_t: vec![Complex64::default(); nl],
            i_f: vec![Complex64::default(); nl],
            i_t: vec![Complex64::default(); nl],
            loading: vec![0.0; nl],
            tap: circuit.branch.iter().map(|br| br.tap).collect(),
            tap_angle: circuit.branch.iter().map(|br| br.tap_angle).collect(),
            beq: circuit.branch.iter().map(|br| br.beq).collect(),
            error: 0.0,
            elapsed: 0.0,
            report: SolveReport::new(),
        }
    }

    /// Scatters one solved island back into the full-size arrays using
    /// its original index lists.
    pub(crate) fn apply_island(
        &mut self,
        island: &Island,
        fm: &Formulation,
        summary: &NewtonSummary,
    ) {
        let base_mva = island.circuit.base_mva;

        for (local, &bus) in island.bus_idx.iter().enumerate() {
            self.voltage[bus] = fm.v[local];
            self.s_bus[bus] = fm.scalc[local];
        }
        for (local, &k) in island.branch_idx.iter().enumerate() {
            let br = &island.circuit.branch[local];
            self.s_f[k] = fm.sf[local];
            self.s_t[k] = fm.st[local];
            // S = V . conj(I) at either end
            self.i_f[k] = (fm.sf[local] / fm.v[br.f_bus]).conj();
            self.i_t[k] = (fm.st[local] / fm.v[br.t_bus]).conj();
            self.tap[k] = fm.tap[local];
            self.tap_angle[k] = fm.tap_angle[local];
            self.beq[k] = fm.beq[local];

            let rate = br.rate_a / base_mva;
            if rate > 0.0 {
                self.loading[k] = fm.sf[local].norm() / rate;
            }
        }

        self.island_converged.push(summary.converged);
        self.island_iterations.push(summary.iterations);
        self.island_errors.push(summary.error);
        self.error = self.error.max(summary.error);
    }

    /// Marks one island as failed, leaving its slots untouched.
    pub(crate) fn apply_failure(&mut self) {
        self.island_converged.push(false);
        self.island_iterations.push(0);
        self.island_errors.push(f64::INFINITY);
    }

    pub fn iterations(&self) -> usize {
        self.island_iterations.iter().copied().max().unwrap_or(0)
    }
}

impl fmt::Display for PowerFlowResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "converged: {} ({} island(s), {} it, error {:.3e}, {:.3} s)",
            self.converged,
            self.island_converged.len(),
            self.iterations(),
            self.error,
            self.elapsed
        )?;
        writeln!(f, "{:>5} {:>9} {:>9}", "bus", "vm (pu)", "va (deg)")?;
        for (i, v) in self.voltage.iter().enumerate() {
            writeln!(f, "{:>5} {:>9.4} {:>9.3}", i, v.norm(), v.arg().to_degrees())?;
        }
        writeln!(
            f,
            "{:>5} {:>9} {:>9} {:>9}",
            "brch", "pf (pu)", "qf (pu)", "loading"
        )?;
        for (k, s) in self.s_f.iter().enumerate() {
            writeln!(
                f,
                "{:>5} {:>9.4} {:>9.4} {:>9.3}",
                k, s.re, s.im, self.loading[k]
            )?;
        }
        if !self.report.is_empty() {
            write!(f, "{}", self.report)?;
        }
        Ok(())
    }
}

use anyhow::Result;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;

use crate::admittance::{make_admittances, Admittances};
use crate::circuit::{BusType, Circuit, ControlMode};
use crate::errors::PowerFlowError;
use crate::fmt::format_polar_vec;
use crate::indices::SimulationIndices;
use crate::jacobian::build_jacobian;
use crate::math::norm_inf;
use crate::options::PowerFlowOptions;
use crate::power::{compute_branch_flows, compute_power, compute_zip_power, ScheduledPowers};
use crate::report::SolveReport;

const FD_STEP: f64 = 1e-7;

/// Residual/Jacobian state machine for one island.
///
/// Owns the iterate (Va, Vm, m, tau, Beq as full-length arrays), the bus
/// type and control mode arrays that the adjustment pass mutates, and the
/// index partition compiled from them. The unknown vector x is the
/// concatenation of the free entries in the fixed order Va, Vm, m, tau,
/// Beq; the residual keeps the fixed row order P, Q, Pf, Qf, Pt, Qt.
pub struct Formulation<'a> {
    circuit: &'a Circuit,
    options: &'a PowerFlowOptions,

    pub powers: ScheduledPowers,
    pub bus_types: Vec<BusType>,
    pub control_modes: Vec<ControlMode>,
    pub ix: SimulationIndices,

    pub va: Vec<f64>,
    pub vm: Vec<f64>,
    pub tap: Vec<f64>,
    pub tap_angle: Vec<f64>,
    pub beq: Vec<f64>,

    /// Complex voltage of the latest residual evaluation.
    pub v: Vec<Complex64>,
    /// Calculated bus injections of the latest residual evaluation.
    pub scalc: Vec<Complex64>,
    /// Branch flows of the latest residual evaluation.
    pub sf: Vec<Complex64>,
    pub st: Vec<Complex64>,

    adm: Admittances,
    adm_stale: bool,

    pub report: SolveReport,
}

impl<'a> Formulation<'a> {
    pub fn new(
        circuit: &'a Circuit,
        options: &'a PowerFlowOptions,
    ) -> Result<Self, PowerFlowError> {
        circuit.validate()?;

        let nb = circuit.nb();
        let nl = circuit.nl();
        let mut report = SolveReport::new();
        let powers = ScheduledPowers::new(circuit);

        let mut bus_types: Vec<BusType> = circuit.bus.iter().map(|b| b.bus_type).collect();
        for i in 0..nb {
            if circuit.bus[i].is_dc && bus_types[i] == BusType::PQ {
                // DC buses carry no reactive equation; their magnitude is
                // balanced by a converter control row
                bus_types[i] = BusType::P;
            }
            if bus_types[i] == BusType::PV && !powers.has_gen[i] {
                bus_types[i] = BusType::PQ;
                report.add_warning(
                    "PV bus has no in-service controllable generator, converted to PQ",
                    format!("bus {}", i),
                    0.0,
                    0.0,
                );
            }
        }

        let control_modes: Vec<ControlMode> =
            circuit.branch.iter().map(|br| br.control_mode).collect();

        let ix = SimulationIndices::compile(
            circuit,
            options,
            &mut bus_types,
            &control_modes,
            &mut report,
        )?;

        let (mut va, mut vm): (Vec<f64>, Vec<f64>) = if options.initialize_with_existing_solution {
            circuit
                .bus
                .iter()
                .map(|b| (b.va.to_radians(), b.vm))
                .unzip()
        } else {
            (vec![0.0; nb], vec![1.0; nb])
        };

        // hold the generator setpoint at regulated buses
        for i in 0..nb {
            if powers.has_gen[i]
                && matches!(bus_types[i], BusType::PV | BusType::Slack)
            {
                vm[i] = powers.vset[i];
            }
        }
        for &k in ix.k_v_m.iter().chain(&ix.k_vf_beq) {
            let br = &circuit.branch[k];
            let reg = if ix.k_vf_beq.contains(&k) {
                br.f_bus
            } else {
                br.regulated_bus()
            };
            if bus_types[reg] == BusType::PQV {
                vm[reg] = br.vset;
            }
        }
        if options.initialize_with_existing_solution {
            // keep the stored angles only where they are meaningful
            for &i in &ix.vd {
                va[i] = circuit.bus[i].va.to_radians();
            }
        }

        let tap: Vec<f64> = circuit.branch.iter().map(|br| br.tap).collect();
        let tap_angle: Vec<f64> = circuit.branch.iter().map(|br| br.tap_angle).collect();
        let beq: Vec<f64> = circuit.branch.iter().map(|br| br.beq).collect();

        let adm = make_admittances(circuit, options, &tap, &tap_angle, &beq);

        Ok(Self {
            circuit,
            options,
            powers,
            bus_types,
            control_modes,
            ix,
            va,
            vm,
            tap,
            tap_angle,
            beq,
            v: vec![Complex64::default(); nb],
            scalc: vec![Complex64::default(); nb],
            sf: vec![Complex64::default(); nl],
            st: vec![Complex64::default(); nl],
            adm,
            adm_stale: false,
            report,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        self.circuit
    }

    pub fn admittances(&mut self) -> &Admittances {
        if self.adm_stale {
            self.adm = make_admittances(
                self.circuit,
                self.options,
                &self.tap,
                &self.tap_angle,
                &self.beq,
            );
            self.adm_stale = false;
        }
        &self.adm
    }

    /// Evaluates the mismatch vector at the current iterate, refreshing
    /// the cached voltage, injection and flow vectors.
    pub fn residual(&mut self) -> Vec<f64> {
        self.v = self
            .vm
            .iter()
            .zip(&self.va)
            .map(|(&vm, &va)| Complex64::from_polar(vm, va))
            .collect();

        self.admittances();
        self.scalc = compute_power(&self.adm.y_bus, &self.v);

        let f_bus: Vec<usize> = self.circuit.branch.iter().map(|br| br.f_bus).collect();
        let t_bus: Vec<usize> = self.circuit.branch.iter().map(|br| br.t_bus).collect();
        self.sf = compute_branch_flows(&self.adm.y_f, &self.v, &f_bus);
        self.st = compute_branch_flows(&self.adm.y_t, &self.v, &t_bus);

        let s_bus = compute_zip_power(&self.powers.s0, &self.powers.i0, &self.powers.y0, &self.vm);
        let ds: Vec<Complex64> = self
            .scalc
            .iter()
            .zip(&s_bus)
            .map(|(&calc, &sched)| calc - sched)
            .collect();

        let mut f = Vec::with_capacity(self.ix.n_rows());
        f.extend(self.ix.idx_dp.iter().map(|&i| ds[i].re));
        f.extend(self.ix.idx_dq.iter().map(|&i| ds[i].im));
        for &k in &self.ix.idx_dpf {
            let br = &self.circuit.branch[k];
            if self.ix.is_droop[k] {
                let vmf = self.vm[br.f_bus];
                f.push(-self.sf[k].re + br.pset + br.kdp * (vmf - br.vset));
            } else {
                f.push(self.sf[k].re - br.pset);
            }
        }
        for &k in &self.ix.idx_dqf {
            let qset = if self.control_modes[k] == ControlMode::ReactiveFrom {
                self.circuit.branch[k].qset
            } else {
                0.0 // zero reactive flow constraint
            };
            f.push(self.sf[k].im - qset);
        }
        for &k in &self.ix.idx_dpt {
            f.push(self.st[k].re - self.circuit.branch[k].pset);
        }
        for &k in &self.ix.idx_dqt {
            f.push(self.st[k].im - self.circuit.branch[k].qset);
        }

        log::trace!("V: {}", format_polar_vec(&self.v));
        f
    }

    pub fn error(f: &[f64]) -> f64 {
        norm_inf(f)
    }

    pub fn jacobian(&mut self) -> Result<CSC<usize, f64>> {
        if self.options.finite_difference {
            self.jacobian_fd()
        } else {
            self.admittances();
            build_jacobian(
                self.circuit,
                &self.adm,
                &self.powers,
                &self.v,
                &self.tap,
                &self.ix,
            )
        }
    }

    /// One-sided finite difference approximation of the Jacobian,
    /// column by column in the unknown order.
    fn jacobian_fd(&mut self) -> Result<CSC<usize, f64>> {
        let n = self.ix.n_unknowns();
        let f0 = self.residual();
        let mut jac = Coo::with_size(f0.len(), n);

        for col in 0..n {
            self.perturb(col, FD_STEP);
            let f1 = self.residual();
            self.perturb(col, -FD_STEP);

            for (row, (&f1, &f0)) in f1.iter().zip(&f0).enumerate() {
                let d = (f1 - f0) / FD_STEP;
                if d != 0.0 {
                    jac.push(row, col, d);
                }
            }
        }
        // leave the caches consistent with the unperturbed iterate
        let _ = self.residual();

        Ok(jac.to_csc())
    }

    fn perturb(&mut self, col: usize, h: f64) {
        let ix = &self.ix;
        let (n_va, n_vm) = (ix.idx_dva.len(), ix.idx_dvm.len());
        let (n_m, n_tau) = (ix.idx_dm.len(), ix.idx_dtau.len());

        let mut j = col;
        if j < n_va {
            self.va[ix.idx_dva[j]] += h;
            return;
        }
        j -= n_va;
        if j < n_vm {
            self.vm[ix.idx_dvm[j]] += h;
            return;
        }
        j -= n_vm;
        if j < n_m {
            self.tap[ix.idx_dm[j]] += h;
        } else {
            j -= n_m;
            if j < n_tau {
                self.tap_angle[ix.idx_dtau[j]] += h;
            } else {
                self.beq[ix.idx_dbeq[j - n_tau]] += h;
            }
        }
        self.adm_stale = true;
    }

    /// Adds the Newton step to the iterate, slice by slice in the fixed
    /// unknown order.
    pub fn apply_update(&mut self, dx: &[f64]) {
        let mut j = 0;
        for &i in &self.ix.idx_dva {
            self.va[i] += dx[j];
            j += 1;
        }
        for &i in &self.ix.idx_dvm {
            self.vm[i] += dx[j];
            j += 1;
        }
        let tap_state = j < dx.len();
        for &k in &self.ix.idx_dm {
            self.tap[k] += dx[j];
            j += 1;
        }
        for &k in &self.ix.idx_dtau {
            self.tap_angle[k] += dx[j];
            j += 1;
        }
        for &k in &self.ix.idx_dbeq {
            self.beq[k] += dx[j];
            j += 1;
        }
        if tap_state {
            self.adm_stale = true;
        }

        // normalize in case we wrapped around with a negative Vm
        for (vm, va) in self.vm.iter_mut().zip(self.va.iter_mut()) {
            if *vm < 0.0 {
                *vm = -*vm;
                *va += std::f64::consts::PI;
            }
        }
    }

    /// Control adjustment pass. Returns true when anything changed, in
    /// which case the index partition has been recompiled and the residual
    /// must be evaluated again.
    ///
    /// Runs only when the caller has brought the mismatch below the
    /// (looser) controls tolerance, so the quantities examined here are
    /// meaningful.
    pub fn update_controls(&mut self) -> Result<bool, PowerFlowError> {
        let mut retype = false;
        let mut changed = false;

        if self.options.control_q {
            retype |= self.enforce_q_limits();
        }
        if self.options.distributed_slack {
            changed |= self.distribute_slack();
        }
        if self.options.control_taps_modules || self.options.control_taps_phase {
            retype |= self.clamp_taps();
        }

        if retype {
            self.ix = SimulationIndices::compile(
                self.circuit,
                self.options,
                &mut self.bus_types,
                &self.control_modes,
                &mut self.report,
            )?;
        }
        Ok(retype || changed)
    }

    /// Converts PV buses whose generators exceed their aggregated reactive
    /// limits into PQ buses with the injection clamped to the violated
    /// bound. Buses are never promoted back.
    fn enforce_q_limits(&mut self) -> bool {
        let mut changed = false;
        let s_bus = compute_zip_power(&self.powers.s0, &self.powers.i0, &self.powers.y0, &self.vm);

        for i in 0..self.circuit.nb() {
            if self.bus_types[i] != BusType::PV || !self.powers.has_gen[i] {
                continue;
            }
            // reactive output required from the generators at this bus
            let q_gen = self.scalc[i].im - s_bus[i].im + self.powers.qg0[i];

            let bound = if q_gen > self.powers.qmax[i] {
                self.powers.qmax[i]
            } else if q_gen < self.powers.qmin[i] {
                self.powers.qmin[i]
            } else {
                continue;
            };

            self.bus_types[i] = BusType::PQ;
            self.powers.s0[i].im += bound - self.powers.qg0[i];
            self.report.add_warning(
                "reactive limit violated, bus converted to PQ",
                format!("bus {}", i),
                q_gen,
                bound,
            );
            changed = true;
        }
        changed
    }

    /// Spreads the slack bus active mismatch over the buses with
    /// controllable generation, proportionally to installed power.
    fn distribute_slack(&mut self) -> bool {
        let s_bus = compute_zip_power(&self.powers.s0, &self.powers.i0, &self.powers.y0, &self.vm);
        let delta: f64 = self
            .ix
            .vd
            .iter()
            .map(|&i| self.scalc[i].re - s_bus[i].re)
            .sum();
        if delta.abs() <= self.options.controls_tolerance {
            return false;
        }

        let total: f64 = self.powers.installed_p.iter().sum();
        if total <= 0.0 {
            return false;
        }
        for i in 0..self.circuit.nb() {
            if self.powers.installed_p[i] > 0.0 {
                self.powers.s0[i].re += delta * self.powers.installed_p[i] / total;
            }
        }
        self.report.add_info(
            "slack power distributed over controllable generation",
            "slack".to_string(),
            delta,
            0.0,
        );
        true
    }

    /// Clamps free tap modules and angles that left their bounds and fixes
    /// the owning branch, removing the variable from the free set.
    fn clamp_taps(&mut self) -> bool {
        let mut changed = false;

        for &k in &self.ix.idx_dm.clone() {
            let br = &self.circuit.branch[k];
            let clamped = self.tap[k].clamp(br.tap_min, br.tap_max);
            if clamped != self.tap[k] {
                self.report.add_warning(
                    "tap module limit reached, branch control fixed",
                    format!("branch {}", k),
                    self.tap[k],
                    clamped,
                );
                self.tap[k] = clamped;
                // a fixed branch no longer holds its bus voltage
                if self.control_modes[k] == ControlMode::VoltageModule {
                    let reg = br.regulated_bus();
                    if self.bus_types[reg] == BusType::PQV {
                        self.bus_types[reg] = BusType::PQ;
                    }
                }
                self.control_modes[k] = ControlMode::Fixed;
                self.adm_stale = true;
                changed = true;
            }
        }
        for &k in &self.ix.idx_dtau.clone() {
            let br = &self.circuit.branch[k];
            let clamped = self.tap_angle[k].clamp(br.tap_angle_min, br.tap_angle_max);
            if clamped != self.tap_angle[k] {
                self.report.add_warning(
                    "tap angle limit reached, branch control fixed",
                    format!("branch {}", k),
                    self.tap_angle[k],
                    clamped,
                );
                self.tap_angle[k] = clamped;
                self.control_modes[k] = ControlMode::Fixed;
                self.adm_stale = true;
                changed = true;
            }
        }
        changed
    }
}

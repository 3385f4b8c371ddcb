use crate::circuit::{BusType, Circuit, ControlMode};
use crate::errors::PowerFlowError;
use crate::options::PowerFlowOptions;
use crate::report::SolveReport;

/// Index partition of the unknowns and residual rows for one iterate.
///
/// The branch lists are pairwise disjoint; together with the bus-type
/// partition they define the unknown columns (Va, Vm, m, tau, Beq) and the
/// residual rows (P, Q, Pf, Qf, Pt, Qt). The partition is recomputed, not
/// mutated, whenever the control adjustment pass changes a bus type or a
/// branch control mode.
#[derive(Debug, Clone, Default)]
pub struct SimulationIndices {
    // bus type lists
    pub vd: Vec<usize>,
    pub pv: Vec<usize>,
    pub pq: Vec<usize>,
    pub pqv: Vec<usize>,
    pub p: Vec<usize>,

    // branches whose tap module regulates a bus voltage
    pub k_v_m: Vec<usize>,
    // converters whose Beq regulates their own "from" bus voltage
    pub k_vf_beq: Vec<usize>,
    // branches whose tap module regulates reactive flow
    pub k_qf_m: Vec<usize>,
    pub k_qt_m: Vec<usize>,
    // branches whose tap angle regulates active flow
    pub k_pf_tau: Vec<usize>,
    pub k_pt_tau: Vec<usize>,
    // droop controlled converters (tap angle free)
    pub k_pf_dp: Vec<usize>,
    // converters constrained to zero "from" side reactive flow
    pub k_zero_beq: Vec<usize>,

    // unknown columns
    pub idx_dva: Vec<usize>,
    pub idx_dvm: Vec<usize>,
    pub idx_dm: Vec<usize>,
    pub idx_dtau: Vec<usize>,
    pub idx_dbeq: Vec<usize>,

    // residual rows
    pub idx_dp: Vec<usize>,
    pub idx_dq: Vec<usize>,
    pub idx_dpf: Vec<usize>,
    pub idx_dqf: Vec<usize>,
    pub idx_dpt: Vec<usize>,
    pub idx_dqt: Vec<usize>,

    /// Per-branch droop membership, for the Pf row sign convention.
    pub is_droop: Vec<bool>,
}

impl SimulationIndices {
    /// Classifies every branch control mode and every bus type into index
    /// lists. `bus_types` is updated in place: buses whose voltage is held
    /// by a regulating branch become PQV.
    pub fn compile(
        circuit: &Circuit,
        options: &PowerFlowOptions,
        bus_types: &mut [BusType],
        control_modes: &[ControlMode],
        report: &mut SolveReport,
    ) -> Result<Self, PowerFlowError> {
        let nl = circuit.nl();
        let mut ix = SimulationIndices {
            is_droop: vec![false; nl],
            ..Default::default()
        };

        for (k, br) in circuit.branch.iter().enumerate() {
            if !br.is_on() {
                continue;
            }
            let mut vf_beq = false;

            match control_modes[k] {
                ControlMode::Fixed => {}
                ControlMode::VoltageModule => {
                    if options.control_taps_modules {
                        let reg = br.regulated_bus();
                        if br.is_converter && reg == br.f_bus {
                            // the converter holds its own "from" side
                            // voltage with Beq rather than the module
                            ix.k_vf_beq.push(k);
                            vf_beq = true;
                        } else {
                            ix.k_v_m.push(k);
                        }
                        mark_pqv(bus_types, reg, k, report);
                    }
                }
                ControlMode::VoltageSusceptance => {
                    if !br.is_converter {
                        return Err(PowerFlowError::Configuration(format!(
                            "branch {} is not a converter but has susceptance voltage control",
                            k
                        )));
                    }
                    ix.k_vf_beq.push(k);
                    vf_beq = true;
                    mark_pqv(bus_types, br.f_bus, k, report);
                }
                ControlMode::ReactiveFrom => {
                    if options.control_taps_modules {
                        ix.k_qf_m.push(k);
                    }
                }
                ControlMode::ReactiveTo => {
                    if options.control_taps_modules {
                        ix.k_qt_m.push(k);
                    }
                }
                ControlMode::ActiveFrom => {
                    if options.control_taps_phase {
                        ix.k_pf_tau.push(k);
                    }
                }
                ControlMode::ActiveTo => {
                    if options.control_taps_phase {
                        ix.k_pt_tau.push(k);
                    }
                }
                ControlMode::Droop => {
                    if options.control_taps_phase {
                        ix.k_pf_dp.push(k);
                        ix.is_droop[k] = true;
                    }
                }
            }

            // zero reactive flow constraint of a converter, unless its
            // voltage is already controlled by the susceptance or its
            // reactive flow follows a setpoint (mutual exclusivity)
            if br.is_converter && !vf_beq && control_modes[k] != ControlMode::ReactiveFrom {
                ix.k_zero_beq.push(k);
            }
        }

        // bus type partition
        for (i, t) in bus_types.iter().enumerate() {
            if !circuit.bus[i].is_on() {
                continue;
            }
            match t {
                BusType::Slack => ix.vd.push(i),
                BusType::PV => ix.pv.push(i),
                BusType::PQ => ix.pq.push(i),
                BusType::PQV => ix.pqv.push(i),
                BusType::P => ix.p.push(i),
            }
        }

        if ix.vd.is_empty() {
            return Err(PowerFlowError::Configuration(
                "no slack bus in island".to_string(),
            ));
        }
        if ix.vd.len() > 1 {
            return Err(PowerFlowError::Configuration(format!(
                "multiple slack buses in island: {:?}",
                ix.vd
            )));
        }

        ix.idx_dva = sorted_union(&[ix.pqv.as_slice(), ix.pv.as_slice(), ix.pq.as_slice(), ix.p.as_slice()]);
        ix.idx_dvm = sorted_union(&[ix.pq.as_slice(), ix.p.as_slice()]);
        ix.idx_dm = sorted_union(&[ix.k_v_m.as_slice(), ix.k_qf_m.as_slice(), ix.k_qt_m.as_slice()]);
        ix.idx_dtau = sorted_union(&[ix.k_pf_tau.as_slice(), ix.k_pt_tau.as_slice(), ix.k_pf_dp.as_slice()]);
        ix.idx_dbeq = sorted_union(&[ix.k_zero_beq.as_slice(), ix.k_vf_beq.as_slice()]);

        ix.idx_dp = ix.idx_dva.clone();
        ix.idx_dq = sorted_union(&[ix.pq.as_slice(), ix.pqv.as_slice()]);
        ix.idx_dpf = sorted_union(&[ix.k_pf_tau.as_slice(), ix.k_pf_dp.as_slice()]);
        ix.idx_dqf = sorted_union(&[ix.k_qf_m.as_slice(), ix.k_zero_beq.as_slice()]);
        ix.idx_dpt = ix.k_pt_tau.clone();
        ix.idx_dqt = ix.k_qt_m.clone();

        let n_cols = ix.n_unknowns();
        let n_rows = ix.n_rows();
        if n_cols != n_rows {
            return Err(PowerFlowError::Configuration(format!(
                "unknown/equation mismatch: {} unknowns, {} residual rows",
                n_cols, n_rows
            )));
        }

        Ok(ix)
    }

    pub fn n_unknowns(&self) -> usize {
        self.idx_dva.len()
            + self.idx_dvm.len()
            + self.idx_dm.len()
            + self.idx_dtau.len()
            + self.idx_dbeq.len()
    }

    pub fn n_rows(&self) -> usize {
        self.idx_dp.len()
            + self.idx_dq.len()
            + self.idx_dpf.len()
            + self.idx_dqf.len()
            + self.idx_dpt.len()
            + self.idx_dqt.len()
    }
}

fn mark_pqv(bus_types: &mut [BusType], bus: usize, branch: usize, report: &mut SolveReport) {
    match bus_types[bus] {
        BusType::PQ => bus_types[bus] = BusType::PQV,
        BusType::PQV => {}
        _ => {
            report.add_warning(
                "voltage regulated bus is not a load bus, setpoint ignored",
                format!("branch {} -> bus {}", branch, bus),
                0.0,
                0.0,
            );
        }
    }
}

fn sorted_union(parts: &[&[usize]]) -> Vec<usize> {
    let mut v: Vec<usize> = parts.iter().flat_map(|p| p.iter().copied()).collect();
    v.sort_unstable();
    v.dedup();
    v
}

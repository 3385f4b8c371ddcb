use crate::cmplx;
use crate::errors::PowerFlowError;
use crate::options::{BranchTolerance, PowerFlowOptions};
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::CSR;

/// Electrical bus classification. Exactly one applies at any iterate.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BusType {
    /// Fixed active and reactive power.
    PQ,
    /// Fixed voltage magnitude and active power.
    PV,
    /// Reference voltage angle. Slack active and reactive power.
    Slack,
    /// Fixed active/reactive power and voltage magnitude held by a
    /// regulating branch (both P and Q equations kept).
    PQV,
    /// Fixed active power only (DC side of a converter).
    P,
}

/// Branch control mode. Each tag activates exactly one additional free
/// variable (tap module, tap angle or equivalent susceptance) and/or one
/// additional residual equation.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum ControlMode {
    /// No extra free variable or equation.
    #[default]
    Fixed,
    /// Tap module regulates the voltage of the controlled bus.
    VoltageModule,
    /// Converter equivalent susceptance regulates its "from" bus voltage.
    VoltageSusceptance,
    /// Tap module regulates the reactive flow on the "from" side.
    ReactiveFrom,
    /// Tap module regulates the reactive flow on the "to" side.
    ReactiveTo,
    /// Tap angle regulates the active flow on the "from" side.
    ActiveFrom,
    /// Tap angle regulates the active flow on the "to" side.
    ActiveTo,
    /// Tap angle free, active flow follows a voltage droop on the "from"
    /// side: Pf = Pset + kdp * (Vmf - Vset).
    Droop,
}

/// Bus is a node in the power system graph structure.
/// Static ZIP loads and shunts are included in the Bus definition.
#[derive(Debug, Clone)]
pub struct Bus {
    /// Bus number (internal consecutive ordering).
    pub bus_i: usize,

    pub bus_type: BusType,

    /// Constant power demand (MW/MVAr).
    pub pd: f64,
    pub qd: f64,

    /// Constant current demand at V = 1.0 p.u. (MW/MVAr).
    pub pd_i: f64,
    pub qd_i: f64,

    /// Constant impedance demand at V = 1.0 p.u. (MW/MVAr).
    pub pd_z: f64,
    pub qd_z: f64,

    /// Shunt conductance (MW at V = 1.0 p.u.).
    pub gs: f64,

    /// Shunt susceptance (MVAr at V = 1.0 p.u.).
    pub bs: f64,

    /// Voltage magnitude (p.u.) initial guess / stored solution.
    pub vm: f64,

    /// Voltage angle (degrees) initial guess / stored solution.
    pub va: f64,

    /// Base voltage (kV).
    pub base_kv: f64,

    /// Voltage magnitude limits (p.u.).
    pub vmax: f64,
    pub vmin: f64,

    /// DC bus flag.
    pub is_dc: bool,

    pub in_service: bool,
}

impl Bus {
    pub fn is_on(&self) -> bool {
        self.in_service
    }

    pub(crate) fn y_sh(&self, base_mva: f64) -> Complex64 {
        Complex64::new(self.gs, self.bs) / Complex64::new(base_mva, 0.0)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            bus_i: 0,
            bus_type: BusType::PQ,
            pd: 0.0,
            qd: 0.0,
            pd_i: 0.0,
            qd_i: 0.0,
            pd_z: 0.0,
            qd_z: 0.0,
            gs: 0.0,
            bs: 0.0,
            vm: 1.0,
            va: 0.0,
            base_kv: 0.0,
            vmax: 1.1,
            vmin: 0.9,
            is_dc: false,
            in_service: true,
        }
    }
}

/// Gen is a controllable injection device (generator, battery or
/// dispatchable load).
#[derive(Debug, Clone)]
pub struct Gen {
    /// Bus number.
    pub gen_bus: usize,

    /// Real power output (MW).
    pub pg: f64,

    /// Reactive power output (MVAr).
    pub qg: f64,

    /// Reactive power limits (MVAr).
    pub qmax: f64,
    pub qmin: f64,

    /// Voltage magnitude setpoint (p.u.).
    pub vg: f64,

    /// Installed real power capacity (MW). Used for distributed slack.
    pub pmax: f64,
    pub pmin: f64,

    pub controllable: bool,

    pub in_service: bool,
}

impl Gen {
    pub fn is_on(&self) -> bool {
        self.in_service
    }
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            gen_bus: 0,
            pg: 0.0,
            qg: 0.0,
            qmax: f64::INFINITY,
            qmin: f64::NEG_INFINITY,
            vg: 1.0,
            pmax: 0.0,
            pmin: 0.0,
            controllable: true,
            in_service: true,
        }
    }
}

/// Branch represents a transmission line/cable, a two winding transformer
/// or an AC/DC converter, all sharing the tap/Beq pi-model.
#[derive(Debug, Clone)]
pub struct Branch {
    /// From bus number.
    pub f_bus: usize,

    /// To bus number.
    pub t_bus: usize,

    /// Resistance (p.u.).
    pub br_r: f64,

    /// Reactance (p.u.).
    pub br_x: f64,

    /// Total shunt conductance (p.u.).
    pub br_g: f64,

    /// Total line charging susceptance (p.u.).
    pub br_b: f64,

    /// MVA rating (long term rating).
    pub rate_a: f64,

    /// Tap module and its limits.
    pub tap: f64,
    pub tap_min: f64,
    pub tap_max: f64,

    /// Tap phase shift angle (radians) and its limits.
    pub tap_angle: f64,
    pub tap_angle_min: f64,
    pub tap_angle_max: f64,

    /// Converter equivalent susceptance (p.u.) and its limits.
    pub beq: f64,
    pub beq_min: f64,
    pub beq_max: f64,

    /// Fixed converter scaling constant applied to the tap module.
    pub k: f64,

    /// Virtual taps due to bus/branch base voltage differences.
    pub vtap_f: f64,
    pub vtap_t: f64,

    /// Converter flag: activates the zero reactive flow constraint and
    /// the Beq voltage control path.
    pub is_converter: bool,

    pub control_mode: ControlMode,

    /// Bus whose voltage magnitude is regulated under voltage control.
    /// Defaults to the "to" bus when absent.
    pub ctrl_bus: Option<usize>,

    /// Controlled voltage setpoint (p.u.).
    pub vset: f64,

    /// Controlled active flow setpoint (p.u.).
    pub pset: f64,

    /// Controlled reactive flow setpoint (p.u.).
    pub qset: f64,

    /// Power/voltage droop gain (p.u./p.u.).
    pub kdp: f64,

    /// Temperature correction: base/operating temperature (deg C) and the
    /// resistance thermal coefficient (1/deg C).
    pub temp_base: f64,
    pub temp_oper: f64,
    pub alpha: f64,

    /// Impedance tolerance (percent).
    pub tolerance: f64,

    pub in_service: bool,
}

impl Branch {
    pub fn is_on(&self) -> bool {
        self.in_service
    }

    /// Series impedance with the temperature correction and the impedance
    /// tolerance applied as configured.
    pub fn impedance(&self, options: &PowerFlowOptions) -> (f64, f64) {
        let mut r = self.br_r;
        let mut x = self.br_x;

        if options.apply_temperature {
            r *= 1.0 + self.alpha * (self.temp_oper - self.temp_base);
        }

        match options.branch_tolerance_mode {
            BranchTolerance::Specified => {}
            BranchTolerance::Lower => {
                r *= 1.0 - self.tolerance / 100.0;
                x *= 1.0 - self.tolerance / 100.0;
            }
            BranchTolerance::Upper => {
                r *= 1.0 + self.tolerance / 100.0;
                x *= 1.0 + self.tolerance / 100.0;
            }
        }

        (r, x)
    }

    /// The bus whose voltage this branch regulates under voltage control.
    pub fn regulated_bus(&self) -> usize {
        self.ctrl_bus.unwrap_or(self.t_bus)
    }
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            f_bus: 0,
            t_bus: 0,
            br_r: 0.0,
            br_x: 0.0,
            br_g: 0.0,
            br_b: 0.0,
            rate_a: 0.0,
            tap: 1.0,
            tap_min: 0.5,
            tap_max: 1.5,
            tap_angle: 0.0,
            tap_angle_min: -std::f64::consts::FRAC_PI_2,
            tap_angle_max: std::f64::consts::FRAC_PI_2,
            beq: 0.0,
            beq_min: f64::NEG_INFINITY,
            beq_max: f64::INFINITY,
            k: 1.0,
            vtap_f: 1.0,
            vtap_t: 1.0,
            is_converter: false,
            control_mode: ControlMode::Fixed,
            ctrl_bus: None,
            vset: 1.0,
            pset: 0.0,
            qset: 0.0,
            kdp: 0.0,
            temp_base: 20.0,
            temp_oper: 20.0,
            alpha: 0.00330,
            tolerance: 0.0,
            in_service: true,
        }
    }
}

/// Circuit is a compiled numeric network: fixed-size arrays describing one
/// immutable circuit per solve request.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub name: String,

    /// System MVA base used for converting power into per-unit quantities.
    pub base_mva: f64,

    /// Power system nodes, including static loads and shunts.
    pub bus: Vec<Bus>,

    /// Controllable injection devices.
    pub gen: Vec<Gen>,

    /// Transmission lines/cables, transformers and converters.
    pub branch: Vec<Branch>,
}

impl Circuit {
    pub fn nb(&self) -> usize {
        self.bus.len()
    }

    pub fn nl(&self) -> usize {
        self.branch.len()
    }

    pub fn ng(&self) -> usize {
        self.gen.len()
    }

    /// Checks array consistency. Violations are configuration errors.
    pub fn validate(&self) -> Result<(), PowerFlowError> {
        let nb = self.nb();

        if self.base_mva <= 0.0 {
            return Err(PowerFlowError::Configuration(format!(
                "base power must be positive: {}",
                self.base_mva
            )));
        }
        for (i, b) in self.bus.iter().enumerate() {
            if b.bus_i != i {
                return Err(PowerFlowError::Configuration(format!(
                    "bus {} has number {}; internal consecutive ordering is required",
                    i, b.bus_i
                )));
            }
        }
        for (k, br) in self.branch.iter().enumerate() {
            if br.f_bus >= nb || br.t_bus >= nb {
                return Err(PowerFlowError::Configuration(format!(
                    "branch {} endpoints ({}, {}) out of range for {} buses",
                    k, br.f_bus, br.t_bus, nb
                )));
            }
            if br.f_bus == br.t_bus {
                return Err(PowerFlowError::Configuration(format!(
                    "branch {} connects bus {} to itself",
                    k, br.f_bus
                )));
            }
            if let Some(cb) = br.ctrl_bus {
                if cb >= nb {
                    return Err(PowerFlowError::Configuration(format!(
                        "branch {} regulates bus {} which does not exist",
                        k, cb
                    )));
                }
            }
        }
        for (i, g) in self.gen.iter().enumerate() {
            if g.gen_bus >= nb {
                return Err(PowerFlowError::Configuration(format!(
                    "generator {} at bus {} out of range for {} buses",
                    i, g.gen_bus, nb
                )));
            }
        }
        Ok(())
    }

    /// Branch-bus incidence matrices for the "from" and "to" sides.
    /// One entry per in-service branch row in each.
    pub fn incidence(&self) -> (CSR<usize, Complex64>, CSR<usize, Complex64>) {
        let mut cf = Coo::with_size(self.nl(), self.nb());
        let mut ct = Coo::with_size(self.nl(), self.nb());
        for (k, br) in self.branch.iter().enumerate() {
            if br.is_on() {
                cf.push(k, br.f_bus, cmplx!(1.0));
                ct.push(k, br.t_bus, cmplx!(1.0));
            }
        }
        (cf.to_csr(), ct.to_csr())
    }

    /// Buses of the slack type that have an in-service generator attached.
    pub fn slack_buses(&self) -> Vec<usize> {
        self.bus
            .iter()
            .filter(|b| b.bus_type == BusType::Slack && b.is_on())
            .map(|b| b.bus_i)
            .collect()
    }
}

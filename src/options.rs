use derive_builder::Builder;

/// Branch impedance tolerance interpretation.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum BranchTolerance {
    /// Use the specified R and X values.
    #[default]
    Specified,
    /// Lower bound: R and X reduced by the branch tolerance percentage.
    Lower,
    /// Upper bound: R and X increased by the branch tolerance percentage.
    Upper,
}

/// Power flow solver options.
#[derive(Debug, Clone, Builder)]
pub struct PowerFlowOptions {
    /// Termination tolerance on the per unit mismatch infinity norm.
    #[builder(default = "1e-8")]
    pub tolerance: f64,

    /// Maximum number of Newton iterations per island.
    #[builder(default = "15")]
    pub max_iterations: usize,

    /// Enforce generator reactive power limits at the expense of |V|.
    #[builder(default = "true")]
    pub control_q: bool,

    /// Distribute the slack power deviation among the buses with
    /// controllable generation, proportionally to installed power.
    #[builder(default = "false")]
    pub distributed_slack: bool,

    /// Allow tap modules to move when a branch regulates voltage or
    /// reactive flow. Disabled branches behave as fixed.
    #[builder(default = "true")]
    pub control_taps_modules: bool,

    /// Allow tap angles to move when a branch regulates active flow.
    #[builder(default = "true")]
    pub control_taps_phase: bool,

    /// Correct branch resistances for operating temperature.
    #[builder(default = "false")]
    pub apply_temperature: bool,

    /// How to apply the per-branch impedance tolerance percentage.
    #[builder(default)]
    pub branch_tolerance_mode: BranchTolerance,

    /// Looser tolerance below which the control adjustment pass is
    /// allowed to act on the iterate.
    #[builder(default = "1e-2")]
    pub controls_tolerance: f64,

    /// Build the Jacobian by one-sided finite differencing of the residual
    /// instead of the analytic kernels. Slow; for verification only.
    #[builder(default = "false")]
    pub finite_difference: bool,

    /// Do not report single-bus islands without a slack device.
    #[builder(default = "true")]
    pub ignore_single_node_islands: bool,

    /// Start from the voltages stored in the circuit instead of a flat start.
    #[builder(default = "false")]
    pub initialize_with_existing_solution: bool,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        PowerFlowOptionsBuilder::default().build().unwrap()
    }
}

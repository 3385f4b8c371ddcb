use crate::errors::PowerFlowError;
use crate::formulation::Formulation;
use crate::math::norm_inf;
use crate::options::PowerFlowOptions;
use crate::traits::LinearSolver;

/// Outcome of one Newton-Raphson run. Non-convergence is a normal
/// outcome, reported through the `converged` flag rather than an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonSummary {
    pub converged: bool,
    pub iterations: usize,
    pub error: f64,
}

/// Solves the controlled power flow with the full Newton method.
///
/// Each iteration solves `J * dx = -f` with the supplied direct solver
/// and adds the step to the iterate. Once the mismatch falls below the
/// (looser) controls tolerance, the control adjustment pass runs; any
/// action it takes invalidates the partition, so the residual is
/// evaluated again before convergence is declared.
///
/// A singular factorization or a non-finite iterate is a numerical
/// failure. Exhausting the iteration budget is not.
pub(crate) fn newton_solve(
    fm: &mut Formulation,
    options: &PowerFlowOptions,
    solver: &dyn LinearSolver,
) -> Result<NewtonSummary, PowerFlowError> {
    let tol = options.tolerance;
    let max_it = options.max_iterations;

    let mut f = fm.residual();
    let mut norm_f = norm_inf(&f);
    if !norm_f.is_finite() {
        return Err(PowerFlowError::Numerical(
            "non-finite mismatch at the initial point".to_string(),
        ));
    }
    log::debug!("it 0, error {}", norm_f);

    let mut converged = norm_f < tol;
    let mut i = 0;

    while !converged && i < max_it {
        i += 1;

        let jac = fm
            .jacobian()
            .map_err(|err| PowerFlowError::Numerical(err.to_string()))?;

        let neg_f: Vec<f64> = f.iter().map(|&f_i| -f_i).collect();
        let dx = solver
            .solve(jac, &neg_f)
            .map_err(PowerFlowError::Numerical)?;

        fm.apply_update(&dx);

        f = fm.residual();
        norm_f = norm_inf(&f);
        if !norm_f.is_finite() {
            return Err(PowerFlowError::Numerical(format!(
                "non-finite mismatch at iteration {}",
                i
            )));
        }
        log::debug!("it {}, error {}", i, norm_f);

        if norm_f < options.controls_tolerance && fm.update_controls()? {
            f = fm.residual();
            norm_f = norm_inf(&f);
        }

        converged = norm_f < tol;
    }

    if converged {
        log::debug!("Newton power flow converged in {} iterations.", i);
    } else {
        log::debug!("Newton power flow did not converge in {} iterations.", i);
    }

    Ok(NewtonSummary {
        converged,
        iterations: i,
        error: norm_f,
    })
}

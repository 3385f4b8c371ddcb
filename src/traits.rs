use sparsetools::csc::CSC;
use spsolve::Solver;

/// Direct solver seam for the Newton update step.
pub trait LinearSolver {
    fn solve(&self, a_mat: CSC<usize, f64>, b: &[f64]) -> Result<Vec<f64>, String>;
}

impl<S> LinearSolver for S
where
    S: Solver<usize, f64>,
{
    fn solve(&self, a_mat: CSC<usize, f64>, b: &[f64]) -> Result<Vec<f64>, String> {
        let mut x = b.to_vec();
        Solver::solve(
            self,
            a_mat.rows(),
            a_mat.rowidx(),
            a_mat.colptr(),
            a_mat.values(),
            &mut x,
            false,
        )
        .map_err(|err| err.to_string())?;
        Ok(x)
    }
}

use std::time::Instant;

use crate::circuit::Circuit;
use crate::errors::PowerFlowError;
use crate::formulation::Formulation;
use crate::newton::newton_solve;
use crate::options::PowerFlowOptions;
use crate::results::PowerFlowResults;
use crate::topology::split_into_islands;
use crate::traits::LinearSolver;

/// Runs the controlled AC/DC power flow over the whole circuit.
///
/// The circuit is split into islands and each island is solved on its own
/// private slice. An island that fails is recorded in the report and does
/// not stop the others: a configuration error (no slack, unbalanced
/// controls) skips the island, a numerical failure (singular Jacobian,
/// diverged iterate) abandons it. A solved island that merely did not
/// converge within the iteration budget is still merged, with its
/// convergence flag left false.
pub fn run_power_flow(
    circuit: &Circuit,
    options: &PowerFlowOptions,
    solver: &dyn LinearSolver,
) -> Result<PowerFlowResults, PowerFlowError> {
    let start = Instant::now();

    circuit.validate()?;

    let mut results = PowerFlowResults::new(circuit);
    let islands = split_into_islands(
        circuit,
        options.ignore_single_node_islands,
        &mut results.report,
    );
    log::debug!("{} island(s) to solve", islands.len());

    if islands.is_empty() {
        results.report.add_warning(
            "no solvable islands in the circuit",
            "circuit".to_string(),
            0.0,
            0.0,
        );
        results.elapsed = start.elapsed().as_secs_f64();
        return Ok(results);
    }

    for (n, island) in islands.iter().enumerate() {
        results.report.add_info(
            "solving island",
            format!("island {} ({} buses)", n, island.bus_idx.len()),
            island.bus_idx.len() as f64,
            0.0,
        );

        let mut fm = match Formulation::new(&island.circuit, options) {
            Ok(fm) => fm,
            Err(err) => {
                log::warn!("island {} skipped: {}", n, err);
                results.report.add_error(
                    &err.to_string(),
                    format!("island {}", n),
                    0.0,
                    0.0,
                );
                results.apply_failure();
                continue;
            }
        };

        match newton_solve(&mut fm, options, solver) {
            Ok(summary) => {
                results.apply_island(island, &fm, &summary);
            }
            Err(err) => {
                log::warn!("island {} failed: {}", n, err);
                results.report.add_error(
                    &err.to_string(),
                    format!("island {}", n),
                    0.0,
                    0.0,
                );
                results.apply_failure();
            }
        }
        results.report.extend(fm.report);
    }

    results.converged = results.island_converged.iter().all(|&c| c);
    results.elapsed = start.elapsed().as_secs_f64();

    Ok(results)
}

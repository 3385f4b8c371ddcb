use anyhow::Result;
use clap::Parser;
use gridpf::{load_case, run_power_flow, PowerFlowOptionsBuilder};
use spsolve::rlu::RLU;
use std::path::PathBuf;

/// AC/DC power flow with controllable taps and converters.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The input case file or directory
    #[arg(required = true)]
    input: PathBuf,

    /// Termination tolerance on per unit mismatch.
    #[arg(long)]
    tol: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long)]
    max_it: Option<usize>,

    /// Do not enforce generator reactive power limits.
    #[arg(long, default_value_t = false)]
    no_qlim: bool,

    /// Distribute the slack power over the controllable generation.
    #[arg(long, default_value_t = false)]
    dist_slack: bool,

    /// Approximate the Jacobian by finite differences.
    #[arg(long, default_value_t = false)]
    fd: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let circuit = load_case(&cli.input)?;

    let mut builder = PowerFlowOptionsBuilder::default();
    if let Some(tol) = cli.tol {
        builder.tolerance(tol);
    }
    if let Some(max_it) = cli.max_it {
        builder.max_iterations(max_it);
    }
    builder.control_q(!cli.no_qlim);
    builder.distributed_slack(cli.dist_slack);
    builder.finite_difference(cli.fd);
    let options = builder.build()?;

    let solver = RLU::default();
    let results = run_power_flow(&circuit, &options, &solver)?;

    print!("{}", results);

    if !results.converged {
        return Err(anyhow::anyhow!("power flow did not converge"));
    }
    Ok(())
}

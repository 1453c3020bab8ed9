//! predator_prey — run the model from a configuration file.
//!
//! ```text
//! predator_prey <config.yml>
//! ```
//!
//! Exits with 128 + signal number when stopped by SIGINT, SIGTERM, or
//! SIGUSR1, and with 1 on any other error.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use abm_sim::{ModelBase, PseudoParent, Sim, SimError};
use predator_prey::PredatorPrey;

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(path), None) = (args.next(), args.next()) else {
        bail!("usage: predator_prey <config.yml>");
    };

    let mut parent =
        PseudoParent::from_path(&path).with_context(|| format!("setting up from {path}"))?;
    let outcome = (|| -> Result<()> {
        let base = ModelBase::new(PredatorPrey::NAME, &parent)?;
        let model = PredatorPrey::new(base).context("building the model")?;
        let mut sim = Sim::new(model, parent.stop_flag().clone());
        sim.run()?;
        Ok(())
    })();

    // Persist whatever was written, also after a stop request.
    parent.close().context("closing the output")?;
    outcome?;
    println!("output written to {}", parent.output_path().display());
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err.downcast_ref::<SimError>().map_or(1, SimError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

//! `generator`: samples random 3-colorings of the given graph and publishes
//! candidates to a running supervisor.
//!
//! ```bash
//! generator 0-1 1-2 2-0
//! generator --seed 7 0-1 0-2 0-3 1-2 1-3 2-3
//! ```

use std::process::ExitCode;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tricolor::cli::{self, GeneratorArgs};
use tricolor::config::{self, Config};
use tricolor::{Error, Generator, signals};
use tricolor_graph::Graph;

fn main() -> ExitCode {
    config::init_tracing();
    let span = tracing::info_span!("generator", pid = std::process::id());
    let _enter = span.enter();

    let args: GeneratorArgs = match cli::parse_or_exit() {
        Ok(args) => args,
        Err(code) => return code,
    };

    match run(&Config::from_env(), args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config, args: GeneratorArgs) -> Result<(), Error> {
    let graph = Graph::new(args.edges)?;
    let names = config.names()?;
    signals::install().map_err(Error::Signal)?;

    let rng = match args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let Some(mut generator) = Generator::attach(&names, graph, rng)? else {
        return Ok(());
    };

    let report = generator.run(signals::requested);
    let detached = generator.detach();
    let report = report?;
    tracing::info!(
        attempts = report.attempts,
        published = report.published,
        "stopped"
    );
    detached
}

//! `supervisor`: creates the shared ring, reads solutions from generators
//! and announces when the graph is 3-colorable.
//!
//! ```bash
//! TRICOLOR_NAMESPACE=demo supervisor
//! ```

use std::io;
use std::process::ExitCode;

use tricolor::cli::{self, SupervisorArgs};
use tricolor::config::{self, Config};
use tricolor::{Error, Outcome, Supervisor, signals};

fn main() -> ExitCode {
    config::init_tracing();
    let span = tracing::info_span!("supervisor");
    let _enter = span.enter();

    let _args: SupervisorArgs = match cli::parse_or_exit() {
        Ok(args) => args,
        Err(code) => return code,
    };

    match run(&Config::from_env()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Error> {
    let names = config.names()?;
    signals::install().map_err(Error::Signal)?;

    let mut supervisor = Supervisor::create(&names)?;
    supervisor.route_signals();

    let outcome = supervisor.run(&mut io::stdout().lock(), signals::requested);
    let shutdown = supervisor.shutdown();

    match outcome? {
        Outcome::Colorable => tracing::info!("coloring found"),
        Outcome::Interrupted => tracing::info!("interrupted"),
    }
    shutdown.map(drop)
}

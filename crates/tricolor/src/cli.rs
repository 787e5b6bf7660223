//! Command-line arguments of the two binaries.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tricolor_graph::Edge;

/// Collects candidate colorings from generators and keeps the best one.
///
/// Takes no arguments at all; even `--help` is a usage error.
#[derive(Parser, Debug)]
#[command(name = "supervisor", disable_help_flag = true, disable_version_flag = true)]
pub struct SupervisorArgs {}

/// Samples random 3-colorings of a graph and publishes those with few conflicts.
#[derive(Parser, Debug)]
#[command(name = "generator", version)]
pub struct GeneratorArgs {
    /// Seed for the coloring RNG; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Graph edges as `a-b` pairs of non-negative node ids, e.g. `0-1 1-2 2-0`.
    #[arg(value_name = "EDGE", required = true, num_args = 1..)]
    pub edges: Vec<Edge>,
}

/// Exit status for a parse failure: 0 for `--help` / `--version`, 1 for
/// usage errors.
pub fn exit_status(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

/// A usage error as printed to stderr, prefixed with the program name.
pub fn usage_message<T: CommandFactory>(err: &clap::Error) -> String {
    format!("{}: {}", T::command().get_name(), err.render())
}

/// Parse the process arguments. On failure clap's message is printed and
/// the exit code to return from `main` is handed back.
pub fn parse_or_exit<T: Parser>() -> Result<T, ExitCode> {
    T::try_parse().map_err(|err| {
        if err.use_stderr() {
            eprint!("{}", usage_message::<T>(&err));
        } else {
            let _ = err.print();
        }
        ExitCode::from(exit_status(&err))
    })
}

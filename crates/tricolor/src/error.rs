use std::fmt;
use std::io;

use tricolor_graph::GraphError;
use tricolor_shm::ShmError;

/// Fatal errors of the supervisor and generator processes.
#[derive(Debug)]
pub enum Error {
    /// A shared segment or semaphore operation failed.
    Shm(ShmError),
    /// The edge list does not describe a usable graph.
    Graph(GraphError),
    /// Installing the termination signal handlers failed.
    Signal(io::Error),
    /// Writing results to stdout failed.
    Output(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Shm(e) => write!(f, "{e}"),
            Error::Graph(e) => write!(f, "{e}"),
            Error::Signal(e) => write!(f, "installing signal handlers: {e}"),
            Error::Output(e) => write!(f, "writing output: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Shm(e) => Some(e),
            Error::Graph(e) => Some(e),
            Error::Signal(e) | Error::Output(e) => Some(e),
        }
    }
}

impl From<ShmError> for Error {
    fn from(e: ShmError) -> Self {
        Error::Shm(e)
    }
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Graph(e)
    }
}

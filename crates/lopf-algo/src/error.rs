//! Error type for model building, solving and result extraction.

use lopf_core::{NetworkError, TopologyError};
use thiserror::Error;

/// Errors raised by the LOPF pipeline.
#[derive(Debug, Error)]
pub enum LopfError {
    /// Formulation string outside {angles, ptdf, cycles, kirchhoff}.
    #[error("unknown formulation {0:?}; expected angles, ptdf, cycles or kirchhoff")]
    UnknownFormulation(String),

    /// The solver reported an infeasible, unbounded or otherwise
    /// failed problem; results are not extracted.
    #[error("optimisation failed with solver status {status}")]
    Infeasible { status: String },

    /// The solver could not be set up or run.
    #[error("solver error: {0}")]
    Solver(String),

    /// Full non-linear AC optimal power flow is not implemented.
    #[error("non-linear optimal power flow not supported yet")]
    NonLinearUnsupported,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// I/O failure while dumping the model (keep-files path).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Crate-wide error taxonomy.
//!
//! [`hours`](crate::hours) and [`evaluator`](crate::evaluator) never fail on
//! domain outcomes — a closed or over-budget POI becomes a scored penalty,
//! not an error. The variants here are reserved for contract violations
//! (mismatched dimensions, out-of-range indices) and orchestration-level
//! outcomes (no candidates survived filtering, neither constructor produced
//! a route, the caller cancelled).

use thiserror::Error;

use crate::orchestrator::OrchestratorResult;
use crate::poi::Weekday;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("distance matrix dimension {actual} does not match candidate count {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("route references POI index {0} which is out of range")]
    InvalidIndex(usize),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no available POIs for {day} at minute {start_time}")]
    NoAvailablePois { day: Weekday, start_time: u32 },

    #[error("neither ACO nor GA produced a feasible route")]
    NoFeasibleRoute,

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("distance oracle exhausted all providers, including the infallible fallback")]
    OracleUnavailable,

    #[error("optimization cancelled")]
    Cancelled {
        best_so_far: Option<Box<OrchestratorResult>>,
    },
}

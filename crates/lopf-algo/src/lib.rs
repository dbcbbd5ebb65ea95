//! # lopf-algo: Linear Optimal Power Flow Model Builder
//!
//! Builds, solves and unpacks the linear program behind a network
//! dispatch and expansion optimisation: generator dispatch, storage
//! and store operation, controllable links, passive branch flow
//! physics, nodal balance and CO2 caps, minimising marginal plus
//! capital costs.
//!
//! ## Pipeline
//!
//! ```text
//! Network + snapshots
//!   -> declarators populate a Model (named variables/constraints)
//!   -> objective attached
//!   -> lowered to conic form and solved (Clarabel)
//!   -> primal/dual solution written back into Network time series
//! ```
//!
//! ## Flow formulations
//!
//! | Formulation | Auxiliary state | Balance granularity |
//! |-------------|-----------------|---------------------|
//! | [`Formulation::Angles`] | voltage angles per bus | per bus |
//! | [`Formulation::Ptdf`] | none | per sub-network |
//! | [`Formulation::Cycles`] | cycle flow variables | per sub-network |
//! | [`Formulation::Kirchhoff`] | none | per bus |
//!
//! All four are equivalent at the optimum; they trade model size
//! against sparsity. Voltage angles are recovered post-hoc for the
//! non-angle formulations.
//!
//! ## Example
//!
//! ```ignore
//! use lopf_algo::{run_lopf, Formulation, LopfOptions};
//!
//! let options = LopfOptions::default().with_formulation(Formulation::Kirchhoff);
//! run_lopf(&mut network, None, &options, None)?;
//! println!("objective: {}", network.objective);
//! ```

pub mod algebra;
pub mod build;
pub mod error;
mod extract;
pub mod lopf;
pub mod solver;

pub use algebra::{ConId, LinExpr, Model, Sense, VarId};
pub use build::LopfModel;
pub use error::LopfError;
pub use lopf::{network_opf, run_lopf, Formulation, LopfOptions};
pub use solver::{SolveStatus, SolverOptions};

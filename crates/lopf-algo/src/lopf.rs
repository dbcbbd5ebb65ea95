//! The LOPF pipeline: validate, build, lower, solve, extract.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use lopf_core::{topology, Network, TopologyError};
use serde::Serialize;
use tracing::{info, warn};

use crate::build::{self, LopfModel};
use crate::error::LopfError;
use crate::extract;
use crate::solver::{self, SolveStatus, SolverOptions};

/// Formulation of the linear power flow equations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Formulation {
    /// Nodal voltage angles with per-bus balance.
    #[default]
    Angles,
    /// Branch flows from PTDF-weighted injections; balance per
    /// sub-network.
    Ptdf,
    /// Cycle decomposition with auxiliary cycle variables; balance
    /// per sub-network.
    Cycles,
    /// Kirchhoff voltage law on free branch flows with per-bus
    /// balance.
    Kirchhoff,
}

impl std::fmt::Display for Formulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formulation::Angles => write!(f, "angles"),
            Formulation::Ptdf => write!(f, "ptdf"),
            Formulation::Cycles => write!(f, "cycles"),
            Formulation::Kirchhoff => write!(f, "kirchhoff"),
        }
    }
}

impl std::str::FromStr for Formulation {
    type Err = LopfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "angles" => Ok(Formulation::Angles),
            "ptdf" => Ok(Formulation::Ptdf),
            "cycles" => Ok(Formulation::Cycles),
            "kirchhoff" => Ok(Formulation::Kirchhoff),
            other => Err(LopfError::UnknownFormulation(other.to_string())),
        }
    }
}

/// Options for one LOPF run.
#[derive(Debug, Clone, Default)]
pub struct LopfOptions {
    pub formulation: Formulation,
    /// PTDF entries below this magnitude are dropped.
    pub ptdf_tolerance: f64,
    pub solver: SolverOptions,
    /// Skip validation and topology determination; requires a
    /// previously determined topology.
    pub skip_pre: bool,
    /// Dump the lowered model as LP text to this path.
    pub keep_files: Option<PathBuf>,
    /// Release the symbolic expressions after lowering, ahead of the
    /// solver call.
    pub free_memory: bool,
}

impl LopfOptions {
    pub fn with_formulation(mut self, formulation: Formulation) -> Self {
        self.formulation = formulation;
        self
    }

    pub fn with_ptdf_tolerance(mut self, tolerance: f64) -> Self {
        self.ptdf_tolerance = tolerance;
        self
    }

    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_skip_pre(mut self, skip_pre: bool) -> Self {
        self.skip_pre = skip_pre;
        self
    }

    pub fn with_keep_files(mut self, path: PathBuf) -> Self {
        self.keep_files = Some(path);
        self
    }

    pub fn with_free_memory(mut self, free_memory: bool) -> Self {
        self.free_memory = free_memory;
        self
    }
}

/// Hook invoked after the base model (including objective) is built
/// and before lowering, for arbitrary constraint or objective
/// amendments.
pub type ExtraFunctionality<'a> = &'a mut dyn FnMut(&Network, &mut LopfModel);

/// Linear optimal power flow over a window of snapshots.
///
/// Builds the LP for `snapshots` (default: the full snapshot axis),
/// solves it and writes primal results, marginal prices, recovered
/// voltage angles and optimal capacities back into `network`.
///
/// A sub-optimal solver outcome is extracted anyway, with a warning;
/// every other non-optimal outcome aborts with
/// [`LopfError::Infeasible`] and leaves results untouched.
pub fn run_lopf(
    network: &mut Network,
    snapshots: Option<&[usize]>,
    options: &LopfOptions,
    extra_functionality: Option<ExtraFunctionality<'_>>,
) -> Result<(), LopfError> {
    if !options.skip_pre {
        network.validate()?;
        topology::determine_network_topology(network)?;
    } else if network.sub_networks.is_empty() && !network.passive_branches.is_empty() {
        return Err(TopologyError::MissingTopology.into());
    }

    let snapshots: Vec<usize> = match snapshots {
        Some(s) => s.to_vec(),
        None => (0..network.n_snapshots()).collect(),
    };
    if snapshots.is_empty() {
        return Ok(());
    }

    let mut model = build::build_model(
        network,
        snapshots,
        options.formulation,
        options.ptdf_tolerance,
    )?;

    if let Some(hook) = extra_functionality {
        hook(network, &mut model);
    }

    info!(
        formulation = %options.formulation,
        n_vars = model.model.n_vars(),
        n_cons = model.model.n_cons(),
        "solving linear optimal power flow"
    );

    let compiled = solver::compile(&model.model);

    if let Some(path) = &options.keep_files {
        let mut writer = BufWriter::new(File::create(path)?);
        model.model.write_lp(&mut writer)?;
    }
    if options.free_memory {
        model.model.release_expressions();
    }

    let solution = compiled.solve(&options.solver)?;
    if solution.status == SolveStatus::SubOptimal {
        warn!(
            termination = %solution.termination,
            "optimisation might be sub-optimal; extracting results anyway"
        );
    }

    extract::extract(network, &model, &solution, options.formulation)?;
    Ok(())
}

/// Full non-linear AC optimal power flow. Not implemented; fails
/// loudly so callers cannot mistake the linear results for AC ones.
pub fn network_opf(_network: &mut Network) -> Result<(), LopfError> {
    Err(LopfError::NonLinearUnsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_formulation_round_trip() {
        for name in ["angles", "ptdf", "cycles", "kirchhoff"] {
            let f = Formulation::from_str(name).unwrap();
            assert_eq!(f.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_formulation_rejected() {
        let err = Formulation::from_str("socp").unwrap_err();
        assert!(matches!(err, LopfError::UnknownFormulation(_)));
    }

    #[test]
    fn test_ac_opf_fails_loudly() {
        let mut network = Network::new(vec![1.0]);
        assert!(matches!(
            network_opf(&mut network),
            Err(LopfError::NonLinearUnsupported)
        ));
    }
}

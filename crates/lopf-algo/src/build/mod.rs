//! Variable and constraint declarators, one submodule per subsystem.
//!
//! Declaration order matters: every variable referenced by a
//! constraint must exist first, and the flow formulations consume the
//! nodal balance expressions assembled before them. The canonical
//! order run by [`build_model`] is: generators, storage units,
//! stores, capacity extensions, link flows, nodal balance assembly,
//! passive branch flows, flow magnitude limits, balance binding
//! (per bus or per sub-network), CO2 cap, objective.

use lopf_core::Network;
use tracing::debug;

use crate::algebra::{ConId, LinExpr, Model, VarId};
use crate::error::LopfError;
use crate::lopf::Formulation;

mod balance;
mod co2;
mod flows;
mod generators;
mod links;
mod objective;
mod storage;
mod stores;

/// The model under construction plus dense handle tables.
///
/// Per-snapshot tables are entity-major and keyed identically to the
/// network time series: entry `(e, i)` lives at
/// `e * snapshots.len() + i`, where `i` is the position within the
/// solve window (`snapshots[i]` is the global snapshot index).
pub struct LopfModel {
    pub model: Model,
    /// Global snapshot indices of the solve window, in order.
    pub snapshots: Vec<usize>,

    pub gen_p: Vec<VarId>,
    pub gen_p_nom: Vec<Option<VarId>>,
    pub storage_p_dispatch: Vec<VarId>,
    pub storage_p_store: Vec<VarId>,
    pub storage_p_spill: Vec<Option<VarId>>,
    pub storage_p_nom: Vec<Option<VarId>>,
    pub state_of_charge: Vec<VarId>,
    pub store_p: Vec<VarId>,
    pub store_e: Vec<VarId>,
    pub store_e_nom: Vec<Option<VarId>>,
    pub branch_s_nom: Vec<Option<VarId>>,
    pub link_p: Vec<VarId>,
    pub link_p_nom: Vec<Option<VarId>>,
    pub passive_branch_p: Vec<VarId>,
    /// Per (bus, position); only the angles formulation fills this.
    pub voltage_angles: Vec<VarId>,
    /// Per sub-network: cycle flow variables at `cycle * n + i`;
    /// only the cycles formulation fills this.
    pub cycle_flows: Vec<Vec<VarId>>,

    /// Nodal balance expressions per (bus, position), assembled from
    /// every non-branch element and drained when the balance
    /// constraints are bound.
    pub p_balance: Vec<LinExpr>,

    /// Balance constraint handles for dual extraction: per (bus,
    /// position) for angles/kirchhoff, per (sub-network, position)
    /// for ptdf/cycles.
    pub power_balance: Vec<Option<ConId>>,
    pub sub_network_balance: Vec<Option<ConId>>,
}

impl LopfModel {
    fn new(network: &Network, snapshots: Vec<usize>) -> Self {
        let n = snapshots.len();
        Self {
            model: Model::new(),
            snapshots,
            gen_p: Vec::new(),
            gen_p_nom: vec![None; network.generators.len()],
            storage_p_dispatch: Vec::new(),
            storage_p_store: Vec::new(),
            storage_p_spill: Vec::new(),
            storage_p_nom: vec![None; network.storage_units.len()],
            state_of_charge: Vec::new(),
            store_p: Vec::new(),
            store_e: Vec::new(),
            store_e_nom: vec![None; network.stores.len()],
            branch_s_nom: vec![None; network.passive_branches.len()],
            link_p: Vec::new(),
            link_p_nom: vec![None; network.links.len()],
            passive_branch_p: Vec::new(),
            voltage_angles: Vec::new(),
            cycle_flows: Vec::new(),
            p_balance: vec![LinExpr::new(); network.buses.len() * n],
            power_balance: vec![None; network.buses.len() * n],
            sub_network_balance: Vec::new(),
        }
    }

    /// Number of positions in the solve window.
    pub fn n_positions(&self) -> usize {
        self.snapshots.len()
    }

    /// Flat index of `(entity, position)` in the per-snapshot tables.
    #[inline]
    pub fn index(&self, entity: usize, position: usize) -> usize {
        entity * self.snapshots.len() + position
    }
}

/// Run every declarator in the canonical order and attach the
/// objective. The returned model is ready for the extra-functionality
/// hook and lowering.
pub fn build_model(
    network: &Network,
    snapshots: Vec<usize>,
    formulation: Formulation,
    ptdf_tolerance: f64,
) -> Result<LopfModel, LopfError> {
    let mut m = LopfModel::new(network, snapshots);

    generators::declare(network, &mut m);
    storage::declare(network, &mut m);
    stores::declare(network, &mut m);
    links::declare_extension_capacities(network, &mut m);
    links::declare_flows(network, &mut m);

    balance::assemble_nodal_balance(network, &mut m);

    flows::declare_flows(network, &mut m, formulation, ptdf_tolerance)?;
    flows::declare_flow_limits(network, &mut m);

    match formulation {
        Formulation::Angles | Formulation::Kirchhoff => {
            balance::bind_nodal_balance(network, &mut m);
        }
        Formulation::Ptdf | Formulation::Cycles => {
            balance::bind_sub_network_balance(network, &mut m);
        }
    }

    if network.co2_limit.is_some() {
        co2::declare_limit(network, &mut m);
    }

    objective::attach(network, &mut m);

    debug!(
        n_vars = m.model.n_vars(),
        n_cons = m.model.n_cons(),
        "model build complete"
    );
    Ok(m)
}

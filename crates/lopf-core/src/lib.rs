//! # lopf-core: Network Data Model for Linear Optimal Power Flow
//!
//! Provides the typed element tables, per-snapshot time series and
//! topology primitives consumed by the LOPF model builder in
//! `lopf-algo`.
//!
//! ## Design Philosophy
//!
//! A [`Network`] is a collection of flat element tables (buses,
//! generators, storage units, stores, loads, passive branches, links)
//! plus entity-major time-series matrices ([`Series`]) for everything
//! that varies per snapshot. Elements reference each other through
//! newtype index IDs ([`BusId`], [`GenId`], ...), which keeps lookups
//! O(1) and makes it impossible to confuse a generator index with a
//! bus index.
//!
//! Passive branches (lines and transformers) carry flow determined by
//! network physics; [`Link`]s are controllable branches whose flow is
//! a decision variable. The [`topology`] module partitions the
//! passive-branch graph into [`topology::SubNetwork`]s and assembles
//! the cycle basis, spanning tree, susceptance and PTDF matrices the
//! flow formulations need.
//!
//! ## Quick Start
//!
//! ```rust
//! use lopf_core::*;
//!
//! // One snapshot of one hour
//! let mut network = Network::new(vec![1.0]);
//!
//! let a = network.add_bus(Bus::new("A", "AC"));
//! let b = network.add_bus(Bus::new("B", "AC"));
//!
//! network.add_generator(Generator {
//!     name: "gen A".to_string(),
//!     bus: a,
//!     p_nom: 200.0,
//!     marginal_cost: 10.0,
//!     ..Generator::default()
//! });
//!
//! let load = network.add_load(Load::new("load B", b));
//! network.loads_t.p_set.set(load.value(), 0, 100.0);
//!
//! network.add_passive_branch(PassiveBranch {
//!     kind: BranchKind::Line,
//!     name: "A-B".to_string(),
//!     bus0: a,
//!     bus1: b,
//!     x_pu: 0.1,
//!     s_nom: 150.0,
//!     ..PassiveBranch::default()
//! });
//!
//! network.validate().unwrap();
//! ```
//!
//! ## Conventions
//!
//! - `sign` is the direction convention for nodal balance terms:
//!   `+1` for injections (generators, storage, stores), `-1` for
//!   withdrawals (loads).
//! - Per-unit bounds (`p_min_pu`, `p_max_pu`, ...) multiply the
//!   nominal capacity of their element.
//! - Storage `p_min_pu_fixed` is non-positive; `-p_min_pu_fixed`
//!   bounds the charging side.
//! - The nullable `state_of_charge_set` series uses NaN for "free";
//!   use [`StorageUnitsT::soc_set`] rather than reading it raw.

use serde::{Deserialize, Serialize};

pub mod error;
pub mod linalg;
pub mod series;
pub mod topology;

pub use error::{NetworkError, TopologyError};
pub use series::Series;
pub use topology::SubNetwork;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubNetworkId(usize);

macro_rules! id_impl {
    ($($id:ident),*) => {
        $(impl $id {
            #[inline]
            pub fn new(value: usize) -> Self {
                $id(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        })*
    };
}

id_impl!(BusId, GenId, StorageId, StoreId, LoadId, BranchId, LinkId, SubNetworkId);

/// An electrical node. Power balance is enforced here at every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    /// Operating mode of the attached passive grid: "AC" or "DC".
    pub carrier: String,
}

impl Bus {
    pub fn new(name: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            carrier: carrier.into(),
        }
    }
}

/// An energy carrier (coal, gas, wind, ...) with its emission factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    /// Emitted mass per unit of primary energy.
    pub co2_emissions: f64,
}

impl Carrier {
    pub fn new(name: impl Into<String>, co2_emissions: f64) -> Self {
        Self {
            name: name.into(),
            co2_emissions,
        }
    }
}

/// How a generator's per-unit dispatch band is specified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispatch {
    /// Per-snapshot band from the `p_min_pu`/`p_max_pu` time series.
    Variable,
    /// Constant band from `p_min_pu_fixed`/`p_max_pu_fixed`.
    #[default]
    Flexible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub name: String,
    pub bus: BusId,
    pub dispatch: Dispatch,
    /// Installed capacity (MW).
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_min_pu_fixed: f64,
    pub p_max_pu_fixed: f64,
    /// Dispatch cost per MWh.
    pub marginal_cost: f64,
    /// Annualized cost per MW of nominal capacity.
    pub capital_cost: f64,
    /// Primary-to-electric conversion efficiency (for emissions).
    pub efficiency: f64,
    pub carrier: String,
    pub sign: f64,
    /// Optimal capacity, written by result extraction.
    pub p_nom_opt: f64,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: BusId(0),
            dispatch: Dispatch::Flexible,
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_min_pu_fixed: 0.0,
            p_max_pu_fixed: 1.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            efficiency: 1.0,
            carrier: String::new(),
            sign: 1.0,
            p_nom_opt: 0.0,
        }
    }
}

/// Coupled dispatch/charge device with a state of charge tied to its
/// power rating through `max_hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUnit {
    pub name: String,
    pub bus: BusId,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    /// Non-positive; `-p_min_pu_fixed * p_nom` caps charging.
    pub p_min_pu_fixed: f64,
    pub p_max_pu_fixed: f64,
    /// Energy capacity in hours at full power.
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// Fraction of state of charge lost per hour.
    pub standing_loss: f64,
    pub cyclic_state_of_charge: bool,
    pub state_of_charge_initial: f64,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub sign: f64,
    pub p_nom_opt: f64,
}

impl Default for StorageUnit {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: BusId(0),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_min_pu_fixed: -1.0,
            p_max_pu_fixed: 1.0,
            max_hours: 1.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            standing_loss: 0.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: 0.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            sign: 1.0,
            p_nom_opt: 0.0,
        }
    }
}

/// Pure energy reservoir: dispatch `p` and energy `e` are decoupled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    pub bus: BusId,
    pub e_nom: f64,
    pub e_nom_extendable: bool,
    pub e_nom_min: f64,
    pub e_nom_max: f64,
    pub e_min_pu_fixed: f64,
    pub e_max_pu_fixed: f64,
    pub standing_loss: f64,
    pub e_cyclic: bool,
    pub e_initial: f64,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub sign: f64,
    pub e_nom_opt: f64,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: BusId(0),
            e_nom: 0.0,
            e_nom_extendable: false,
            e_nom_min: 0.0,
            e_nom_max: f64::INFINITY,
            e_min_pu_fixed: 0.0,
            e_max_pu_fixed: 1.0,
            standing_loss: 0.0,
            e_cyclic: false,
            e_initial: 0.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            sign: 1.0,
            e_nom_opt: 0.0,
        }
    }
}

/// Fixed demand; the `p_set` time series is a constant in the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub name: String,
    pub bus: BusId,
    pub sign: f64,
}

impl Load {
    pub fn new(name: impl Into<String>, bus: BusId) -> Self {
        Self {
            name: name.into(),
            bus,
            sign: -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Line,
    Transformer,
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchKind::Line => write!(f, "line"),
            BranchKind::Transformer => write!(f, "transformer"),
        }
    }
}

/// Line or transformer. Flow follows from physics, not from a
/// decision variable bound; which impedance applies depends on the
/// carrier of the owning sub-network (AC: `x_pu`, DC: `r_pu`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveBranch {
    pub kind: BranchKind,
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    /// Series reactance (per-unit).
    pub x_pu: f64,
    /// Series resistance (per-unit).
    pub r_pu: f64,
    /// Thermal rating (MVA).
    pub s_nom: f64,
    pub s_nom_extendable: bool,
    pub s_nom_min: f64,
    pub s_nom_max: f64,
    pub capital_cost: f64,
    pub s_nom_opt: f64,
    /// Owning sub-network, assigned by topology determination.
    #[serde(skip)]
    pub sub_network: Option<SubNetworkId>,
}

impl Default for PassiveBranch {
    fn default() -> Self {
        Self {
            kind: BranchKind::Line,
            name: String::new(),
            bus0: BusId(0),
            bus1: BusId(0),
            x_pu: 0.0,
            r_pu: 0.0,
            s_nom: 0.0,
            s_nom_extendable: false,
            s_nom_min: 0.0,
            s_nom_max: f64::INFINITY,
            capital_cost: 0.0,
            s_nom_opt: 0.0,
            sub_network: None,
        }
    }
}

/// Controllable branch. Power withdrawn at `bus0` arrives at `bus1`
/// scaled by `efficiency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub efficiency: f64,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub p_nom_opt: f64,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus0: BusId(0),
            bus1: BusId(0),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_min_pu: 0.0,
            p_max_pu: 1.0,
            efficiency: 1.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            p_nom_opt: 0.0,
        }
    }
}

/// Time series attached to generators.
#[derive(Debug, Clone, Default)]
pub struct GeneratorsT {
    pub p_min_pu: Series,
    pub p_max_pu: Series,
    /// Result: dispatched power.
    pub p: Series,
}

impl GeneratorsT {
    fn new(n: usize) -> Self {
        Self {
            p_min_pu: Series::new(n),
            p_max_pu: Series::new(n),
            p: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p_min_pu.push_entity(0.0);
        self.p_max_pu.push_entity(1.0);
        self.p.push_entity(0.0);
    }
}

/// Time series attached to storage units.
#[derive(Debug, Clone, Default)]
pub struct StorageUnitsT {
    /// Exogenous energy arriving per hour (hydro inflow).
    pub inflow: Series,
    /// NaN = free; finite values pin the state of charge.
    pub state_of_charge_set: Series,
    /// Result: net dispatch (dispatch - store).
    pub p: Series,
    /// Result.
    pub state_of_charge: Series,
    /// Result; zero wherever no spill variable existed.
    pub spill: Series,
}

impl StorageUnitsT {
    fn new(n: usize) -> Self {
        Self {
            inflow: Series::new(n),
            state_of_charge_set: Series::new(n),
            p: Series::new(n),
            state_of_charge: Series::new(n),
            spill: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.inflow.push_entity(0.0);
        self.state_of_charge_set.push_entity(f64::NAN);
        self.p.push_entity(0.0);
        self.state_of_charge.push_entity(0.0);
        self.spill.push_entity(0.0);
    }

    /// The pinned state of charge at (unit, snapshot), if any.
    pub fn soc_set(&self, unit: usize, snapshot: usize) -> Option<f64> {
        let v = self.state_of_charge_set.get(unit, snapshot);
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }
}

/// Time series attached to stores.
#[derive(Debug, Clone, Default)]
pub struct StoresT {
    /// Result: dispatched power.
    pub p: Series,
    /// Result: stored energy.
    pub e: Series,
}

impl StoresT {
    fn new(n: usize) -> Self {
        Self {
            p: Series::new(n),
            e: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p.push_entity(0.0);
        self.e.push_entity(0.0);
    }
}

/// Time series attached to loads.
#[derive(Debug, Clone, Default)]
pub struct LoadsT {
    pub p_set: Series,
    /// Result: equals `p_set` over the solved window.
    pub p: Series,
}

impl LoadsT {
    fn new(n: usize) -> Self {
        Self {
            p_set: Series::new(n),
            p: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p_set.push_entity(0.0);
        self.p.push_entity(0.0);
    }
}

/// Result time series attached to buses.
#[derive(Debug, Clone, Default)]
pub struct BusesT {
    /// Net active power injection of the one-port elements and links.
    pub p: Series,
    pub v_ang: Series,
    pub v_mag_pu: Series,
    /// Dual value of the balance constraint covering the bus.
    pub marginal_price: Series,
}

impl BusesT {
    fn new(n: usize) -> Self {
        Self {
            p: Series::new(n),
            v_ang: Series::new(n),
            v_mag_pu: Series::new(n),
            marginal_price: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p.push_entity(0.0);
        self.v_ang.push_entity(0.0);
        self.v_mag_pu.push_entity(1.0);
        self.marginal_price.push_entity(0.0);
    }
}

/// Result time series attached to passive branches.
#[derive(Debug, Clone, Default)]
pub struct BranchesT {
    /// Flow leaving `bus0`.
    pub p0: Series,
    /// Flow leaving `bus1` (`-p0` for lossless passive branches).
    pub p1: Series,
}

impl BranchesT {
    fn new(n: usize) -> Self {
        Self {
            p0: Series::new(n),
            p1: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p0.push_entity(0.0);
        self.p1.push_entity(0.0);
    }
}

/// Result time series attached to links.
#[derive(Debug, Clone, Default)]
pub struct LinksT {
    pub p0: Series,
    /// `-efficiency * p0`.
    pub p1: Series,
}

impl LinksT {
    fn new(n: usize) -> Self {
        Self {
            p0: Series::new(n),
            p1: Series::new(n),
        }
    }

    fn push(&mut self) {
        self.p0.push_entity(0.0);
        self.p1.push_entity(0.0);
    }
}

/// The network: element tables, time series and solve results.
///
/// Element tables are append-only inputs to the model builder; the
/// result series and `*_nom_opt`/`objective` fields are overwritten
/// by each successful solve.
#[derive(Debug, Clone, Default)]
pub struct Network {
    /// Hours represented by each snapshot; strictly positive.
    pub snapshot_weightings: Vec<f64>,

    pub buses: Vec<Bus>,
    pub carriers: Vec<Carrier>,
    pub generators: Vec<Generator>,
    pub storage_units: Vec<StorageUnit>,
    pub stores: Vec<Store>,
    pub loads: Vec<Load>,
    pub passive_branches: Vec<PassiveBranch>,
    pub links: Vec<Link>,

    /// Connected components of the passive-branch graph; populated by
    /// [`topology::determine_network_topology`].
    pub sub_networks: Vec<SubNetwork>,

    /// Optional cap on total CO2 emissions over the solve window.
    pub co2_limit: Option<f64>,

    /// Result: optimal objective value.
    pub objective: f64,

    pub generators_t: GeneratorsT,
    pub storage_units_t: StorageUnitsT,
    pub stores_t: StoresT,
    pub loads_t: LoadsT,
    pub buses_t: BusesT,
    pub branches_t: BranchesT,
    pub links_t: LinksT,
}

impl Network {
    pub fn new(snapshot_weightings: Vec<f64>) -> Self {
        let n = snapshot_weightings.len();
        Self {
            snapshot_weightings,
            buses: Vec::new(),
            carriers: Vec::new(),
            generators: Vec::new(),
            storage_units: Vec::new(),
            stores: Vec::new(),
            loads: Vec::new(),
            passive_branches: Vec::new(),
            links: Vec::new(),
            sub_networks: Vec::new(),
            co2_limit: None,
            objective: 0.0,
            generators_t: GeneratorsT::new(n),
            storage_units_t: StorageUnitsT::new(n),
            stores_t: StoresT::new(n),
            loads_t: LoadsT::new(n),
            buses_t: BusesT::new(n),
            branches_t: BranchesT::new(n),
            links_t: LinksT::new(n),
        }
    }

    pub fn n_snapshots(&self) -> usize {
        self.snapshot_weightings.len()
    }

    pub fn add_carrier(&mut self, carrier: Carrier) {
        self.carriers.push(carrier);
    }

    pub fn carrier(&self, name: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|c| c.name == name)
    }

    pub fn add_bus(&mut self, bus: Bus) -> BusId {
        self.buses.push(bus);
        self.buses_t.push();
        BusId(self.buses.len() - 1)
    }

    pub fn add_generator(&mut self, generator: Generator) -> GenId {
        self.generators.push(generator);
        self.generators_t.push();
        GenId(self.generators.len() - 1)
    }

    pub fn add_storage_unit(&mut self, unit: StorageUnit) -> StorageId {
        self.storage_units.push(unit);
        self.storage_units_t.push();
        StorageId(self.storage_units.len() - 1)
    }

    pub fn add_store(&mut self, store: Store) -> StoreId {
        self.stores.push(store);
        self.stores_t.push();
        StoreId(self.stores.len() - 1)
    }

    pub fn add_load(&mut self, load: Load) -> LoadId {
        self.loads.push(load);
        self.loads_t.push();
        LoadId(self.loads.len() - 1)
    }

    pub fn add_passive_branch(&mut self, branch: PassiveBranch) -> BranchId {
        self.passive_branches.push(branch);
        self.branches_t.push();
        BranchId(self.passive_branches.len() - 1)
    }

    pub fn add_link(&mut self, link: Link) -> LinkId {
        self.links.push(link);
        self.links_t.push();
        LinkId(self.links.len() - 1)
    }

    /// Check referential integrity and snapshot weightings before any
    /// model build. Fails on the first issue found.
    pub fn validate(&self) -> Result<(), NetworkError> {
        for (t, &w) in self.snapshot_weightings.iter().enumerate() {
            if !(w > 0.0) {
                return Err(NetworkError::NonPositiveWeighting {
                    snapshot: t,
                    weighting: w,
                });
            }
        }

        let n_bus = self.buses.len();
        let check = |name: &str, bus: BusId| -> Result<(), NetworkError> {
            if bus.value() >= n_bus {
                Err(NetworkError::UnknownBus {
                    element: name.to_string(),
                    bus: bus.value(),
                })
            } else {
                Ok(())
            }
        };

        for g in &self.generators {
            check(&g.name, g.bus)?;
            if !g.carrier.is_empty() && self.carrier(&g.carrier).is_none() {
                return Err(NetworkError::UnknownCarrier {
                    generator: g.name.clone(),
                    carrier: g.carrier.clone(),
                });
            }
        }
        for s in &self.storage_units {
            check(&s.name, s.bus)?;
        }
        for s in &self.stores {
            check(&s.name, s.bus)?;
        }
        for l in &self.loads {
            check(&l.name, l.bus)?;
        }
        for b in &self.passive_branches {
            check(&b.name, b.bus0)?;
            check(&b.name, b.bus1)?;
        }
        for l in &self.links {
            check(&l.name, l.bus0)?;
            check(&l.name, l.bus1)?;
        }

        Ok(())
    }

    /// Generators attached to `bus`.
    pub fn generators_at_bus(&self, bus: BusId) -> Vec<(GenId, &Generator)> {
        self.generators
            .iter()
            .enumerate()
            .filter(|(_, g)| g.bus == bus)
            .map(|(i, g)| (GenId(i), g))
            .collect()
    }

    /// Loads attached to `bus`.
    pub fn loads_at_bus(&self, bus: BusId) -> Vec<(LoadId, &Load)> {
        self.loads
            .iter()
            .enumerate()
            .filter(|(_, l)| l.bus == bus)
            .map(|(i, l)| (LoadId(i), l))
            .collect()
    }

    /// Total demand at one snapshot.
    pub fn total_load(&self, snapshot: usize) -> f64 {
        (0..self.loads.len())
            .map(|l| self.loads_t.p_set.get(l, snapshot))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new(vec![1.0]);
        let a = network.add_bus(Bus::new("A", "AC"));
        let b = network.add_bus(Bus::new("B", "AC"));
        network.add_generator(Generator {
            name: "gen".into(),
            bus: a,
            p_nom: 100.0,
            ..Generator::default()
        });
        let load = network.add_load(Load::new("load", b));
        network.loads_t.p_set.set(load.value(), 0, 50.0);
        network.add_passive_branch(PassiveBranch {
            name: "A-B".into(),
            bus0: a,
            bus1: b,
            x_pu: 0.1,
            s_nom: 100.0,
            ..PassiveBranch::default()
        });
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus_network();
        assert_eq!(network.buses.len(), 2);
        assert_eq!(network.generators.len(), 1);
        assert_eq!(network.passive_branches.len(), 1);
        assert_eq!(network.generators_t.p_max_pu.n_entities(), 1);
        assert_eq!(network.generators_t.p_max_pu.get(0, 0), 1.0);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn test_total_load() {
        let network = two_bus_network();
        assert!((network.total_load(0) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_elements_at_bus() {
        let network = two_bus_network();
        assert_eq!(network.generators_at_bus(BusId::new(0)).len(), 1);
        assert_eq!(network.generators_at_bus(BusId::new(1)).len(), 0);
        assert_eq!(network.loads_at_bus(BusId::new(1)).len(), 1);
    }

    #[test]
    fn test_validate_dangling_bus() {
        let mut network = Network::new(vec![1.0]);
        network.add_bus(Bus::new("A", "AC"));
        network.add_load(Load::new("bad", BusId::new(5)));
        let err = network.validate().unwrap_err();
        assert!(matches!(err, NetworkError::UnknownBus { bus: 5, .. }));
    }

    #[test]
    fn test_validate_weightings() {
        let mut network = Network::new(vec![1.0, 0.0]);
        network.add_bus(Bus::new("A", "AC"));
        assert!(matches!(
            network.validate(),
            Err(NetworkError::NonPositiveWeighting { snapshot: 1, .. })
        ));
    }

    #[test]
    fn test_validate_unknown_carrier() {
        let mut network = Network::new(vec![1.0]);
        let a = network.add_bus(Bus::new("A", "AC"));
        network.add_generator(Generator {
            name: "gen".into(),
            bus: a,
            carrier: "gas".into(),
            ..Generator::default()
        });
        assert!(matches!(
            network.validate(),
            Err(NetworkError::UnknownCarrier { .. })
        ));

        network.add_carrier(Carrier::new("gas", 0.2));
        assert!(network.validate().is_ok());
    }

    #[test]
    fn test_soc_set_nan_is_free() {
        let mut network = Network::new(vec![1.0, 1.0]);
        let a = network.add_bus(Bus::new("A", "AC"));
        let su = network.add_storage_unit(StorageUnit {
            name: "su".into(),
            bus: a,
            ..StorageUnit::default()
        });
        assert!(network.storage_units_t.soc_set(su.value(), 0).is_none());
        network
            .storage_units_t
            .state_of_charge_set
            .set(su.value(), 1, 3.0);
        assert_eq!(network.storage_units_t.soc_set(su.value(), 1), Some(3.0));
    }

    #[test]
    fn test_bus_id_serde_transparent() {
        let id = BusId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: BusId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

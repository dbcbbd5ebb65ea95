//! Sub-network discovery and topology matrices.
//!
//! Passive branches partition the buses into connected components
//! ("sub-networks"). Each sub-network gets a slack bus, an ordered bus
//! list, and the matrices the flow formulations consume:
//!
//! ```text
//! B     buses x buses          susceptance Laplacian
//!       B[i,j] = -y_ij   (i != j)
//!       B[i,i] = sum_k y_ik
//! T     branches x non-slack   tree routing: T[e,j] = +/-1 iff tree
//!                              branch e lies on the path from bus j
//!                              to the slack
//! C     branches x cycles      fundamental cycle basis from the
//!                              BFS spanning tree
//! PTDF  branches x buses       injection-to-flow sensitivities,
//!                              PTDF[e,j] = y_e (X[f,j] - X[t,j])
//!                              with X = inv(B[1:,1:]) zero-padded
//! ```
//!
//! The branch admittance is `y = 1/x_pu` on AC sub-networks and
//! `1/r_pu` on DC ones. Bus ordering is slack first, then the
//! remaining buses in index order, so `B[1:,1:]` is the reduced
//! matrix used for PTDF and post-hoc angle recovery.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use sprs::{CsMat, TriMat};

use crate::error::TopologyError;
use crate::linalg::DenseLu;
use crate::{BranchId, BusId, Network, PassiveBranch, SubNetworkId};

/// A connected component of the passive-branch graph, with its
/// topology matrices.
#[derive(Debug, Clone)]
pub struct SubNetwork {
    pub id: SubNetworkId,
    /// "AC" or "DC"; decides which impedance attribute applies.
    pub carrier: String,
    pub slack_bus: BusId,
    buses: Vec<BusId>,
    bus_position: HashMap<BusId, usize>,
    branches: Vec<BranchId>,
    /// Cycle basis (branches x cycles).
    pub c: CsMat<f64>,
    /// Tree routing matrix (branches x non-slack buses).
    pub t: CsMat<f64>,
    /// Susceptance Laplacian (buses x buses), slack-first ordering.
    pub b: CsMat<f64>,
    /// Dense PTDF (branches x buses); the slack column is zero.
    pub ptdf: Vec<Vec<f64>>,
}

impl SubNetwork {
    /// Ordered buses, slack first.
    pub fn buses(&self) -> &[BusId] {
        &self.buses
    }

    /// Ordered non-slack buses (the columns of `t` and of the
    /// reduced susceptance matrix).
    pub fn buses_o(&self) -> &[BusId] {
        &self.buses[1..]
    }

    /// Ordered branches (the rows of `c`, `t` and `ptdf`).
    pub fn branches(&self) -> &[BranchId] {
        &self.branches
    }

    /// Position of `bus` in the slack-first ordering.
    pub fn position(&self, bus: BusId) -> Option<usize> {
        self.bus_position.get(&bus).copied()
    }

    pub fn n_cycles(&self) -> usize {
        self.c.cols()
    }

    /// Impedance relevant under this sub-network's carrier.
    pub fn effective_impedance(&self, branch: &PassiveBranch) -> f64 {
        if self.carrier == "DC" {
            branch.r_pu
        } else {
            branch.x_pu
        }
    }

    /// LU factors of `B[1:,1:]`, or `None` for a single-bus
    /// sub-network. Factor once, solve per snapshot.
    pub fn reduced_susceptance_lu(&self) -> Result<Option<DenseLu>, TopologyError> {
        let n = self.buses.len();
        if n < 2 {
            return Ok(None);
        }
        let mut dense = vec![vec![0.0; n - 1]; n - 1];
        for (&val, (i, j)) in self.b.iter() {
            if i > 0 && j > 0 {
                dense[i - 1][j - 1] = val;
            }
        }
        DenseLu::factor(dense)
            .map(Some)
            .map_err(|_| TopologyError::SingularSusceptance {
                sub_network: self.id.value(),
            })
    }
}

/// Partition the network into sub-networks and assemble their
/// topology matrices. Overwrites `network.sub_networks` and the
/// `sub_network` field of every passive branch.
pub fn determine_network_topology(network: &mut Network) -> Result<(), TopologyError> {
    let n_bus = network.buses.len();

    // Bus/branch graph; node indices coincide with bus indices.
    let mut graph: UnGraph<(), usize> = UnGraph::default();
    for _ in 0..n_bus {
        graph.add_node(());
    }
    for (b_idx, branch) in network.passive_branches.iter().enumerate() {
        for bus in [branch.bus0, branch.bus1] {
            if bus.value() >= n_bus {
                return Err(TopologyError::UnknownBus {
                    branch: branch.name.clone(),
                    bus: bus.value(),
                });
            }
        }
        graph.add_edge(
            NodeIndex::new(branch.bus0.value()),
            NodeIndex::new(branch.bus1.value()),
            b_idx,
        );
    }

    let mut component = vec![usize::MAX; n_bus];
    // Parent pointers of the BFS forest: (branch index, parent bus).
    let mut parent: Vec<Option<(usize, usize)>> = vec![None; n_bus];
    let mut depth = vec![0usize; n_bus];
    let mut sub_networks = Vec::new();

    for start in 0..n_bus {
        if component[start] != usize::MAX {
            continue;
        }
        let sub_id = sub_networks.len();
        let carrier = network.buses[start].carrier.clone();

        // BFS labels the component and builds the spanning tree.
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        component[start] = sub_id;
        while let Some(u) = queue.pop_front() {
            for edge in graph.edges(NodeIndex::new(u)) {
                let v = if edge.source().index() == u {
                    edge.target().index()
                } else {
                    edge.source().index()
                };
                if component[v] == usize::MAX {
                    component[v] = sub_id;
                    parent[v] = Some((*edge.weight(), u));
                    depth[v] = depth[u] + 1;
                    members.push(v);
                    queue.push_back(v);
                }
            }
        }

        for &m in &members[1..] {
            if network.buses[m].carrier != carrier {
                return Err(TopologyError::MixedCarrier {
                    sub_network: sub_id,
                    first: carrier,
                    second: network.buses[m].carrier.clone(),
                });
            }
        }

        // Slack first, remaining buses in index order.
        let mut rest: Vec<usize> = members[1..].to_vec();
        rest.sort_unstable();
        let buses: Vec<BusId> = std::iter::once(start)
            .chain(rest)
            .map(BusId::new)
            .collect();
        let bus_position: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        sub_networks.push(SubNetwork {
            id: SubNetworkId::new(sub_id),
            carrier,
            slack_bus: BusId::new(start),
            buses,
            bus_position,
            branches: Vec::new(),
            c: TriMat::new((0, 0)).to_csr(),
            t: TriMat::new((0, 0)).to_csr(),
            b: TriMat::new((0, 0)).to_csr(),
            ptdf: Vec::new(),
        });
    }

    // Assign branches to their component, in branch index order.
    for (b_idx, branch) in network.passive_branches.iter_mut().enumerate() {
        let sub_id = component[branch.bus0.value()];
        branch.sub_network = Some(SubNetworkId::new(sub_id));
        sub_networks[sub_id].branches.push(BranchId::new(b_idx));
    }

    for sub in &mut sub_networks {
        build_matrices(network, sub, &parent, &depth)?;
    }

    network.sub_networks = sub_networks;
    Ok(())
}

/// Assemble B, T, C and PTDF for one sub-network from the BFS forest.
fn build_matrices(
    network: &Network,
    sub: &mut SubNetwork,
    parent: &[Option<(usize, usize)>],
    depth: &[usize],
) -> Result<(), TopologyError> {
    let n_b = sub.buses.len();
    let n_br = sub.branches.len();

    if n_br == 0 {
        sub.b = TriMat::new((n_b, n_b)).to_csr();
        sub.t = TriMat::new((0, n_b.saturating_sub(1))).to_csr();
        sub.c = TriMat::new((0, 0)).to_csr();
        sub.ptdf = Vec::new();
        return Ok(());
    }

    // Branch admittances and local endpoint positions.
    let mut admittance = Vec::with_capacity(n_br);
    let mut endpoints = Vec::with_capacity(n_br);
    for &br in &sub.branches {
        let branch = &network.passive_branches[br.value()];
        let z = sub.effective_impedance(branch);
        if z.abs() < 1e-12 {
            return Err(TopologyError::ZeroImpedance(branch.name.clone()));
        }
        admittance.push(1.0 / z);
        endpoints.push((branch.bus0.value(), branch.bus1.value()));
    }

    // Susceptance Laplacian over the slack-first ordering.
    let mut b_tri = TriMat::new((n_b, n_b));
    for (k, &(f, t)) in endpoints.iter().enumerate() {
        let y = admittance[k];
        let i = sub.bus_position[&BusId::new(f)];
        let j = sub.bus_position[&BusId::new(t)];
        b_tri.add_triplet(i, j, -y);
        b_tri.add_triplet(j, i, -y);
        b_tri.add_triplet(i, i, y);
        b_tri.add_triplet(j, j, y);
    }
    sub.b = b_tri.to_csr();

    let local_branch: HashMap<usize, usize> = sub
        .branches
        .iter()
        .enumerate()
        .map(|(local, br)| (br.value(), local))
        .collect();

    // Tree membership from the BFS parent pointers.
    let mut in_tree = vec![false; n_br];
    for &bus in sub.buses_o() {
        if let Some((edge, _)) = parent[bus.value()] {
            in_tree[local_branch[&edge]] = true;
        }
    }

    // T[e,j] = +/-1 for tree branch e on the path bus j -> slack,
    // positive when the walk traverses e from bus0 to bus1.
    let mut t_tri = TriMat::new((n_br, n_b - 1));
    for (col, &bus) in sub.buses_o().iter().enumerate() {
        let mut u = bus.value();
        while let Some((edge, p)) = parent[u] {
            let local = local_branch[&edge];
            let sign = if endpoints[local].0 == u { 1.0 } else { -1.0 };
            t_tri.add_triplet(local, col, sign);
            u = p;
        }
    }
    sub.t = t_tri.to_csr();

    // One fundamental cycle per non-tree branch: the branch from
    // bus0 to bus1, closed by the tree path from bus1 back to bus0.
    let chords: Vec<usize> = (0..n_br).filter(|&k| !in_tree[k]).collect();
    let mut c_tri = TriMat::new((n_br, chords.len()));
    for (col, &k) in chords.iter().enumerate() {
        c_tri.add_triplet(k, col, 1.0);

        let (a, b) = endpoints[k];
        let (mut u, mut v) = (b, a);
        // Walk both endpoints up to their common ancestor. Steps from
        // bus1's side follow the cycle direction; steps from bus0's
        // side oppose it.
        let mut up_b: Vec<(usize, f64)> = Vec::new();
        let mut up_a: Vec<(usize, f64)> = Vec::new();
        while u != v {
            if depth[u] >= depth[v] {
                let (edge, p) = parent[u].expect("non-slack bus has a parent");
                let local = local_branch[&edge];
                let sign = if endpoints[local].0 == u { 1.0 } else { -1.0 };
                up_b.push((local, sign));
                u = p;
            } else {
                let (edge, p) = parent[v].expect("non-slack bus has a parent");
                let local = local_branch[&edge];
                let sign = if endpoints[local].0 == v { 1.0 } else { -1.0 };
                up_a.push((local, -sign));
                v = p;
            }
        }
        for (local, sign) in up_b.into_iter().chain(up_a) {
            c_tri.add_triplet(local, col, sign);
        }
    }
    sub.c = c_tri.to_csr();

    // PTDF through the reduced-matrix inverse, one solve per
    // non-slack bus column.
    sub.ptdf = vec![vec![0.0; n_b]; n_br];
    if n_b > 1 {
        let lu = sub
            .reduced_susceptance_lu()?
            .expect("multi-bus sub-network has a reduced matrix");
        for j in 0..n_b - 1 {
            let mut e_j = vec![0.0; n_b - 1];
            e_j[j] = 1.0;
            let x_col = lu.solve(&e_j);
            for (k, &(f, t)) in endpoints.iter().enumerate() {
                let fp = sub.bus_position[&BusId::new(f)];
                let tp = sub.bus_position[&BusId::new(t)];
                let xf = if fp == 0 { 0.0 } else { x_col[fp - 1] };
                let xt = if tp == 0 { 0.0 } else { x_col[tp - 1] };
                sub.ptdf[k][j + 1] = admittance[k] * (xf - xt);
            }
        }
    }

    Ok(())
}

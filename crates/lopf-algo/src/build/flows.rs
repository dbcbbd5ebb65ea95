//! Passive branch flow physics, in four interchangeable
//! formulations.
//!
//! All four declare the same `passive_branch_p` variables and differ
//! in the defining equalities and auxiliary state:
//!
//! - **angles**: voltage angle variables per bus, slack pinned to
//!   zero, one branch equation `y (theta0 - theta1) = p`.
//! - **ptdf**: branch flow expressed as the PTDF-weighted sum of
//!   nodal injections; no auxiliary variables.
//! - **cycles**: flow decomposed into cycle variables plus the tree
//!   routing of injections; Kirchhoff voltage law per cycle.
//! - **kirchhoff**: free branch flows constrained by the cycle law
//!   only (per-bus balance closes the system).

use lopf_core::{Network, SubNetwork, TopologyError};

use crate::algebra::{LinExpr, Sense};
use crate::error::LopfError;
use crate::lopf::Formulation;

use super::LopfModel;

/// Declare the branch flow variables and the defining equations of
/// the chosen formulation.
pub(super) fn declare_flows(
    network: &Network,
    m: &mut LopfModel,
    formulation: Formulation,
    ptdf_tolerance: f64,
) -> Result<(), LopfError> {
    let n = m.n_positions();
    m.passive_branch_p = Vec::with_capacity(network.passive_branches.len() * n);
    for branch in &network.passive_branches {
        for &sn in &m.snapshots {
            let p = m.model.add_var(
                format!("passive_branch_p({},{},{sn})", branch.kind, branch.name),
                f64::NEG_INFINITY,
                f64::INFINITY,
            );
            m.passive_branch_p.push(p);
        }
    }

    match formulation {
        Formulation::Angles => with_angles(network, m)?,
        Formulation::Ptdf => with_ptdf(network, m, ptdf_tolerance),
        Formulation::Cycles => with_cycles(network, m),
        Formulation::Kirchhoff => with_kirchhoff(network, m),
    }
    Ok(())
}

fn with_angles(network: &Network, m: &mut LopfModel) -> Result<(), LopfError> {
    let n = m.n_positions();

    m.voltage_angles = Vec::with_capacity(network.buses.len() * n);
    for bus in 0..network.buses.len() {
        for &sn in &m.snapshots {
            let theta = m.model.add_var(
                format!("voltage_angles({bus},{sn})"),
                f64::NEG_INFINITY,
                f64::INFINITY,
            );
            m.voltage_angles.push(theta);
        }
    }

    for (s, sub) in network.sub_networks.iter().enumerate() {
        let slack = sub.slack_bus.value();
        for (i, &sn) in m.snapshots.iter().enumerate() {
            m.model.add_constraint(
                format!("slack_angle({s},{sn})"),
                LinExpr::term(1.0, m.voltage_angles[slack * n + i]),
                Sense::Eq,
                LinExpr::new(),
            );
        }
    }

    for (b, branch) in network.passive_branches.iter().enumerate() {
        let sub = owning_sub_network(network, b)?;
        let y = 1.0 / sub.effective_impedance(branch);
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let mut lhs = LinExpr::with_capacity(3);
            lhs.add_term(y, m.voltage_angles[branch.bus0.value() * n + i]);
            lhs.add_term(-y, m.voltage_angles[branch.bus1.value() * n + i]);
            lhs.add_term(-1.0, m.passive_branch_p[b * n + i]);
            m.model.add_constraint(
                format!("passive_branch_p_def({},{},{sn})", branch.kind, branch.name),
                lhs,
                Sense::Eq,
                LinExpr::new(),
            );
        }
    }

    Ok(())
}

fn with_ptdf(network: &Network, m: &mut LopfModel, tolerance: f64) {
    let n = m.n_positions();

    for sub in &network.sub_networks {
        for (k, &br) in sub.branches().iter().enumerate() {
            let branch = &network.passive_branches[br.value()];
            for (i, &sn) in m.snapshots.iter().enumerate() {
                let mut lhs = LinExpr::new();
                for (col, &bus) in sub.buses().iter().enumerate() {
                    let factor = sub.ptdf[k][col];
                    if factor == 0.0 || factor.abs() < tolerance {
                        continue;
                    }
                    lhs.add_scaled(factor, &m.p_balance[bus.value() * n + i]);
                }
                m.model.add_constraint(
                    format!("passive_branch_p_def({},{},{sn})", branch.kind, branch.name),
                    lhs,
                    Sense::Eq,
                    LinExpr::term(1.0, m.passive_branch_p[br.value() * n + i]),
                );
            }
        }
    }
}

fn with_cycles(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();

    // Cycle flow variables per sub-network.
    m.cycle_flows = Vec::with_capacity(network.sub_networks.len());
    for (s, sub) in network.sub_networks.iter().enumerate() {
        let mut vars = Vec::with_capacity(sub.n_cycles() * n);
        for j in 0..sub.n_cycles() {
            for &sn in &m.snapshots {
                vars.push(m.model.add_var(
                    format!("cycles({s},{j},{sn})"),
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                ));
            }
        }
        m.cycle_flows.push(vars);
    }

    for (s, sub) in network.sub_networks.iter().enumerate() {
        // Row-bucketed views of C and T.
        let n_br = sub.branches().len();
        let mut c_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_br];
        for (&v, (row, col)) in sub.c.iter() {
            c_rows[row].push((col, v));
        }
        let mut t_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_br];
        for (&v, (row, col)) in sub.t.iter() {
            t_rows[row].push((col, v));
        }

        for (k, &br) in sub.branches().iter().enumerate() {
            let branch = &network.passive_branches[br.value()];
            for (i, &sn) in m.snapshots.iter().enumerate() {
                let mut lhs = LinExpr::new();
                for &(j, v) in &c_rows[k] {
                    lhs.add_term(v, m.cycle_flows[s][j * n + i]);
                }
                for &(col, v) in &t_rows[k] {
                    let bus = sub.buses_o()[col];
                    lhs.add_scaled(v, &m.p_balance[bus.value() * n + i]);
                }
                m.model.add_constraint(
                    format!("passive_branch_p_def({},{},{sn})", branch.kind, branch.name),
                    lhs,
                    Sense::Eq,
                    LinExpr::term(1.0, m.passive_branch_p[br.value() * n + i]),
                );
            }
        }

        kirchhoff_cycle_constraints(network, m, s, sub);
    }
}

fn with_kirchhoff(network: &Network, m: &mut LopfModel) {
    for (s, sub) in network.sub_networks.iter().enumerate() {
        kirchhoff_cycle_constraints(network, m, s, sub);
    }
}

/// Kirchhoff voltage law per cycle: the impedance-weighted flows
/// around every basis cycle sum to zero.
fn kirchhoff_cycle_constraints(
    network: &Network,
    m: &mut LopfModel,
    sub_index: usize,
    sub: &SubNetwork,
) {
    let n = m.n_positions();

    let mut c_cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); sub.n_cycles()];
    for (&v, (row, col)) in sub.c.iter() {
        c_cols[col].push((row, v));
    }

    for (j, entries) in c_cols.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let mut lhs = LinExpr::with_capacity(entries.len());
            for &(k, v) in entries {
                let br = sub.branches()[k];
                let branch = &network.passive_branches[br.value()];
                let z = sub.effective_impedance(branch);
                lhs.add_term(z * v, m.passive_branch_p[br.value() * n + i]);
            }
            m.model.add_constraint(
                format!("cycle_constraints({sub_index},{j},{sn})"),
                lhs,
                Sense::Eq,
                LinExpr::new(),
            );
        }
    }
}

/// Flow magnitude limits: `|p| <= s_nom` for fixed branches, coupled
/// to the capacity variable for extendable ones.
pub(super) fn declare_flow_limits(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();

    for (b, branch) in network.passive_branches.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let p = m.passive_branch_p[b * n + i];
            match m.branch_s_nom[b] {
                Some(s_nom) => {
                    let mut upper = LinExpr::term(1.0, p);
                    upper.add_term(-1.0, s_nom);
                    m.model.add_constraint(
                        format!("flow_upper({},{},{sn})", branch.kind, branch.name),
                        upper,
                        Sense::Leq,
                        LinExpr::new(),
                    );
                    let mut lower = LinExpr::term(1.0, p);
                    lower.add_term(1.0, s_nom);
                    m.model.add_constraint(
                        format!("flow_lower({},{},{sn})", branch.kind, branch.name),
                        lower,
                        Sense::Geq,
                        LinExpr::new(),
                    );
                }
                None => {
                    m.model.add_constraint(
                        format!("flow_upper({},{},{sn})", branch.kind, branch.name),
                        LinExpr::term(1.0, p),
                        Sense::Leq,
                        LinExpr::constant_expr(branch.s_nom),
                    );
                    m.model.add_constraint(
                        format!("flow_lower({},{},{sn})", branch.kind, branch.name),
                        LinExpr::term(1.0, p),
                        Sense::Geq,
                        LinExpr::constant_expr(-branch.s_nom),
                    );
                }
            }
        }
    }
}

fn owning_sub_network<'a>(
    network: &'a Network,
    branch: usize,
) -> Result<&'a SubNetwork, LopfError> {
    let id = network.passive_branches[branch]
        .sub_network
        .ok_or(TopologyError::MissingTopology)?;
    Ok(&network.sub_networks[id.value()])
}

//! Decode the solver's primal and dual vectors back into the network
//! time series.
//!
//! Primal values land in the per-element `p`/`e`/`soc` series, bus
//! injections are rebuilt from the extracted one-port series, and
//! balance duals become nodal marginal prices. For the non-angle
//! formulations, voltage angles are recovered post-hoc by solving
//! `B[1:,1:] theta = p` per sub-network with the slack angle pinned
//! to zero.

use lopf_core::Network;

use crate::build::LopfModel;
use crate::error::LopfError;
use crate::lopf::Formulation;
use crate::solver::Solution;

pub(crate) fn extract(
    network: &mut Network,
    m: &LopfModel,
    solution: &Solution,
    formulation: Formulation,
) -> Result<(), LopfError> {
    let n = m.n_positions();
    network.objective = solution.objective;

    // One-port primal series.
    for g in 0..network.generators.len() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            network
                .generators_t
                .p
                .set(g, sn, solution.value(m.gen_p[g * n + i]));
        }
    }

    for s in 0..network.storage_units.len() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let dispatch = solution.value(m.storage_p_dispatch[s * n + i]);
            let store = solution.value(m.storage_p_store[s * n + i]);
            network.storage_units_t.p.set(s, sn, dispatch - store);
            network.storage_units_t.state_of_charge.set(
                s,
                sn,
                solution.value(m.state_of_charge[s * n + i]),
            );
            let spill = m.storage_p_spill[s * n + i]
                .map(|v| solution.value(v))
                .unwrap_or(0.0);
            network.storage_units_t.spill.set(s, sn, spill);
        }
    }

    for s in 0..network.stores.len() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            network
                .stores_t
                .p
                .set(s, sn, solution.value(m.store_p[s * n + i]));
            network
                .stores_t
                .e
                .set(s, sn, solution.value(m.store_e[s * n + i]));
        }
    }

    for l in 0..network.loads.len() {
        for &sn in &m.snapshots {
            let p_set = network.loads_t.p_set.get(l, sn);
            network.loads_t.p.set(l, sn, p_set);
        }
    }

    // Net bus injection from the signed one-port series.
    for bus in 0..network.buses.len() {
        for &sn in &m.snapshots {
            network.buses_t.p.set(bus, sn, 0.0);
        }
    }
    for g in 0..network.generators.len() {
        let (bus, sign) = (network.generators[g].bus.value(), network.generators[g].sign);
        for &sn in &m.snapshots {
            let p = network.generators_t.p.get(g, sn);
            add_to(network, bus, sn, sign * p);
        }
    }
    for l in 0..network.loads.len() {
        let (bus, sign) = (network.loads[l].bus.value(), network.loads[l].sign);
        for &sn in &m.snapshots {
            let p = network.loads_t.p.get(l, sn);
            add_to(network, bus, sn, sign * p);
        }
    }
    for s in 0..network.storage_units.len() {
        let (bus, sign) = (
            network.storage_units[s].bus.value(),
            network.storage_units[s].sign,
        );
        for &sn in &m.snapshots {
            let p = network.storage_units_t.p.get(s, sn);
            add_to(network, bus, sn, sign * p);
        }
    }
    for s in 0..network.stores.len() {
        let (bus, sign) = (network.stores[s].bus.value(), network.stores[s].sign);
        for &sn in &m.snapshots {
            let p = network.stores_t.p.get(s, sn);
            add_to(network, bus, sn, sign * p);
        }
    }

    // Branch flows.
    for b in 0..network.passive_branches.len() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let p0 = solution.value(m.passive_branch_p[b * n + i]);
            network.branches_t.p0.set(b, sn, p0);
            network.branches_t.p1.set(b, sn, -p0);
        }
    }

    for l in 0..network.links.len() {
        let (bus0, bus1, efficiency) = (
            network.links[l].bus0.value(),
            network.links[l].bus1.value(),
            network.links[l].efficiency,
        );
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let p0 = solution.value(m.link_p[l * n + i]);
            let p1 = -efficiency * p0;
            network.links_t.p0.set(l, sn, p0);
            network.links_t.p1.set(l, sn, p1);
            add_to(network, bus0, sn, -p0);
            add_to(network, bus1, sn, -p1);
        }
    }

    // Voltage angles: read for the angles formulation, recovered by
    // a reduced susceptance solve otherwise.
    match formulation {
        Formulation::Angles => {
            for bus in 0..network.buses.len() {
                for (i, &sn) in m.snapshots.iter().enumerate() {
                    network.buses_t.v_ang.set(
                        bus,
                        sn,
                        solution.value(m.voltage_angles[bus * n + i]),
                    );
                }
            }
        }
        Formulation::Ptdf | Formulation::Cycles | Formulation::Kirchhoff => {
            for sub in &network.sub_networks {
                let slack = sub.slack_bus.value();
                for &sn in &m.snapshots {
                    network.buses_t.v_ang.set(slack, sn, 0.0);
                }
                let Some(lu) = sub.reduced_susceptance_lu()? else {
                    continue;
                };
                for &sn in &m.snapshots {
                    let rhs: Vec<f64> = sub
                        .buses_o()
                        .iter()
                        .map(|&bus| network.buses_t.p.get(bus.value(), sn))
                        .collect();
                    let theta = lu.solve(&rhs);
                    for (pos, &bus) in sub.buses_o().iter().enumerate() {
                        network.buses_t.v_ang.set(bus.value(), sn, theta[pos]);
                    }
                }
            }
        }
    }

    // Voltage magnitudes: AC buses at nominal; DC buses carry the
    // per-unit deviation in the angle slot, which is then cleared.
    for (bus, info) in network.buses.iter().enumerate() {
        let dc = info.carrier == "DC";
        for &sn in &m.snapshots {
            if dc {
                let v = 1.0 + network.buses_t.v_ang.get(bus, sn);
                network.buses_t.v_mag_pu.set(bus, sn, v);
                network.buses_t.v_ang.set(bus, sn, 0.0);
            } else {
                network.buses_t.v_mag_pu.set(bus, sn, 1.0);
            }
        }
    }

    // Marginal prices from the balance duals.
    match formulation {
        Formulation::Angles | Formulation::Kirchhoff => {
            for bus in 0..network.buses.len() {
                for (i, &sn) in m.snapshots.iter().enumerate() {
                    if let Some(con) = m.power_balance[bus * n + i] {
                        network
                            .buses_t
                            .marginal_price
                            .set(bus, sn, solution.dual(con));
                    }
                }
            }
        }
        Formulation::Ptdf | Formulation::Cycles => {
            for (s, sub) in network.sub_networks.iter().enumerate() {
                for (i, &sn) in m.snapshots.iter().enumerate() {
                    if let Some(con) = m.sub_network_balance[s * n + i] {
                        let price = solution.dual(con);
                        for &bus in sub.buses() {
                            network.buses_t.marginal_price.set(bus.value(), sn, price);
                        }
                    }
                }
            }
        }
    }

    // Optimal nominal capacities: existing values, overwritten for
    // extendable elements.
    for (g, gen) in network.generators.iter_mut().enumerate() {
        gen.p_nom_opt = match m.gen_p_nom[g] {
            Some(v) => solution.value(v),
            None => gen.p_nom,
        };
    }
    for (s, su) in network.storage_units.iter_mut().enumerate() {
        su.p_nom_opt = match m.storage_p_nom[s] {
            Some(v) => solution.value(v),
            None => su.p_nom,
        };
    }
    for (s, store) in network.stores.iter_mut().enumerate() {
        store.e_nom_opt = match m.store_e_nom[s] {
            Some(v) => solution.value(v),
            None => store.e_nom,
        };
    }
    for (b, branch) in network.passive_branches.iter_mut().enumerate() {
        branch.s_nom_opt = match m.branch_s_nom[b] {
            Some(v) => solution.value(v),
            None => branch.s_nom,
        };
    }
    for (l, link) in network.links.iter_mut().enumerate() {
        link.p_nom_opt = match m.link_p_nom[l] {
            Some(v) => solution.value(v),
            None => link.p_nom,
        };
    }

    Ok(())
}

#[inline]
fn add_to(network: &mut Network, bus: usize, snapshot: usize, value: f64) {
    let current = network.buses_t.p.get(bus, snapshot);
    network.buses_t.p.set(bus, snapshot, current + value);
}

//! Nodal balance assembly and the balance equality constraints.

use lopf_core::Network;

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

/// Accumulate the non-branch contribution of every element into
/// `p_balance[(bus, position)]`. Passive branch terms are appended
/// later, only for the formulations that balance per bus.
pub(super) fn assemble_nodal_balance(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();

    for (l, link) in network.links.iter().enumerate() {
        for i in 0..n {
            let p = m.link_p[l * n + i];
            m.p_balance[link.bus0.value() * n + i].add_term(-1.0, p);
            m.p_balance[link.bus1.value() * n + i].add_term(link.efficiency, p);
        }
    }

    for (g, gen) in network.generators.iter().enumerate() {
        for i in 0..n {
            let p = m.gen_p[g * n + i];
            m.p_balance[gen.bus.value() * n + i].add_term(gen.sign, p);
        }
    }

    for (l, load) in network.loads.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let p_set = network.loads_t.p_set.get(l, sn);
            m.p_balance[load.bus.value() * n + i].add_constant(load.sign * p_set);
        }
    }

    for (s, su) in network.storage_units.iter().enumerate() {
        for i in 0..n {
            let bus = su.bus.value() * n + i;
            m.p_balance[bus].add_term(su.sign, m.storage_p_dispatch[s * n + i]);
            m.p_balance[bus].add_term(-su.sign, m.storage_p_store[s * n + i]);
        }
    }

    for (s, store) in network.stores.iter().enumerate() {
        for i in 0..n {
            m.p_balance[store.bus.value() * n + i].add_term(store.sign, m.store_p[s * n + i]);
        }
    }
}

/// Append passive branch terms and bind one balance equality per
/// (bus, position). Used by the angles and kirchhoff formulations;
/// the constraint handles feed dual extraction.
pub(super) fn bind_nodal_balance(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();

    for (b, branch) in network.passive_branches.iter().enumerate() {
        for i in 0..n {
            let p = m.passive_branch_p[b * n + i];
            m.p_balance[branch.bus0.value() * n + i].add_term(-1.0, p);
            m.p_balance[branch.bus1.value() * n + i].add_term(1.0, p);
        }
    }

    for bus in 0..network.buses.len() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let expr = std::mem::take(&mut m.p_balance[bus * n + i]);
            let con = m.model.add_constraint(
                format!("power_balance({bus},{sn})"),
                expr,
                Sense::Eq,
                LinExpr::new(),
            );
            m.power_balance[bus * n + i] = Some(con);
        }
    }
}

/// Bind one balance equality per (sub-network, position): the summed
/// nodal balances of the member buses. Used by the ptdf and cycles
/// formulations, whose flow definitions already encode per-bus
/// physics in terms of the injections.
pub(super) fn bind_sub_network_balance(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();
    m.sub_network_balance = vec![None; network.sub_networks.len() * n];

    for (s, sub) in network.sub_networks.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let mut expr = LinExpr::new();
            for &bus in sub.buses() {
                let part = std::mem::take(&mut m.p_balance[bus.value() * n + i]);
                expr.extend(&part);
            }
            let con = m.model.add_constraint(
                format!("sub_network_balance({s},{sn})"),
                expr,
                Sense::Eq,
                LinExpr::new(),
            );
            m.sub_network_balance[s * n + i] = Some(con);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{generators, LopfModel};
    use lopf_core::{Bus, Generator, Load};

    #[test]
    fn test_balance_collects_signed_terms() {
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
        network.loads_t.p_set.set(load.value(), 0, 30.0);

        let mut m = LopfModel::new(&network, vec![0]);
        generators::declare(&network, &mut m);
        assemble_nodal_balance(&network, &mut m);

        // Bus A: one +1 generator term, no constant.
        let bus_a = &m.p_balance[0];
        assert_eq!(bus_a.terms, vec![(1.0, m.gen_p[0])]);
        assert_eq!(bus_a.constant, 0.0);

        // Bus B: load enters as a -p_set constant.
        let bus_b = &m.p_balance[1];
        assert!(bus_b.terms.is_empty());
        assert!((bus_b.constant + 30.0).abs() < 1e-12);
    }
}

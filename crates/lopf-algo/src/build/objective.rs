//! Linear objective: marginal dispatch costs plus capital costs of
//! capacity expansion.

use lopf_core::Network;

use crate::algebra::LinExpr;

use super::LopfModel;

/// Attach the snapshot-weighted marginal costs and, for extendable
/// elements, `capital_cost * (x_nom - existing)`. The constant
/// subtraction of existing capacity keeps a solution with zero
/// additional capacity at zero capital cost.
pub(super) fn attach(network: &Network, m: &mut LopfModel) {
    let mut objective = LinExpr::new();

    for (g, gen) in network.generators.iter().enumerate() {
        if gen.marginal_cost == 0.0 {
            continue;
        }
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            objective.add_term(gen.marginal_cost * w, m.gen_p[m.index(g, i)]);
        }
    }

    for (s, su) in network.storage_units.iter().enumerate() {
        if su.marginal_cost == 0.0 {
            continue;
        }
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            objective.add_term(su.marginal_cost * w, m.storage_p_dispatch[m.index(s, i)]);
        }
    }

    for (s, store) in network.stores.iter().enumerate() {
        if store.marginal_cost == 0.0 {
            continue;
        }
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            objective.add_term(store.marginal_cost * w, m.store_p[m.index(s, i)]);
        }
    }

    for (l, link) in network.links.iter().enumerate() {
        if link.marginal_cost == 0.0 {
            continue;
        }
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            objective.add_term(link.marginal_cost * w, m.link_p[m.index(l, i)]);
        }
    }

    for (g, gen) in network.generators.iter().enumerate() {
        if let Some(p_nom) = m.gen_p_nom[g] {
            objective.add_term(gen.capital_cost, p_nom);
            objective.add_constant(-gen.capital_cost * gen.p_nom);
        }
    }
    for (s, su) in network.storage_units.iter().enumerate() {
        if let Some(p_nom) = m.storage_p_nom[s] {
            objective.add_term(su.capital_cost, p_nom);
            objective.add_constant(-su.capital_cost * su.p_nom);
        }
    }
    for (s, store) in network.stores.iter().enumerate() {
        if let Some(e_nom) = m.store_e_nom[s] {
            objective.add_term(store.capital_cost, e_nom);
            objective.add_constant(-store.capital_cost * store.e_nom);
        }
    }
    for (b, branch) in network.passive_branches.iter().enumerate() {
        if let Some(s_nom) = m.branch_s_nom[b] {
            objective.add_term(branch.capital_cost, s_nom);
            objective.add_constant(-branch.capital_cost * branch.s_nom);
        }
    }
    for (l, link) in network.links.iter().enumerate() {
        if let Some(p_nom) = m.link_p_nom[l] {
            objective.add_term(link.capital_cost, p_nom);
            objective.add_constant(-link.capital_cost * link.p_nom);
        }
    }

    m.model.set_objective(objective);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{generators, links, LopfModel};
    use lopf_core::{Bus, BusId, Generator, PassiveBranch};

    #[test]
    fn test_marginal_costs_weighted() {
        let mut network = Network::new(vec![1.0, 3.0]);
        network.add_bus(Bus::new("A", "AC"));
        network.add_generator(Generator {
            name: "gen".into(),
            bus: BusId::new(0),
            p_nom: 100.0,
            marginal_cost: 10.0,
            ..Generator::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1]);
        generators::declare(&network, &mut m);
        attach(&network, &mut m);

        let objective = m.model.objective_terms();
        assert_eq!(objective.terms.len(), 2);
        let coeffs: Vec<f64> = objective.terms.iter().map(|&(c, _)| c).collect();
        assert!(coeffs.contains(&10.0));
        assert!(coeffs.contains(&30.0));
        assert_eq!(objective.constant, 0.0);
    }

    #[test]
    fn test_capital_cost_normalized_by_existing() {
        let mut network = Network::new(vec![1.0]);
        let a = network.add_bus(Bus::new("A", "AC"));
        let b = network.add_bus(Bus::new("B", "AC"));
        network.add_passive_branch(PassiveBranch {
            name: "A-B".into(),
            bus0: a,
            bus1: b,
            x_pu: 0.1,
            s_nom: 50.0,
            s_nom_extendable: true,
            s_nom_max: 200.0,
            capital_cost: 4.0,
            ..PassiveBranch::default()
        });

        let mut m = LopfModel::new(&network, vec![0]);
        links::declare_extension_capacities(&network, &mut m);
        attach(&network, &mut m);

        let objective = m.model.objective_terms();
        assert_eq!(objective.terms.len(), 1);
        assert_eq!(objective.terms[0].0, 4.0);
        // -capital_cost * existing s_nom
        assert_eq!(objective.constant, -200.0);
    }
}

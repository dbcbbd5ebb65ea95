//! Capacity extension variables and controllable link flows.

use lopf_core::Network;

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

/// Declare `passive_branch_s_nom` and `link_p_nom` for extendable
/// branches.
pub(super) fn declare_extension_capacities(network: &Network, m: &mut LopfModel) {
    for (b, branch) in network.passive_branches.iter().enumerate() {
        if branch.s_nom_extendable {
            let s_nom = m.model.add_var(
                format!("passive_branch_s_nom({},{})", branch.kind, branch.name),
                branch.s_nom_min.max(0.0),
                branch.s_nom_max,
            );
            m.branch_s_nom[b] = Some(s_nom);
        }
    }

    for (l, link) in network.links.iter().enumerate() {
        if link.p_nom_extendable {
            let p_nom = m.model.add_var(
                format!("link_p_nom({l})"),
                link.p_nom_min.max(0.0),
                link.p_nom_max,
            );
            m.link_p_nom[l] = Some(p_nom);
        }
    }
}

/// Declare `link_p` with fixed-capacity bounds, or free with
/// capacity-coupling constraints for extendable links.
pub(super) fn declare_flows(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();
    m.link_p = Vec::with_capacity(network.links.len() * n);

    for (l, link) in network.links.iter().enumerate() {
        for &sn in &m.snapshots {
            let (lower, upper) = if link.p_nom_extendable {
                (f64::NEG_INFINITY, f64::INFINITY)
            } else {
                (link.p_min_pu * link.p_nom, link.p_max_pu * link.p_nom)
            };
            let p = m
                .model
                .add_var(format!("link_p({l},{sn})"), lower, upper);
            m.link_p.push(p);
        }
    }

    for (l, link) in network.links.iter().enumerate() {
        let Some(p_nom) = m.link_p_nom[l] else {
            continue;
        };
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let p = m.link_p[m.index(l, i)];

            let mut upper = LinExpr::term(1.0, p);
            upper.add_term(-link.p_max_pu, p_nom);
            m.model.add_constraint(
                format!("link_p_upper({l},{sn})"),
                upper,
                Sense::Leq,
                LinExpr::new(),
            );

            let mut lower = LinExpr::term(1.0, p);
            lower.add_term(-link.p_min_pu, p_nom);
            m.model.add_constraint(
                format!("link_p_lower({l},{sn})"),
                lower,
                Sense::Geq,
                LinExpr::new(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::LopfModel;
    use lopf_core::{Bus, BusId, Link, PassiveBranch};

    fn two_bus() -> Network {
        let mut network = Network::new(vec![1.0]);
        network.add_bus(Bus::new("A", "AC"));
        network.add_bus(Bus::new("B", "DC"));
        network
    }

    #[test]
    fn test_fixed_link_bounds() {
        let mut network = two_bus();
        network.add_link(Link {
            name: "hvdc".into(),
            bus0: BusId::new(0),
            bus1: BusId::new(1),
            p_nom: 400.0,
            p_min_pu: -1.0,
            ..Link::default()
        });

        let mut m = LopfModel::new(&network, vec![0]);
        declare_extension_capacities(&network, &mut m);
        declare_flows(&network, &mut m);

        assert_eq!(m.model.bounds(m.link_p[0]), (-400.0, 400.0));
        assert!(m.link_p_nom[0].is_none());
        assert_eq!(m.model.n_cons(), 0);
    }

    #[test]
    fn test_extendable_link_coupling() {
        let mut network = two_bus();
        network.add_link(Link {
            name: "hvdc".into(),
            bus0: BusId::new(0),
            bus1: BusId::new(1),
            p_nom_extendable: true,
            p_nom_max: 1000.0,
            ..Link::default()
        });

        let mut m = LopfModel::new(&network, vec![0]);
        declare_extension_capacities(&network, &mut m);
        declare_flows(&network, &mut m);

        let p_nom = m.link_p_nom[0].expect("capacity variable");
        assert_eq!(m.model.bounds(p_nom), (0.0, 1000.0));
        assert_eq!(m.model.n_cons(), 2);
    }

    #[test]
    fn test_extendable_branch_capacity_bounds() {
        let mut network = Network::new(vec![1.0]);
        let a = network.add_bus(Bus::new("A", "AC"));
        let b = network.add_bus(Bus::new("B", "AC"));
        network.add_passive_branch(PassiveBranch {
            name: "A-B".into(),
            bus0: a,
            bus1: b,
            x_pu: 0.1,
            s_nom: 100.0,
            s_nom_extendable: true,
            s_nom_min: 100.0,
            s_nom_max: 400.0,
            ..PassiveBranch::default()
        });

        let mut m = LopfModel::new(&network, vec![0]);
        declare_extension_capacities(&network, &mut m);

        let s_nom = m.branch_s_nom[0].expect("capacity variable");
        assert_eq!(m.model.bounds(s_nom), (100.0, 400.0));
    }
}

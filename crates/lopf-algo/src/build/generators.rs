//! Generator dispatch and capacity declarations.

use lopf_core::{Dispatch, Network};

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

/// Declare `generator_p` (and `generator_p_nom` for extendable
/// units) with the per-category bounds, and couple extendable
/// dispatch to its capacity variable.
pub(super) fn declare(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();
    m.model
        .reserve_vars(network.generators.len() * n);
    m.gen_p = Vec::with_capacity(network.generators.len() * n);

    for (g, gen) in network.generators.iter().enumerate() {
        for &sn in &m.snapshots {
            let (lower, upper) = if gen.p_nom_extendable {
                // Bounded through explicit capacity coupling below.
                (f64::NEG_INFINITY, f64::INFINITY)
            } else {
                match gen.dispatch {
                    Dispatch::Variable => (
                        network.generators_t.p_min_pu.get(g, sn) * gen.p_nom,
                        network.generators_t.p_max_pu.get(g, sn) * gen.p_nom,
                    ),
                    Dispatch::Flexible => (
                        gen.p_min_pu_fixed * gen.p_nom,
                        gen.p_max_pu_fixed * gen.p_nom,
                    ),
                }
            };
            let var = m
                .model
                .add_var(format!("generator_p({g},{sn})"), lower, upper);
            m.gen_p.push(var);
        }
    }

    for (g, gen) in network.generators.iter().enumerate() {
        if !gen.p_nom_extendable {
            continue;
        }
        let p_nom = m.model.add_var(
            format!("generator_p_nom({g})"),
            gen.p_nom_min.max(0.0),
            gen.p_nom_max,
        );
        m.gen_p_nom[g] = Some(p_nom);

        for (i, &sn) in m.snapshots.iter().enumerate() {
            let (pu_min, pu_max) = match gen.dispatch {
                Dispatch::Variable => (
                    network.generators_t.p_min_pu.get(g, sn),
                    network.generators_t.p_max_pu.get(g, sn),
                ),
                Dispatch::Flexible => (gen.p_min_pu_fixed, gen.p_max_pu_fixed),
            };
            let p = m.gen_p[m.index(g, i)];

            let mut lower = LinExpr::term(1.0, p);
            lower.add_term(-pu_min, p_nom);
            m.model.add_constraint(
                format!("generator_p_lower({g},{sn})"),
                lower,
                Sense::Geq,
                LinExpr::new(),
            );

            let mut upper = LinExpr::term(1.0, p);
            upper.add_term(-pu_max, p_nom);
            m.model.add_constraint(
                format!("generator_p_upper({g},{sn})"),
                upper,
                Sense::Leq,
                LinExpr::new(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::LopfModel;
    use lopf_core::{Bus, Generator};

    fn base_network() -> Network {
        let mut network = Network::new(vec![1.0, 2.0]);
        network.add_bus(Bus::new("A", "AC"));
        network
    }

    #[test]
    fn test_flexible_bounds_scale_with_p_nom() {
        let mut network = base_network();
        network.add_generator(Generator {
            name: "gen".into(),
            bus: lopf_core::BusId::new(0),
            p_nom: 80.0,
            p_min_pu_fixed: 0.25,
            ..Generator::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1]);
        declare(&network, &mut m);

        assert_eq!(m.gen_p.len(), 2);
        let (lower, upper) = m.model.bounds(m.gen_p[0]);
        assert!((lower - 20.0).abs() < 1e-12);
        assert!((upper - 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_variable_bounds_follow_series() {
        let mut network = base_network();
        let g = network.add_generator(Generator {
            name: "wind".into(),
            bus: lopf_core::BusId::new(0),
            dispatch: Dispatch::Variable,
            p_nom: 50.0,
            ..Generator::default()
        });
        network.generators_t.p_max_pu.set(g.value(), 1, 0.4);

        let mut m = LopfModel::new(&network, vec![0, 1]);
        declare(&network, &mut m);

        let (_, full) = m.model.bounds(m.gen_p[0]);
        let (_, curtailed) = m.model.bounds(m.gen_p[1]);
        assert!((full - 50.0).abs() < 1e-12);
        assert!((curtailed - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_extendable_gets_capacity_var_and_coupling() {
        let mut network = base_network();
        network.add_generator(Generator {
            name: "new".into(),
            bus: lopf_core::BusId::new(0),
            p_nom_extendable: true,
            p_nom_min: 10.0,
            p_nom_max: 500.0,
            ..Generator::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1]);
        declare(&network, &mut m);

        let p_nom = m.gen_p_nom[0].expect("capacity variable");
        assert_eq!(m.model.bounds(p_nom), (10.0, 500.0));
        // Dispatch itself is unbounded; coupling handles the limits.
        let (lower, upper) = m.model.bounds(m.gen_p[0]);
        assert!(lower.is_infinite() && upper.is_infinite());
        // Two coupling constraints per snapshot.
        assert_eq!(m.model.n_cons(), 4);
    }
}

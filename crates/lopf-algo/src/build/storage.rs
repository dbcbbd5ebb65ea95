//! Storage unit dispatch, charging, spill and state-of-charge
//! declarations.
//!
//! The state-of-charge recurrence couples snapshots:
//!
//! ```text
//! soc[t] = (1 - standing_loss)^w[t] * soc_prev
//!        + eff_store * w[t] * p_store[t]
//!        - (1 / eff_dispatch) * w[t] * p_dispatch[t]
//!        + inflow[t] * w[t] - w[t] * spill[t]
//! ```
//!
//! `soc_prev` at the first position is either the constant
//! `state_of_charge_initial` (non-cyclic) or the variable at the last
//! position of the solve window (cyclic). A finite
//! `state_of_charge_set` replaces the soc term with that constant and
//! pins the variable with a separate equality.

use lopf_core::Network;

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

pub(super) fn declare(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();
    let n_su = network.storage_units.len();
    m.storage_p_dispatch = Vec::with_capacity(n_su * n);
    m.storage_p_store = Vec::with_capacity(n_su * n);
    m.storage_p_spill = Vec::with_capacity(n_su * n);
    m.state_of_charge = Vec::with_capacity(n_su * n);

    // Dispatch, store and spill variables.
    for (s, su) in network.storage_units.iter().enumerate() {
        for &sn in &m.snapshots {
            let dispatch_upper = if su.p_nom_extendable {
                f64::INFINITY
            } else {
                su.p_nom * su.p_max_pu_fixed
            };
            let dispatch = m.model.add_var(
                format!("storage_p_dispatch({s},{sn})"),
                0.0,
                dispatch_upper,
            );
            m.storage_p_dispatch.push(dispatch);

            let store_upper = if su.p_nom_extendable {
                f64::INFINITY
            } else {
                -su.p_nom * su.p_min_pu_fixed
            };
            let store = m
                .model
                .add_var(format!("storage_p_store({s},{sn})"), 0.0, store_upper);
            m.storage_p_store.push(store);

            // Spill exists only where there is inflow to shed.
            let inflow = network.storage_units_t.inflow.get(s, sn);
            let spill = if inflow > 0.0 {
                Some(
                    m.model
                        .add_var(format!("storage_p_spill({s},{sn})"), 0.0, inflow),
                )
            } else {
                None
            };
            m.storage_p_spill.push(spill);
        }
    }

    // Capacity variables and dispatch/store coupling for extendable
    // units.
    for (s, su) in network.storage_units.iter().enumerate() {
        if !su.p_nom_extendable {
            continue;
        }
        let p_nom = m.model.add_var(
            format!("storage_p_nom({s})"),
            su.p_nom_min.max(0.0),
            su.p_nom_max,
        );
        m.storage_p_nom[s] = Some(p_nom);

        for (i, &sn) in m.snapshots.iter().enumerate() {
            let mut upper = LinExpr::term(1.0, m.storage_p_dispatch[m.index(s, i)]);
            upper.add_term(-su.p_max_pu_fixed, p_nom);
            m.model.add_constraint(
                format!("storage_p_upper({s},{sn})"),
                upper,
                Sense::Leq,
                LinExpr::new(),
            );

            let mut lower = LinExpr::term(1.0, m.storage_p_store[m.index(s, i)]);
            lower.add_term(su.p_min_pu_fixed, p_nom);
            m.model.add_constraint(
                format!("storage_p_lower({s},{sn})"),
                lower,
                Sense::Leq,
                LinExpr::new(),
            );
        }
    }

    // State of charge: energy limit through the bound for fixed
    // units, through capacity coupling for extendable ones.
    for (s, su) in network.storage_units.iter().enumerate() {
        for &sn in &m.snapshots {
            let upper = if su.p_nom_extendable {
                f64::INFINITY
            } else {
                su.max_hours * su.p_nom
            };
            let soc = m
                .model
                .add_var(format!("state_of_charge({s},{sn})"), 0.0, upper);
            m.state_of_charge.push(soc);
        }

        if let Some(p_nom) = m.storage_p_nom[s] {
            for (i, &sn) in m.snapshots.iter().enumerate() {
                let mut upper = LinExpr::term(1.0, m.state_of_charge[m.index(s, i)]);
                upper.add_term(-su.max_hours, p_nom);
                m.model.add_constraint(
                    format!("state_of_charge_upper({s},{sn})"),
                    upper,
                    Sense::Leq,
                    LinExpr::new(),
                );
            }
        }
    }

    declare_soc_recurrence(network, m);
}

fn declare_soc_recurrence(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();

    for (s, su) in network.storage_units.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            let decay = (1.0 - su.standing_loss).powf(w);

            let mut lhs = LinExpr::with_capacity(5);

            if i == 0 && !su.cyclic_state_of_charge {
                lhs.add_constant(decay * su.state_of_charge_initial);
            } else {
                // Cyclic units wrap to the last position of the
                // solve window.
                let prev = if i == 0 { n - 1 } else { i - 1 };
                lhs.add_term(decay, m.state_of_charge[m.index(s, prev)]);
            }

            match network.storage_units_t.soc_set(s, sn) {
                None => lhs.add_term(-1.0, m.state_of_charge[m.index(s, i)]),
                Some(soc_set) => {
                    lhs.add_constant(-soc_set);
                    // Keep the variable pinned to the prescribed value.
                    m.model.add_constraint(
                        format!("state_of_charge_constraint_fixed({s},{sn})"),
                        LinExpr::term(1.0, m.state_of_charge[m.index(s, i)]),
                        Sense::Eq,
                        LinExpr::constant_expr(soc_set),
                    );
                }
            }

            lhs.add_term(
                su.efficiency_store * w,
                m.storage_p_store[m.index(s, i)],
            );
            lhs.add_term(
                -(1.0 / su.efficiency_dispatch) * w,
                m.storage_p_dispatch[m.index(s, i)],
            );
            lhs.add_constant(network.storage_units_t.inflow.get(s, sn) * w);

            if let Some(spill) = m.storage_p_spill[m.index(s, i)] {
                lhs.add_term(-w, spill);
            }

            m.model.add_constraint(
                format!("state_of_charge_constraint({s},{sn})"),
                lhs,
                Sense::Eq,
                LinExpr::new(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::LopfModel;
    use lopf_core::{Bus, BusId, StorageUnit};

    fn network_with_unit(su: StorageUnit) -> Network {
        let mut network = Network::new(vec![1.0, 2.0, 1.0]);
        network.add_bus(Bus::new("A", "AC"));
        network.add_storage_unit(su);
        network
    }

    #[test]
    fn test_fixed_unit_bounds() {
        let network = network_with_unit(StorageUnit {
            name: "su".into(),
            bus: BusId::new(0),
            p_nom: 10.0,
            p_max_pu_fixed: 0.8,
            p_min_pu_fixed: -0.5,
            max_hours: 4.0,
            ..StorageUnit::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        let (_, dispatch_ub) = m.model.bounds(m.storage_p_dispatch[0]);
        let (_, store_ub) = m.model.bounds(m.storage_p_store[0]);
        let (soc_lb, soc_ub) = m.model.bounds(m.state_of_charge[0]);
        assert!((dispatch_ub - 8.0).abs() < 1e-12);
        assert!((store_ub - 5.0).abs() < 1e-12);
        assert_eq!(soc_lb, 0.0);
        assert!((soc_ub - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_spill_only_with_inflow() {
        let mut network = network_with_unit(StorageUnit {
            name: "hydro".into(),
            bus: BusId::new(0),
            p_nom: 10.0,
            ..StorageUnit::default()
        });
        network.storage_units_t.inflow.set(0, 1, 3.0);

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        assert!(m.storage_p_spill[0].is_none());
        let spill = m.storage_p_spill[1].expect("spill at inflow snapshot");
        assert_eq!(m.model.bounds(spill), (0.0, 3.0));
        assert!(m.storage_p_spill[2].is_none());
    }

    #[test]
    fn test_extendable_unit_couples_to_capacity() {
        let network = network_with_unit(StorageUnit {
            name: "su".into(),
            bus: BusId::new(0),
            p_nom_extendable: true,
            p_nom_max: 100.0,
            max_hours: 6.0,
            ..StorageUnit::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        let p_nom = m.storage_p_nom[0].expect("capacity variable");
        assert_eq!(m.model.bounds(p_nom), (0.0, 100.0));
        let (_, dispatch_ub) = m.model.bounds(m.storage_p_dispatch[0]);
        assert!(dispatch_ub.is_infinite());
        // 3 positions x (p_upper + p_lower + soc_upper) + 3 soc
        // recurrences.
        assert_eq!(m.model.n_cons(), 12);
    }

    #[test]
    fn test_spill_coefficient_uses_per_snapshot_weight() {
        // Heterogeneous weights: the spill term must carry the
        // weight of its own snapshot, not a stale one.
        let mut network = Network::new(vec![1.0, 2.0, 1.0]);
        network.add_bus(lopf_core::Bus::new("A", "AC"));
        network.add_storage_unit(StorageUnit {
            name: "hydro".into(),
            bus: BusId::new(0),
            p_nom: 10.0,
            ..StorageUnit::default()
        });
        network.storage_units_t.inflow.set(0, 1, 4.0);

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        let spill = m.storage_p_spill[1].expect("spill variable");
        // Constraints: three recurrences, in position order.
        let (terms, _, _) = m.model.constraints().nth(1).unwrap();
        let coeff = terms
            .iter()
            .find(|&&(_, v)| v == spill)
            .map(|&(c, _)| c)
            .expect("spill term in recurrence");
        assert!((coeff + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cyclic_first_snapshot_wraps_to_window_end() {
        let network = network_with_unit(StorageUnit {
            name: "su".into(),
            bus: BusId::new(0),
            p_nom: 10.0,
            max_hours: 4.0,
            cyclic_state_of_charge: true,
            ..StorageUnit::default()
        });

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        // First recurrence couples to the soc variable of the last
        // window position, with the decay coefficient (here 1).
        let last_soc = m.state_of_charge[2];
        let (terms, _, _) = m.model.constraints().next().unwrap();
        assert!(terms.iter().any(|&(c, v)| v == last_soc && (c - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_pinned_soc_adds_fixing_constraint() {
        let mut network = network_with_unit(StorageUnit {
            name: "su".into(),
            bus: BusId::new(0),
            p_nom: 10.0,
            max_hours: 4.0,
            ..StorageUnit::default()
        });
        network.storage_units_t.state_of_charge_set.set(0, 1, 20.0);

        let mut m = LopfModel::new(&network, vec![0, 1, 2]);
        declare(&network, &mut m);

        // 3 recurrences + 1 pin.
        assert_eq!(m.model.n_cons(), 4);
    }
}

//! Store dispatch and energy declarations.
//!
//! Stores decouple power and energy: `store_p` is free, `store_e`
//! follows the recurrence `e[t] = (1 - standing_loss)^w[t] * e_prev
//! - w[t] * p[t]` with the same cyclic/initial policy as storage
//! units.

use lopf_core::Network;

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

pub(super) fn declare(network: &Network, m: &mut LopfModel) {
    let n = m.n_positions();
    let n_stores = network.stores.len();
    m.store_p = Vec::with_capacity(n_stores * n);
    m.store_e = Vec::with_capacity(n_stores * n);

    for (s, store) in network.stores.iter().enumerate() {
        for &sn in &m.snapshots {
            let p = m.model.add_var(
                format!("store_p({s},{sn})"),
                f64::NEG_INFINITY,
                f64::INFINITY,
            );
            m.store_p.push(p);

            let (lower, upper) = if store.e_nom_extendable {
                (f64::NEG_INFINITY, f64::INFINITY)
            } else {
                (
                    store.e_nom * store.e_min_pu_fixed,
                    store.e_nom * store.e_max_pu_fixed,
                )
            };
            let e = m
                .model
                .add_var(format!("store_e({s},{sn})"), lower, upper);
            m.store_e.push(e);
        }
    }

    for (s, store) in network.stores.iter().enumerate() {
        if !store.e_nom_extendable {
            continue;
        }
        let e_nom = m.model.add_var(
            format!("store_e_nom({s})"),
            store.e_nom_min,
            store.e_nom_max,
        );
        m.store_e_nom[s] = Some(e_nom);

        for (i, &sn) in m.snapshots.iter().enumerate() {
            let e = m.store_e[m.index(s, i)];

            let mut upper = LinExpr::term(1.0, e);
            upper.add_term(-store.e_max_pu_fixed, e_nom);
            m.model.add_constraint(
                format!("store_e_upper({s},{sn})"),
                upper,
                Sense::Leq,
                LinExpr::new(),
            );

            let mut lower = LinExpr::term(1.0, e);
            lower.add_term(-store.e_min_pu_fixed, e_nom);
            m.model.add_constraint(
                format!("store_e_lower({s},{sn})"),
                lower,
                Sense::Geq,
                LinExpr::new(),
            );
        }
    }

    // Energy recurrence.
    for (s, store) in network.stores.iter().enumerate() {
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            let decay = (1.0 - store.standing_loss).powf(w);

            let mut lhs = LinExpr::with_capacity(3);
            lhs.add_term(-1.0, m.store_e[m.index(s, i)]);

            if i == 0 && !store.e_cyclic {
                lhs.add_constant(decay * store.e_initial);
            } else {
                let prev = if i == 0 { n - 1 } else { i - 1 };
                lhs.add_term(decay, m.store_e[m.index(s, prev)]);
            }

            lhs.add_term(-w, m.store_p[m.index(s, i)]);

            m.model.add_constraint(
                format!("store_constraint({s},{sn})"),
                lhs,
                Sense::Eq,
                LinExpr::new(),
            );
        }
    }
}

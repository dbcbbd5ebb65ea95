//! Optional global CO2 emission cap.

use lopf_core::Network;

use crate::algebra::{LinExpr, Sense};

use super::LopfModel;

/// Cap total emissions over the solve window:
///
/// ```text
/// sum_g co2(carrier_g) / eff_g * w[t] * p[g,t]
/// + sum_s co2(carrier of bus_s) * w[t] * store_p[s,t]  <=  limit
/// ```
///
/// Generators emit through their prime-mover carrier; stores inherit
/// the carrier of their bus. Elements whose carrier has no emission
/// factor contribute nothing.
pub(super) fn declare_limit(network: &Network, m: &mut LopfModel) {
    let Some(limit) = network.co2_limit else {
        return;
    };

    let mut lhs = LinExpr::new();

    for (g, gen) in network.generators.iter().enumerate() {
        let Some(carrier) = network.carrier(&gen.carrier) else {
            continue;
        };
        if carrier.co2_emissions == 0.0 {
            continue;
        }
        let factor = carrier.co2_emissions / gen.efficiency;
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            lhs.add_term(factor * w, m.gen_p[m.index(g, i)]);
        }
    }

    for (s, store) in network.stores.iter().enumerate() {
        let bus_carrier = &network.buses[store.bus.value()].carrier;
        let Some(carrier) = network.carrier(bus_carrier) else {
            continue;
        };
        if carrier.co2_emissions == 0.0 {
            continue;
        }
        for (i, &sn) in m.snapshots.iter().enumerate() {
            let w = network.snapshot_weightings[sn];
            lhs.add_term(carrier.co2_emissions * w, m.store_p[m.index(s, i)]);
        }
    }

    m.model.add_constraint(
        "co2_constraint".to_string(),
        lhs,
        Sense::Leq,
        LinExpr::constant_expr(limit),
    );
}

//! Error types for the network data model and topology builder.

use thiserror::Error;

/// Errors raised while assembling or validating a [`crate::Network`].
#[derive(Debug, Error)]
pub enum NetworkError {
    /// An element references a bus that does not exist.
    #[error("{element} references unknown bus index {bus}")]
    UnknownBus { element: String, bus: usize },

    /// Snapshot weightings must be strictly positive.
    #[error("snapshot {snapshot} has non-positive weighting {weighting}")]
    NonPositiveWeighting { snapshot: usize, weighting: f64 },

    /// A generator names a carrier that was never registered.
    #[error("generator {generator} references unknown carrier {carrier:?}")]
    UnknownCarrier { generator: String, carrier: String },
}

/// Errors raised by sub-network discovery and matrix assembly.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A passive branch endpoint is outside the bus table.
    #[error("branch {branch} references unknown bus index {bus}")]
    UnknownBus { branch: String, bus: usize },

    /// AC and DC buses ended up in the same connected component.
    #[error("sub-network {sub_network} mixes carriers {first:?} and {second:?}")]
    MixedCarrier {
        sub_network: usize,
        first: String,
        second: String,
    },

    /// The impedance relevant for the sub-network carrier is zero.
    #[error("branch {0} has zero or near-zero impedance")]
    ZeroImpedance(String),

    /// The reduced susceptance matrix could not be factorized.
    #[error("sub-network {sub_network}: reduced susceptance matrix is singular")]
    SingularSusceptance { sub_network: usize },

    /// Topology has not been determined before it was needed.
    #[error("network topology has not been determined")]
    MissingTopology,
}

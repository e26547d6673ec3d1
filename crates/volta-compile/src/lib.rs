//! # volta-compile: Numerical Circuit Compilation
//!
//! Turns a device-level [`volta_core::Grid`] into the solver-ready
//! [`NumericalCircuit`]: positionally aligned per-unit arrays, sparse
//! incidence and admittance matrices in their three variants (full,
//! series/shunt split, fast-decoupled), and the PQ/PV/slack index sets.
//! It also detects and extracts electrical islands, post-processes a
//! solved voltage vector into branch flows, and serves the compiled
//! arrays as labeled diagnostic tables.
//!
//! This crate never solves anything. Solvers consume the compiled
//! snapshot and hand a voltage vector back to [`flows::post_process`].
//!
//! ## Pipeline
//!
//! ```text
//! Grid ──compile──▶ NumericalCircuit ──split_into_islands──▶ [NumericalCircuit]
//!                        │                                        │
//!                        ▼                                        ▼
//!                  get_structure                        solver ──▶ post_process
//! ```
//!
//! Degraded conditions (missing slack, blackout islands) accumulate in a
//! [`volta_core::Diagnostics`] value threaded through every call;
//! structural defects are hard [`volta_core::VoltaError`]s.

pub mod circuit;
pub mod connectivity;
pub mod flows;
pub mod indices;
pub mod islands;
pub mod matrices;
pub mod primitives;
pub mod structures;

pub use circuit::{CompileOptions, NumericalCircuit};
pub use connectivity::Connectivity;
pub use flows::{post_process, BranchFlows};
pub use indices::SimulationIndices;
pub use islands::{find_islands, IslandSplitOptions};
pub use matrices::{AdmittanceMatrices, FastDecoupled, SeriesAdmittances};
pub use primitives::{
    AdmittanceModel, BranchPrimitives, FdParams, PrimitiveOptions, SeriesTwoPort, ToleranceBand,
    TwoPort,
};
pub use structures::{jacobian_at, StructureType};

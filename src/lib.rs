//! Post-register-allocation lowering for a compiler backend.
//!
//! After registers have been assigned, two transformations make the graph
//! executable on a real machine:
//!
//! * [`lower_nodes_after_ra`] replaces every abstract permutation node with
//!   concrete copy and two-register exchange sequences, sinking independent
//!   neighbours past the permutation first where that shrinks it.
//! * [`assure_constraints`] materializes `must_differ` output requirements
//!   as unspillable copies plus keep edges, restoring SSA form afterwards.
//!
//! The IR lives in [`ir`]; liveness ([`analysis::Liveness`]) and SSA
//! reconstruction ([`ssa`]) are the collaborator services both passes lean
//! on.

pub mod analysis;
pub mod error;
pub mod ir;
pub mod lower;
pub mod ssa;

mod constraints;

pub use constraints::assure_constraints;
pub use error::LoweringError;
pub use lower::{lower_nodes_after_ra, push_through_perm, FreeRegs, LowerConfig};

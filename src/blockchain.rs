// Thin re-export module: implementation is in `blockchain/core.rs` so that
// encoding, validation and ledger state can evolve in separate files.

pub mod core;
pub use core::*;

// core.rs splits ledger responsibilities into submodules: the block codec,
// the target types, append validation and the ledger state itself.
pub mod chain;
pub mod state;
pub mod target;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use target::*;
pub use validation::*;

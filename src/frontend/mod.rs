//! Compiler front end: terms, equation sets and the DDA text format.

pub mod clean;
pub mod parser;
pub mod state;
pub mod symbol;

pub use state::EquationSet;
pub use symbol::{symbols, Arg, Atom, Number, Term};

/// How many underscores may be appended to a name before giving up on finding a free one.
pub const MAX_NAME_RETRIES: usize = 64;

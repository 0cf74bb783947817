//! Analyses over linearized equation sets.

pub mod ordering;
pub mod toposort;

pub use ordering::{classify, Category, Classification};
pub use toposort::{topological_sort, Sorted};

//! Contains pre-made implementations of the `Board` trait.

/// A two-agent coin race on a grid, with a matching heuristic.
pub mod grid_chase;

//! Monte Carlo tree search that collapses similar sibling states.
//!
//! When a node is expanded, all of its children are created at once and grouped by the
//! similarity of their heuristic signature vectors. Only one representative per group takes
//! part in UCT selection, and its visit statistics are copied to the rest of the group during
//! backpropagation. An action sampler biased toward novel representatives drives rollouts and
//! anneals back to uniform over a fixed number of iterations.
//!
//! # Example
//!
//! ```rust
//! use collapsing_mcts::boards::grid_chase::{GridChase, GridChaseHeuristic};
//! use collapsing_mcts::config::SearchConfig;
//! use collapsing_mcts::mcts::CollapsingMcts;
//! use collapsing_mcts::random::CustomNumberGenerator;
//!
//! let board = GridChase::default();
//!
//! // Create and configure a new search instance using the builder
//! let mut mcts = CollapsingMcts::builder(board.clone(), GridChaseHeuristic::default())
//!     .with_random_generator(CustomNumberGenerator::new(42))
//!     .with_config(SearchConfig::default().with_iterations(100))
//!     .build()
//!     .unwrap();
//!
//! let action = mcts.decide_action(&board).unwrap();
//! assert!(action < 5);
//! ```

/// Contains the `Board` trait and the `GameOutcome` enum that define the forward model.
pub mod board;
/// Contains pre-made implementations of the `Board` trait.
pub mod boards;
/// Search budgets and the tracker that enforces them.
pub mod budget;
/// Clustering of sibling states.
pub mod clustering;
/// Search configuration and its TOML loader.
pub mod config;
/// Distance metrics between signature vectors.
pub mod distance;
/// The `Heuristic` trait that scores states.
pub mod heuristic;
/// The core module of the library, containing the `CollapsingMcts` implementation.
pub mod mcts;
/// Contains the `MctsNode` struct, which represents a node in the search tree.
pub mod mcts_node;
/// Contains traits and implementations for random number generation.
pub mod random;
/// Annealed probability distribution over actions.
pub mod sampler;

pub use board::{Board, GameOutcome};
pub use config::{ConfigError, SearchConfig};
pub use heuristic::Heuristic;
pub use mcts::{CollapsingMcts, SearchError, SearchStats, decide_action};

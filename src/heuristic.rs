use crate::board::Board;

/// State evaluation plugged into the search.
///
/// Both methods must be pure functions of the state. The scalar is the rollout reward; the
/// vector is the signature used to decide which sibling states look alike.
pub trait Heuristic<B: Board> {
    /// Bounded utility of `state`, used as the rollout reward.
    fn evaluate_scalar(&self, state: &B) -> f64;

    /// Fixed-length vector of independent heuristic scores for `state`.
    fn evaluate_vector(&self, state: &B) -> Vec<f64>;

    /// The `(min, max)` range of [`Heuristic::evaluate_scalar`]. A terminal loss is scored as
    /// `min` and a terminal win as `max`.
    fn reward_bounds(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }
}

/// Euclidean norm of a signature vector.
pub fn euclidean_norm(vector: &[f64]) -> f64 {
    vector.iter().map(|v| v * v).sum::<f64>().sqrt()
}

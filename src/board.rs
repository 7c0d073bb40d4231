/// The forward model the search runs against.
///
/// Implementations own the game rules: the engine only clones states, applies action indices
/// and asks whether the game is over. Actions are indices into a small fixed action set of
/// size [`Board::action_count`].
pub trait Board: Clone {
    /// Size of the fixed action set. Every action index handed to the board is below this.
    fn action_count(&self) -> usize;

    /// Returns whether `action` may be applied to the current state.
    fn is_legal(&self, action: usize) -> bool {
        action < self.action_count()
    }

    /// Returns every legal action index in ascending order.
    fn legal_actions(&self) -> Vec<usize> {
        (0..self.action_count()).filter(|&a| self.is_legal(a)).collect()
    }

    /// Returns the number of legal actions in the current state.
    fn legal_action_count(&self) -> usize {
        self.legal_actions().len()
    }

    /// Applies the action to this state. The transition may be stochastic.
    fn perform_action(&mut self, action: usize);

    /// Returns whether the game is over.
    fn is_terminal(&self) -> bool {
        self.outcome() != GameOutcome::Ongoing
    }

    /// Returns the result of the game from the searching agent's point of view.
    fn outcome(&self) -> GameOutcome;
}

/// Represents the possible outcomes of a game, seen by the searching agent.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum GameOutcome {
    /// The game is still running.
    Ongoing = 0,
    /// The searching agent has won.
    Win = 1,
    /// The searching agent has lost.
    Loss = 2,
    /// The game ended without a winner.
    Tie = 3,
}

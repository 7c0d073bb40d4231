use crate::board::{Board, GameOutcome};
use crate::heuristic::Heuristic;

pub const STAY: usize = 0;
pub const UP: usize = 1;
pub const DOWN: usize = 2;
pub const LEFT: usize = 3;
pub const RIGHT: usize = 4;

/// A coin race on a small grid.
///
/// The searching agent and a scripted rival collect coins. Every action is always legal and
/// walking into a wall leaves the agent in place. After each agent move the rival steps
/// greedily toward its nearest coin. Reaching `target` coins first wins; when the coins run
/// out or `max_ticks` pass, the higher score wins.
#[derive(Debug, Clone, PartialEq)]
pub struct GridChase {
    width: usize,
    height: usize,
    agent: (usize, usize),
    rival: (usize, usize),
    coins: Vec<(usize, usize)>,
    agent_score: u32,
    rival_score: u32,
    target: u32,
    tick: u32,
    max_ticks: u32,
}

impl GridChase {
    /// An empty `width` × `height` grid with the agent in the top-left corner and the rival in
    /// the bottom-right one.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            agent: (0, 0),
            rival: (width - 1, height - 1),
            coins: Vec::new(),
            agent_score: 0,
            rival_score: 0,
            target: 1,
            tick: 0,
            max_ticks: 50,
        }
    }

    pub fn with_agent(mut self, x: usize, y: usize) -> Self {
        self.agent = self.clamp((x, y));
        self
    }

    pub fn with_rival(mut self, x: usize, y: usize) -> Self {
        self.rival = self.clamp((x, y));
        self
    }

    pub fn with_coin(mut self, x: usize, y: usize) -> Self {
        let cell = self.clamp((x, y));
        if !self.coins.contains(&cell) {
            self.coins.push(cell);
        }
        self
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target.max(1);
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn agent(&self) -> (usize, usize) {
        self.agent
    }

    pub fn rival(&self) -> (usize, usize) {
        self.rival
    }

    pub fn coins(&self) -> &[(usize, usize)] {
        &self.coins
    }

    /// `(agent, rival)` coin counts.
    pub fn scores(&self) -> (u32, u32) {
        (self.agent_score, self.rival_score)
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn max_distance(&self) -> usize {
        self.width + self.height - 2
    }

    /// Manhattan distance from `from` to the closest coin, with the coin's position.
    pub fn nearest_coin(&self, from: (usize, usize)) -> Option<(usize, (usize, usize))> {
        self.coins
            .iter()
            .map(|&coin| (manhattan(from, coin), coin))
            .min_by_key(|&(distance, _)| distance)
    }

    fn clamp(&self, (x, y): (usize, usize)) -> (usize, usize) {
        (x.min(self.width - 1), y.min(self.height - 1))
    }

    fn step(&self, (x, y): (usize, usize), action: usize) -> (usize, usize) {
        match action {
            UP => (x, y.saturating_sub(1)),
            DOWN => (x, (y + 1).min(self.height - 1)),
            LEFT => (x.saturating_sub(1), y),
            RIGHT => ((x + 1).min(self.width - 1), y),
            _ => (x, y),
        }
    }

    fn take_coin(&mut self, cell: (usize, usize)) -> bool {
        match self.coins.iter().position(|&c| c == cell) {
            Some(index) => {
                self.coins.remove(index);
                true
            }
            None => false,
        }
    }

    fn move_rival(&mut self) {
        let Some((_, (cx, cy))) = self.nearest_coin(self.rival) else {
            return;
        };
        let (rx, ry) = self.rival;
        let action = if rx < cx {
            RIGHT
        } else if rx > cx {
            LEFT
        } else if ry < cy {
            DOWN
        } else if ry > cy {
            UP
        } else {
            STAY
        };
        self.rival = self.step(self.rival, action);
        if self.take_coin(self.rival) {
            self.rival_score += 1;
        }
    }
}

impl Default for GridChase {
    /// A 7×7 grid with five coins and a target of three.
    fn default() -> Self {
        GridChase::new(7, 7)
            .with_coin(2, 1)
            .with_coin(5, 1)
            .with_coin(3, 3)
            .with_coin(1, 5)
            .with_coin(4, 6)
            .with_target(3)
            .with_max_ticks(40)
    }
}

impl Board for GridChase {
    fn action_count(&self) -> usize {
        5
    }

    fn perform_action(&mut self, action: usize) {
        if self.is_terminal() {
            return;
        }

        self.agent = self.step(self.agent, action);
        if self.take_coin(self.agent) {
            self.agent_score += 1;
        }
        if self.agent_score < self.target {
            self.move_rival();
        }
        self.tick += 1;
    }

    fn outcome(&self) -> GameOutcome {
        if self.agent_score >= self.target {
            return GameOutcome::Win;
        }
        if self.rival_score >= self.target {
            return GameOutcome::Loss;
        }
        if self.coins.is_empty() || self.tick >= self.max_ticks {
            return match self.agent_score.cmp(&self.rival_score) {
                std::cmp::Ordering::Greater => GameOutcome::Win,
                std::cmp::Ordering::Less => GameOutcome::Loss,
                std::cmp::Ordering::Equal => GameOutcome::Tie,
            };
        }
        GameOutcome::Ongoing
    }
}

/// Scores [`GridChase`] states for the searching agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridChaseHeuristic {
    /// Weight of the distance to the nearest coin in the scalar.
    pub proximity_weight: f64,
}

impl Default for GridChaseHeuristic {
    fn default() -> Self {
        Self { proximity_weight: 0.1 }
    }
}

impl Heuristic<GridChase> for GridChaseHeuristic {
    /// Score lead as a fraction of the target, minus a small penalty for being far from a coin.
    fn evaluate_scalar(&self, state: &GridChase) -> f64 {
        let (own, rival) = state.scores();
        let lead = (own as f64 - rival as f64) / state.target() as f64;
        let distance = state.nearest_coin(state.agent()).map_or(0, |(d, _)| d);
        let penalty = self.proximity_weight * distance as f64 / state.max_distance().max(1) as f64;
        (lead - penalty).clamp(-1.0, 1.0)
    }

    /// `[own score, rival score, -distance to nearest coin, coins left, distance to rival]`
    fn evaluate_vector(&self, state: &GridChase) -> Vec<f64> {
        let (own, rival) = state.scores();
        let distance = state.nearest_coin(state.agent()).map_or(0, |(d, _)| d);
        vec![
            own as f64,
            rival as f64,
            -(distance as f64),
            state.coins().len() as f64,
            manhattan(state.agent(), state.rival()) as f64,
        ]
    }
}

fn manhattan(a: (usize, usize), b: (usize, usize)) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

use ego_tree::NodeId;

use crate::board::Board;
use crate::clustering::{Cluster, StateClusterer};

/// Represents a single node in the Monte Carlo search tree.
///
/// Each node stores a snapshot of the game state, the statistics backed up through it and,
/// once expanded under collapsing search, how its children were grouped.
#[derive(Debug, Clone)]
pub struct MctsNode<B: Board> {
    /// The game state this node was created with.
    pub board: B,
    /// The depth of the node below the root.
    pub depth: usize,
    /// The action that led here from the parent. `None` for the root.
    pub action: Option<usize>,
    /// Number of rollouts attributed to this node, including ones copied from a cluster
    /// representative.
    pub visits: u32,
    /// Sum of the rewards attributed to this node.
    pub total_value: f64,
    /// Smallest reward backed up through this node.
    pub lo: f64,
    /// Largest reward backed up through this node.
    pub hi: f64,
    /// One slot per action of the action set, filled on expansion.
    pub children: Vec<Option<NodeId>>,
    /// Legal actions of `board`.
    pub legal_actions: Vec<usize>,
    /// Heuristic signature of `board`. Empty unless collapsing.
    pub signature: Vec<f64>,
    /// Clusterer for this node's children. `None` unless collapsing.
    pub clusterer: Option<StateClusterer>,
    /// Non-empty clusters of children; member `child` values are action indices.
    pub clusters: Vec<Cluster>,
    /// Representative child action of each cluster, aligned with `clusters`.
    pub representatives: Vec<usize>,
    /// Cluster index of each child action.
    pub child_clusters: Vec<Option<usize>>,
}

impl<B: Board> MctsNode<B> {
    /// Creates an unvisited node for `board`.
    pub fn new(board: B, depth: usize, action: Option<usize>) -> Self {
        let action_count = board.action_count();
        let legal_actions = board.legal_actions();
        MctsNode {
            board,
            depth,
            action,
            visits: 0,
            total_value: 0.0,
            lo: f64::INFINITY,
            hi: f64::NEG_INFINITY,
            children: vec![None; action_count],
            legal_actions,
            signature: Vec::new(),
            clusterer: None,
            clusters: Vec::new(),
            representatives: Vec::new(),
            child_clusters: vec![None; action_count],
        }
    }

    /// Attaches the collapsing-mode data: this node's signature and its clusterer.
    pub fn with_clustering(mut self, signature: Vec<f64>, clusterer: StateClusterer) -> Self {
        self.signature = signature;
        self.clusterer = Some(clusterer);
        self
    }

    /// Average reward, or 0 before the first visit.
    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / self.visits as f64
        }
    }

    /// Widens the observed reward bounds to include `reward`.
    pub fn observe(&mut self, reward: f64) {
        self.lo = self.lo.min(reward);
        self.hi = self.hi.max(reward);
    }

    /// Whether any reward has been backed up through this node.
    pub fn has_bounds(&self) -> bool {
        self.lo <= self.hi
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.legal_actions.iter().all(|&a| self.children[a].is_some())
    }

    pub fn unexplored_actions(&self) -> Vec<usize> {
        self.legal_actions
            .iter()
            .copied()
            .filter(|&a| self.children[a].is_none())
            .collect()
    }

    /// Expanded children as `(action, node)` pairs, in action order.
    pub fn expanded_children(&self) -> Vec<(usize, NodeId)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(a, slot)| slot.map(|id| (a, id)))
            .collect()
    }

    pub fn is_expanded(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    pub fn is_representative(&self, action: usize) -> bool {
        self.representatives.contains(&action)
    }

    pub fn cluster_of(&self, action: usize) -> Option<&Cluster> {
        self.child_clusters
            .get(action)
            .copied()
            .flatten()
            .and_then(|c| self.clusters.get(c))
    }

    /// Stores the clustering of this node's children, dropping empty clusters.
    ///
    /// `clusters` must use action indices as member `child` values.
    pub fn set_clusters(&mut self, clusters: Vec<Cluster>) {
        self.clusters = clusters.into_iter().filter(|c| !c.is_empty()).collect();
        self.child_clusters.iter_mut().for_each(|c| *c = None);
        self.representatives.clear();
        for (index, cluster) in self.clusters.iter().enumerate() {
            for member in &cluster.members {
                self.child_clusters[member.child] = Some(index);
            }
            if let Some(representative) = cluster.representative() {
                self.representatives.push(representative.child);
            }
        }
    }
}

/// Maps `value` into `[0, 1]` using `[lo, hi]`. Left unchanged when the range is empty.
pub fn normalise(value: f64, lo: f64, hi: f64) -> f64 {
    if lo < hi { (value - lo) / (hi - lo) } else { value }
}

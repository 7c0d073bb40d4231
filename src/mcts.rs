use std::collections::BTreeMap;
use std::time::Duration;

use ego_tree::{NodeId, NodeMut, NodeRef, Tree};
use thiserror::Error;
use tracing::{debug, trace};

use crate::board::{Board, GameOutcome};
use crate::budget::BudgetTracker;
use crate::clustering::{Cluster, ClusterMember, ClusteringError, Clusterer, StateClusterer};
use crate::config::{ConfigError, SearchConfig};
use crate::heuristic::{Heuristic, euclidean_norm};
use crate::mcts_node::{MctsNode, normalise};
use crate::random::{RandomGenerator, StandardRandomGenerator};
use crate::sampler::{ProbabilitySampler, SamplerError};

/// Errors that can abort a search call.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Clustering failed: {0}")]
    Clustering(#[from] ClusteringError),

    #[error("Action sampler error: {0}")]
    Sampler(#[from] SamplerError),

    #[error("UCT found no child to select (visits {visits}, bounds [{lo}, {hi}])")]
    NoRepresentatives { visits: u32, lo: f64, hi: f64 },

    #[error("Action {0} has no expanded child")]
    MissingChild(usize),

    #[error("Node {0:?} is not part of the search tree")]
    DetachedNode(NodeId),

    #[error("The root state is terminal")]
    TerminalRoot,

    #[error("The root state has no legal actions")]
    NoLegalActions,
}

/// Counters of the last completed search call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStats {
    pub iterations: u32,
    pub forward_model_calls: u64,
    pub elapsed: Duration,
    pub tree_size: usize,
}

/// Collapsing Monte Carlo tree search.
///
/// Expansion creates every child of a node at once, clusters the children by their
/// heuristic signatures and lets one representative per cluster stand in for the rest:
/// selection only looks at representatives and backpropagation copies each
/// representative's statistics onto its cluster siblings. With collapsing disabled in the
/// config the same engine runs plain UCT.
pub struct CollapsingMcts<B: Board, H: Heuristic<B>, K: RandomGenerator> {
    tree: Tree<MctsNode<B>>,
    heuristic: H,
    random: K,
    config: SearchConfig,
    sampler: ProbabilitySampler<usize>,
    last_stats: SearchStats,
}

/// A builder for creating instances of [`CollapsingMcts`].
pub struct CollapsingMctsBuilder<B: Board, H: Heuristic<B>, K: RandomGenerator> {
    board: B,
    heuristic: H,
    random_generator: K,
    config: SearchConfig,
}

impl<B: Board, H: Heuristic<B>, K: RandomGenerator> CollapsingMctsBuilder<B, H, K> {
    /// Creates a new builder with the given initial board state and heuristic.
    pub fn new(board: B, heuristic: H) -> Self {
        Self {
            board,
            heuristic,
            random_generator: K::default(),
            config: SearchConfig::default(),
        }
    }

    /// Sets the random number generator for the search.
    pub fn with_random_generator(mut self, rg: K) -> Self {
        self.random_generator = rg;
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and builds the engine.
    pub fn build(self) -> Result<CollapsingMcts<B, H, K>, SearchError> {
        CollapsingMcts::new(self.board, self.heuristic, self.random_generator, self.config)
    }
}

impl<B: Board, H: Heuristic<B>, K: RandomGenerator> CollapsingMcts<B, H, K> {
    /// Returns a new builder for `CollapsingMcts`.
    pub fn builder(board: B, heuristic: H) -> CollapsingMctsBuilder<B, H, K> {
        CollapsingMctsBuilder::new(board, heuristic)
    }

    /// Creates a new engine rooted at `board`.
    ///
    /// Fails if the configuration is invalid or the board has an empty action set.
    pub fn new(board: B, heuristic: H, random: K, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let sampler = ProbabilitySampler::uniform(0..board.action_count(), config.anneal_horizon)?;
        let root = Self::make_node(&config, &heuristic, board, 0, None);

        Ok(Self {
            tree: Tree::new(root),
            heuristic,
            random,
            config,
            sampler,
            last_stats: SearchStats::default(),
        })
    }

    pub fn get_tree(&self) -> &Tree<MctsNode<B>> {
        &self.tree
    }

    pub fn get_root(&self) -> NodeRef<'_, MctsNode<B>> {
        self.tree.root()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn sampler(&self) -> &ProbabilitySampler<usize> {
        &self.sampler
    }

    pub fn last_stats(&self) -> &SearchStats {
        &self.last_stats
    }

    /// Number of nodes reachable from the root.
    pub fn tree_size(&self) -> usize {
        self.tree.root().descendants().count()
    }

    /// Searches from `state` until the budget runs out and returns the chosen action.
    ///
    /// With tree reuse enabled, the most visited subtree of the previous decision becomes
    /// the new root; otherwise the search starts from a fresh tree.
    pub fn decide_action(&mut self, state: &B) -> Result<usize, SearchError> {
        if state.is_terminal() {
            return Err(SearchError::TerminalRoot);
        }
        if state.legal_action_count() == 0 {
            return Err(SearchError::NoLegalActions);
        }

        self.set_root(state)?;
        let stats = self.search()?;
        let action = self.best_action()?;
        debug!(
            action,
            iterations = stats.iterations,
            tree_size = stats.tree_size,
            root_visits = self.tree.root().value().visits,
            "decided action"
        );
        Ok(action)
    }

    /// Runs iterations until the configured budget is exhausted. At least one iteration runs.
    pub fn search(&mut self) -> Result<SearchStats, SearchError> {
        let mut tracker = BudgetTracker::start(
            self.config.budget,
            self.config.rollout_depth,
            Duration::from_millis(self.config.time_margin_millis),
        );

        loop {
            self.do_iteration()?;
            tracker.record_iteration();
            if tracker.is_exhausted() {
                break;
            }
        }

        self.last_stats = SearchStats {
            iterations: tracker.iterations(),
            forward_model_calls: tracker.forward_model_calls(),
            elapsed: tracker.elapsed(),
            tree_size: self.tree_size(),
        };
        Ok(self.last_stats.clone())
    }

    /// Performs one full iteration: selection and expansion, rollout, backpropagation.
    /// Returns the path of nodes that were updated during backpropagation, leaf first.
    pub fn do_iteration(&mut self) -> Result<Vec<NodeId>, SearchError> {
        let root_id = self.tree.root().id();
        let mut state = self.tree.root().value().board.clone();

        let selected = self.tree_policy(root_id, &mut state)?;
        let reward = self.roll_out(selected, &mut state)?;
        let branch = self.backpropagate(selected, reward)?;

        if self.config.collapsing {
            self.sampler.advance_toward_uniform();
        }
        trace!(reward, path_len = branch.len(), "iteration complete");
        Ok(branch)
    }

    /// Runs exactly `n` iterations, ignoring the configured budget.
    pub fn iterate_n_times(&mut self, n: u32) -> Result<(), SearchError> {
        for _ in 0..n {
            self.do_iteration()?;
        }
        Ok(())
    }

    /// The root action whose child has the most visits, counting statistics copied from a
    /// cluster representative. Ties go to the higher mean value, then to a representative,
    /// then to the lowest action index.
    pub fn best_action(&self) -> Result<usize, SearchError> {
        let root = self.tree.root().value();
        let mut best: Option<(usize, &MctsNode<B>)> = None;

        for (action, child_id) in root.expanded_children() {
            let child = node_value(&self.tree, child_id)?;
            let better = match best {
                None => true,
                Some((best_action, incumbent)) => {
                    if child.visits != incumbent.visits {
                        child.visits > incumbent.visits
                    } else if child.mean_value() != incumbent.mean_value() {
                        child.mean_value() > incumbent.mean_value()
                    } else {
                        root.is_representative(action) && !root.is_representative(best_action)
                    }
                }
            };
            if better {
                best = Some((action, child));
            }
        }

        best.map(|(action, _)| action).ok_or(if root.board.is_terminal() {
            SearchError::TerminalRoot
        } else {
            SearchError::NoLegalActions
        })
    }

    fn make_node(config: &SearchConfig, heuristic: &H, board: B, depth: usize, action: Option<usize>) -> MctsNode<B> {
        let node = MctsNode::new(board, depth, action);
        if !config.collapsing {
            return node;
        }
        let signature = heuristic.evaluate_vector(&node.board);
        let clusterer = StateClusterer::for_node(config, node.legal_actions.len());
        node.with_clustering(signature, clusterer)
    }

    fn set_root(&mut self, state: &B) -> Result<(), SearchError> {
        let reused = if self.config.reuse_tree {
            self.most_visited_subtree(state)
        } else {
            None
        };
        let Some(tree) = reused else {
            self.tree = Tree::new(Self::make_node(&self.config, &self.heuristic, state.clone(), 0, None));
            return Ok(());
        };

        self.tree = tree;
        // The kept children were grouped under the old legal set.
        let root_id = self.tree.root().id();
        self.cluster_children(root_id)
    }

    /// Copies the most visited child's subtree into a new arena rooted at `state`.
    ///
    /// Children whose action is illegal in `state` are left behind and the root's old
    /// clustering is discarded.
    fn most_visited_subtree(&self, state: &B) -> Option<Tree<MctsNode<B>>> {
        let action = self.best_action().ok()?;
        let child = self.tree.get(self.tree.root().value().children[action]?)?;
        let offset = child.value().depth;

        let mut root = rebased(child.value(), offset);
        root.board = state.clone();
        root.action = None;
        root.legal_actions = state.legal_actions();
        root.set_clusters(Vec::new());
        if self.config.collapsing {
            root.signature = self.heuristic.evaluate_vector(state);
        }

        let mut tree = Tree::new(root);
        for grandchild in child.children() {
            if grandchild.value().action.is_some_and(|a| state.is_legal(a)) {
                graft(grandchild, &mut tree.root_mut(), offset);
            }
        }
        trace!(action, kept = tree.root().descendants().count(), "reusing subtree");
        Some(tree)
    }

    /// Descends from `start` until a terminal state, the depth limit, or a node that still
    /// has unexplored actions. Collapsing search expands all of that node's children and
    /// returns the selected representative; plain UCT expands a single child.
    fn tree_policy(&mut self, start: NodeId, state: &mut B) -> Result<NodeId, SearchError> {
        let mut current = start;
        loop {
            let (depth, fully_expanded) = {
                let node = node_value(&self.tree, current)?;
                (node.depth, node.is_fully_expanded())
            };
            if state.is_terminal() || depth >= self.config.rollout_depth {
                return Ok(current);
            }

            if !fully_expanded {
                if self.config.collapsing {
                    self.expand_all(current, state)?;
                    return self.select_child(current, state);
                }
                return self.expand_one(current, state);
            }
            current = self.select_child(current, state)?;
        }
    }

    fn expand_all(&mut self, parent: NodeId, state: &B) -> Result<(), SearchError> {
        let (depth, pending) = {
            let node = node_value(&self.tree, parent)?;
            (node.depth + 1, node.unexplored_actions())
        };

        for action in pending {
            let mut board = state.clone();
            board.perform_action(action);
            let child = Self::make_node(&self.config, &self.heuristic, board, depth, Some(action));
            self.attach(parent, action, child)?;
        }

        self.cluster_children(parent)?;
        self.reweight_sampler(parent)
    }

    fn expand_one(&mut self, parent: NodeId, state: &mut B) -> Result<NodeId, SearchError> {
        let (depth, pending) = {
            let node = node_value(&self.tree, parent)?;
            (node.depth + 1, node.unexplored_actions())
        };
        let action = *self
            .random
            .get_random_from_slice(&pending)
            .ok_or(SearchError::NoLegalActions)?;

        state.perform_action(action);
        let child = Self::make_node(&self.config, &self.heuristic, state.clone(), depth, Some(action));
        self.attach(parent, action, child)
    }

    fn attach(&mut self, parent: NodeId, action: usize, child: MctsNode<B>) -> Result<NodeId, SearchError> {
        let mut parent_node = self.tree.get_mut(parent).ok_or(SearchError::DetachedNode(parent))?;
        let child_id = parent_node.append(child).id();
        parent_node.value().children[action] = Some(child_id);
        Ok(child_id)
    }

    /// Partitions the expanded children of `parent` and records representatives.
    fn cluster_children(&mut self, parent: NodeId) -> Result<(), SearchError> {
        let clusters = {
            let node = node_value(&self.tree, parent)?;
            let Some(clusterer) = &node.clusterer else {
                return Ok(());
            };

            let mut actions = Vec::new();
            let mut vectors = Vec::new();
            for (action, child_id) in node.expanded_children() {
                actions.push(action);
                vectors.push(node_value(&self.tree, child_id)?.signature.clone());
            }
            if vectors.is_empty() {
                return Ok(());
            }

            clusterer
                .generate_clusters(&vectors, &mut self.random)?
                .into_iter()
                .map(|cluster| Cluster {
                    members: cluster
                        .members
                        .into_iter()
                        .map(|m| ClusterMember {
                            child: actions[m.child],
                            signature: m.signature,
                        })
                        .collect(),
                })
                .collect::<Vec<_>>()
        };

        let mut node = self.tree.get_mut(parent).ok_or(SearchError::DetachedNode(parent))?;
        let stats = node.value();
        stats.set_clusters(clusters);
        trace!(
            clusters = stats.clusters.len(),
            representatives = ?stats.representatives,
            "collapsed children"
        );
        Ok(())
    }

    /// Biases the action sampler toward children whose signatures outgrow the parent's.
    ///
    /// Every action keeps a key; actions without a child here get a neutral score of zero.
    fn reweight_sampler(&mut self, parent: NodeId) -> Result<(), SearchError> {
        let node = node_value(&self.tree, parent)?;
        if !node.is_expanded() {
            return Ok(());
        }
        let own_norm = euclidean_norm(&node.signature);

        let mut novelty = BTreeMap::new();
        for (action, slot) in node.children.iter().enumerate() {
            let score = match slot {
                Some(child_id) => euclidean_norm(&node_value(&self.tree, *child_id)?.signature) - own_norm,
                None => 0.0,
            };
            novelty.insert(action, score);
        }
        self.sampler.update_weights(novelty)?;
        Ok(())
    }

    /// UCT over the representatives of `parent` (every expanded child when not collapsing).
    /// Advances `state` by the chosen action.
    fn select_child(&mut self, parent: NodeId, state: &mut B) -> Result<NodeId, SearchError> {
        let node = node_value(&self.tree, parent)?;
        let candidates: Vec<usize> = if self.config.collapsing {
            node.representatives.clone()
        } else {
            node.expanded_children().into_iter().map(|(a, _)| a).collect()
        };

        let epsilon = self.config.epsilon;
        let log_visits = (node.visits as f64 + 1.0).ln();
        let mut selected: Option<(usize, NodeId)> = None;
        let mut best_value = f64::NEG_INFINITY;

        for action in candidates {
            let child_id = node.children[action].ok_or(SearchError::MissingChild(action))?;
            let child = node_value(&self.tree, child_id)?;
            let visits = child.visits as f64;

            let exploit = normalise(child.total_value / (visits + epsilon), node.lo, node.hi);
            let explore = (log_visits / (visits + epsilon)).sqrt();
            let mut uct_value = exploit + self.config.exploration * explore;
            // Break ties at random.
            uct_value += epsilon * (2.0 * self.random.next_f64() - 1.0);

            if uct_value > best_value {
                best_value = uct_value;
                selected = Some((action, child_id));
            }
        }

        let (action, child_id) = selected.ok_or(SearchError::NoRepresentatives {
            visits: node.visits,
            lo: node.lo,
            hi: node.hi,
        })?;
        state.perform_action(action);
        Ok(child_id)
    }

    /// Plays from `state` until it is terminal or the depth limit is reached, then scores it.
    fn roll_out(&mut self, from: NodeId, state: &mut B) -> Result<f64, SearchError> {
        let mut depth = node_value(&self.tree, from)?.depth;
        let sampled = self.config.collapsing && self.config.sampled_rollouts;

        while !state.is_terminal() && depth < self.config.rollout_depth {
            let legal = state.legal_actions();
            let action = if sampled {
                self.sampler.sample_masked(&mut self.random, |a| legal.contains(a))
            } else {
                None
            };
            let Some(action) = action.or_else(|| self.random.get_random_from_slice(&legal).copied()) else {
                break;
            };
            state.perform_action(action);
            depth += 1;
        }

        Ok(self.evaluate(state))
    }

    fn evaluate(&self, state: &B) -> f64 {
        let (min, max) = self.heuristic.reward_bounds();
        match state.outcome() {
            GameOutcome::Loss => min,
            GameOutcome::Win => max,
            GameOutcome::Tie | GameOutcome::Ongoing => self.heuristic.evaluate_scalar(state),
        }
    }

    /// Propagates the result of a rollout back up the tree, updating node statistics.
    fn backpropagate(&mut self, from: NodeId, reward: f64) -> Result<Vec<NodeId>, SearchError> {
        let mut branch = Vec::new();
        let mut current = Some(from);

        while let Some(id) = current {
            {
                let mut node = self.tree.get_mut(id).ok_or(SearchError::DetachedNode(id))?;
                let stats = node.value();
                stats.visits += 1;
                stats.total_value += reward;
                stats.observe(reward);
            }
            self.share_cluster_statistics(id)?;
            branch.push(id);
            current = self.tree.get(id).and_then(|n| n.parent()).map(|p| p.id());
        }

        Ok(branch)
    }

    /// Overwrites every cluster member's visits and value with its representative's.
    fn share_cluster_statistics(&mut self, id: NodeId) -> Result<(), SearchError> {
        let mut copies = Vec::new();
        {
            let node = node_value(&self.tree, id)?;
            for (cluster, &representative) in node.clusters.iter().zip(&node.representatives) {
                let rep_id = node.children[representative].ok_or(SearchError::MissingChild(representative))?;
                let rep = node_value(&self.tree, rep_id)?;
                for member in cluster.members.iter().filter(|m| m.child != representative) {
                    let member_id = node.children[member.child].ok_or(SearchError::MissingChild(member.child))?;
                    copies.push((member_id, rep.visits, rep.total_value));
                }
            }
        }

        for (member_id, visits, total_value) in copies {
            let mut member = self.tree.get_mut(member_id).ok_or(SearchError::DetachedNode(member_id))?;
            let stats = member.value();
            stats.visits = visits;
            stats.total_value = total_value;
        }
        Ok(())
    }
}

impl<B: Board, H: Heuristic<B>> CollapsingMcts<B, H, StandardRandomGenerator> {
    pub fn from_board(board: B, heuristic: H, config: SearchConfig) -> Result<Self, SearchError> {
        CollapsingMctsBuilder::new(board, heuristic).with_config(config).build()
    }
}

/// Runs one search from `state` with a fresh engine and returns the chosen action.
///
/// Deterministic for a given state, configuration and generator state.
pub fn decide_action<B, H, K>(state: &B, heuristic: H, config: SearchConfig, random: K) -> Result<usize, SearchError>
where
    B: Board,
    H: Heuristic<B>,
    K: RandomGenerator,
{
    CollapsingMcts::new(state.clone(), heuristic, random, config)?.decide_action(state)
}

fn node_value<B: Board>(tree: &Tree<MctsNode<B>>, id: NodeId) -> Result<&MctsNode<B>, SearchError> {
    tree.get(id).map(|n| n.value()).ok_or(SearchError::DetachedNode(id))
}

/// Clone of `node` with its depth shifted up by `offset` and no child links.
fn rebased<B: Board>(node: &MctsNode<B>, offset: usize) -> MctsNode<B> {
    let mut copy = node.clone();
    copy.depth -= offset;
    copy.children.iter_mut().for_each(|slot| *slot = None);
    copy
}

/// Appends a rebased copy of `source` and its whole subtree under `target`.
fn graft<B: Board>(source: NodeRef<'_, MctsNode<B>>, target: &mut NodeMut<'_, MctsNode<B>>, offset: usize) {
    let Some(action) = source.value().action else {
        return;
    };
    let copy_id = {
        let mut copy = target.append(rebased(source.value(), offset));
        for child in source.children() {
            graft(child, &mut copy, offset);
        }
        copy.id()
    };
    target.value().children[action] = Some(copy_id);
}

use assert_matches::assert_matches;
use ego_tree::NodeId;

use collapsing_mcts::board::{Board, GameOutcome};
use collapsing_mcts::boards::grid_chase::{GridChase, GridChaseHeuristic, RIGHT};
use collapsing_mcts::budget::Budget;
use collapsing_mcts::clustering::ClusteringAlgorithm;
use collapsing_mcts::config::{ConfigError, SearchConfig};
use collapsing_mcts::distance::DistanceMetric;
use collapsing_mcts::heuristic::Heuristic;
use collapsing_mcts::mcts::{CollapsingMcts, SearchError, decide_action};
use collapsing_mcts::random::{CustomNumberGenerator, StandardRandomGenerator};

/// A one-dimensional walk to position 6 where some actions are only legal in some places.
#[derive(Debug, Clone)]
struct Corridor {
    position: usize,
    steps: u32,
}

impl Corridor {
    const GOAL: usize = 6;
}

impl Board for Corridor {
    fn action_count(&self) -> usize {
        4
    }

    fn is_legal(&self, action: usize) -> bool {
        match action {
            0 => self.position > 0,
            1 => self.position < Self::GOAL,
            2 => true,
            3 => self.position % 2 == 0 && self.position + 2 <= Self::GOAL,
            _ => false,
        }
    }

    fn perform_action(&mut self, action: usize) {
        match action {
            0 => self.position -= 1,
            1 => self.position += 1,
            3 => self.position += 2,
            _ => {}
        }
        self.steps += 1;
    }

    fn outcome(&self) -> GameOutcome {
        if self.position == Self::GOAL {
            GameOutcome::Win
        } else if self.steps >= 10 {
            GameOutcome::Loss
        } else {
            GameOutcome::Ongoing
        }
    }
}

struct CorridorHeuristic;

impl Heuristic<Corridor> for CorridorHeuristic {
    fn evaluate_scalar(&self, state: &Corridor) -> f64 {
        state.position as f64 / Corridor::GOAL as f64 * 2.0 - 1.0
    }

    fn evaluate_vector(&self, state: &Corridor) -> Vec<f64> {
        vec![state.position as f64, state.steps as f64]
    }
}

fn engine(
    board: &GridChase,
    config: SearchConfig,
    seed: u64,
) -> CollapsingMcts<GridChase, GridChaseHeuristic, StandardRandomGenerator> {
    CollapsingMcts::builder(board.clone(), GridChaseHeuristic::default())
        .with_random_generator(StandardRandomGenerator::seeded(seed))
        .with_config(config)
        .build()
        .unwrap()
}

fn root_child_visits<K: collapsing_mcts::random::RandomGenerator>(
    mcts: &CollapsingMcts<GridChase, GridChaseHeuristic, K>,
) -> Vec<(usize, u32)> {
    let tree = mcts.get_tree();
    mcts.get_root()
        .value()
        .expanded_children()
        .into_iter()
        .map(|(action, id)| (action, tree.get(id).unwrap().value().visits))
        .collect()
}

#[test]
fn decided_action_is_in_the_action_set() {
    // arrange
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::for_testing(), 1);

    // act
    let action = mcts.decide_action(&board).unwrap();

    // assert
    assert!(action < board.action_count());
    assert_eq!(mcts.last_stats().iterations, 50);
}

#[test]
fn same_seed_gives_same_search() {
    let board = GridChase::default();
    let config = SearchConfig::default().with_iterations(120);
    let mut first = engine(&board, config.clone(), 11);
    let mut second = engine(&board, config, 11);

    let a = first.decide_action(&board).unwrap();
    let b = second.decide_action(&board).unwrap();

    assert_eq!(a, b);
    assert_eq!(root_child_visits(&first), root_child_visits(&second));
    assert_eq!(first.tree_size(), second.tree_size());
}

#[test]
fn single_iteration_expands_root_and_shares_its_result() {
    // arrange
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::default().with_iterations(1), 3);

    // act
    mcts.decide_action(&board).unwrap();

    // assert
    let root = mcts.get_root().value();
    assert_eq!(root.visits, 1);
    assert_eq!(mcts.tree_size(), 1 + board.legal_action_count());
    // Five legal actions at a ratio of 0.25 make one cluster.
    assert_eq!(root.clusters.len(), 1);
    assert_eq!(root.representatives.len(), 1);
    for (_, id) in root.expanded_children() {
        let child = mcts.get_tree().get(id).unwrap().value();
        assert_eq!(child.visits, 1);
        assert_eq!(child.total_value, root.total_value);
    }
}

#[test]
fn cluster_members_mirror_their_representative() {
    let board = GridChase::default();
    let config = SearchConfig::default().with_iterations(200).with_cluster_ratio(0.6);
    let mut mcts = engine(&board, config, 5);

    mcts.decide_action(&board).unwrap();

    let tree = mcts.get_tree();
    for node in tree.root().descendants() {
        let node = node.value();
        for (cluster, &representative) in node.clusters.iter().zip(&node.representatives) {
            let rep = tree.get(node.children[representative].unwrap()).unwrap().value();
            for member in &cluster.members {
                let child = tree.get(node.children[member.child].unwrap()).unwrap().value();
                assert_eq!(child.visits, rep.visits);
                assert_eq!(child.total_value, rep.total_value);
            }
        }
    }
}

#[test]
fn vanilla_visits_add_up_and_find_the_winning_move() {
    // arrange
    let board = GridChase::new(5, 5).with_coin(1, 0);
    let mut mcts = engine(&board, SearchConfig::vanilla().with_iterations(300), 8);

    // act
    let action = mcts.decide_action(&board).unwrap();

    // assert
    assert_eq!(action, RIGHT);
    let root = mcts.get_root().value();
    let total: u32 = root_child_visits(&mcts).iter().map(|(_, v)| v).sum();
    assert_eq!(root.visits, total);
    assert_eq!(root.visits, 300);
    assert!(root.clusters.is_empty());
}

#[test]
fn reward_bounds_enclose_every_mean() {
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::default().with_iterations(150), 21);

    mcts.decide_action(&board).unwrap();

    for node in mcts.get_tree().root().descendants() {
        let node = node.value();
        if node.has_bounds() {
            assert!(-1.0 <= node.lo && node.hi <= 1.0);
        }
    }
    let root = mcts.get_root().value();
    assert!(root.lo <= root.mean_value() && root.mean_value() <= root.hi);
}

#[test]
fn every_node_on_a_path_bounds_the_reward_it_received() {
    // arrange
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::default(), 17);
    let iterations = 120;

    for _ in 0..iterations {
        let totals: Vec<(NodeId, f64)> = mcts
            .get_tree()
            .root()
            .descendants()
            .map(|n| (n.id(), n.value().total_value))
            .collect();

        // act
        let path = mcts.do_iteration().unwrap();

        // assert
        let tree = mcts.get_tree();
        let leaf = path[0];
        let before = totals.iter().find(|(id, _)| *id == leaf).map_or(0.0, |(_, t)| *t);
        let reward = tree.get(leaf).unwrap().value().total_value - before;
        assert_eq!(*path.last().unwrap(), tree.root().id());
        for id in &path {
            let node = tree.get(*id).unwrap().value();
            assert!(node.lo <= reward + 1e-9, "lo {} above reward {reward}", node.lo);
            assert!(reward - 1e-9 <= node.hi, "hi {} below reward {reward}", node.hi);
        }
    }

    assert_eq!(mcts.get_root().value().visits, iterations);
}

#[test]
fn illegal_actions_are_never_expanded_or_chosen() {
    // arrange
    let board = Corridor { position: 0, steps: 0 };
    let config = SearchConfig::default().with_iterations(100).with_rollout_depth(6);
    let mut mcts = CollapsingMcts::builder(board.clone(), CorridorHeuristic)
        .with_random_generator(CustomNumberGenerator::new(9))
        .with_config(config)
        .build()
        .unwrap();

    // act
    let action = mcts.decide_action(&board).unwrap();

    // assert
    assert!(board.is_legal(action));
    for node in mcts.get_tree().root().descendants() {
        let value = node.value();
        for (child_action, _) in value.expanded_children() {
            assert!(value.board.is_legal(child_action));
        }
        if let Some(parent) = node.parent() {
            assert_eq!(parent.value().depth + 1, value.depth);
        }
    }
}

#[test]
fn density_clustering_runs_end_to_end() {
    let board = GridChase::default();
    let config = SearchConfig::default()
        .with_iterations(80)
        .with_distance(DistanceMetric::Manhattan)
        .with_algorithm(ClusteringAlgorithm::Dbscan {
            min_points: 2,
            radius: 0.5,
        });
    let mut mcts = engine(&board, config, 4);

    let action = mcts.decide_action(&board).unwrap();

    assert!(action < 5);
    let root = mcts.get_root().value();
    let clustered: usize = root.clusters.iter().map(|c| c.len()).sum();
    assert_eq!(clustered, board.legal_action_count());
}

#[test]
fn reused_tree_keeps_statistics_and_rebases_depths() {
    // arrange
    let mut board = GridChase::default();
    let config = SearchConfig::default().with_iterations(60).with_tree_reuse(true);
    let mut mcts = engine(&board, config, 13);
    let first = mcts.decide_action(&board).unwrap();
    board.perform_action(first);

    // act
    mcts.decide_action(&board).unwrap();

    // assert
    let tree = mcts.get_tree();
    let root = mcts.get_root();
    assert!(root.value().visits > 60);
    assert_eq!(root.value().depth, 0);
    assert_eq!(root.value().action, None);
    for node in root.descendants().skip(1) {
        let parent = node.parent().unwrap();
        assert_eq!(parent.value().depth + 1, node.value().depth);
        let action = node.value().action.unwrap();
        assert_eq!(parent.value().children[action], Some(node.id()));
    }
    assert_eq!(tree.root().value().board, board);
}

#[test]
fn forward_model_budget_limits_iterations() {
    let board = GridChase::default();
    let config = SearchConfig::default()
        .with_rollout_depth(4)
        .with_budget(Budget::ForwardModelCalls { count: 40 });
    let mut mcts = engine(&board, config, 2);

    mcts.decide_action(&board).unwrap();

    assert_eq!(mcts.last_stats().iterations, 10);
    assert_eq!(mcts.last_stats().forward_model_calls, 40);
}

#[test]
fn budget_smaller_than_one_iteration_still_runs_once() {
    let board = GridChase::default();
    let config = SearchConfig::default().with_budget(Budget::ForwardModelCalls { count: 1 });
    let mut mcts = engine(&board, config, 2);

    mcts.decide_action(&board).unwrap();

    assert_eq!(mcts.last_stats().iterations, 1);
    assert_eq!(mcts.get_root().value().visits, 1);
}

#[test]
fn time_budget_stops() {
    let board = GridChase::default();
    let config = SearchConfig::default().with_budget(Budget::Time { millis: 30 });
    let mut mcts = engine(&board, config, 2);

    mcts.decide_action(&board).unwrap();

    let stats = mcts.last_stats();
    assert!(stats.iterations >= 1);
    assert!(stats.elapsed.as_secs() < 5);
}

#[test]
fn sampler_stays_normalised_after_search() {
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::default().with_iterations(150), 6);

    mcts.decide_action(&board).unwrap();

    let total: f64 = mcts.sampler().weights().values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(mcts.sampler().updates_done() <= mcts.sampler().anneal_horizon());
}

#[test]
fn invalid_configuration_fails_at_construction() {
    let result = CollapsingMcts::builder(GridChase::default(), GridChaseHeuristic::default())
        .with_random_generator(CustomNumberGenerator::default())
        .with_config(SearchConfig::default().with_anneal_horizon(0))
        .build();

    assert_matches!(result.err(), Some(SearchError::Config(ConfigError::ZeroAnnealHorizon)));
}

#[test]
fn terminal_state_is_rejected() {
    let mut board = GridChase::new(3, 3).with_coin(1, 0);
    board.perform_action(RIGHT);
    let mut mcts = engine(&board, SearchConfig::for_testing(), 1);

    assert_matches!(mcts.decide_action(&board), Err(SearchError::TerminalRoot));
}

#[test]
fn one_shot_decision_is_deterministic() {
    let board = GridChase::default();
    let config = SearchConfig::for_testing();

    let a = decide_action(&board, GridChaseHeuristic::default(), config.clone(), CustomNumberGenerator::new(5));
    let b = decide_action(&board, GridChaseHeuristic::default(), config, CustomNumberGenerator::new(5));

    assert_eq!(a.unwrap(), b.unwrap());
}

#[test]
fn sampler_keeps_every_action_after_collapsed_expansions() {
    // arrange
    let board = GridChase::default();
    let mut mcts = engine(&board, SearchConfig::default().with_iterations(40), 6);

    // act
    mcts.decide_action(&board).unwrap();

    // assert
    let weights = mcts.sampler().weights();
    assert_eq!(weights.len(), board.action_count());
    assert!(weights.values().all(|&w| w > 0.0));
    assert_eq!(weights.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn reused_root_drops_children_illegal_in_the_new_state() {
    // arrange
    let start = Corridor { position: 0, steps: 0 };
    let config = SearchConfig::default()
        .with_iterations(80)
        .with_rollout_depth(6)
        .with_cluster_ratio(1.0)
        .with_tree_reuse(true);
    let mut mcts = CollapsingMcts::builder(start.clone(), CorridorHeuristic)
        .with_random_generator(CustomNumberGenerator::new(4))
        .with_config(config)
        .build()
        .unwrap();
    mcts.decide_action(&start).unwrap();
    // Odd positions forbid the jump, whichever child was kept.
    let moved = Corridor { position: 1, steps: 1 };

    // act
    let action = mcts.decide_action(&moved).unwrap();

    // assert
    assert!(moved.is_legal(action));
    let root = mcts.get_root().value();
    assert_eq!(root.children[3], None);
    for (child_action, _) in root.expanded_children() {
        assert!(moved.is_legal(child_action));
    }
    for cluster in &root.clusters {
        assert!(cluster.members.iter().all(|m| moved.is_legal(m.child)));
    }
    assert!(root.representatives.iter().all(|&a| moved.is_legal(a)));
    assert!(root.visits > 80);
}

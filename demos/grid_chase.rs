extern crate collapsing_mcts;

use collapsing_mcts::board::Board;
use collapsing_mcts::boards::grid_chase::{GridChase, GridChaseHeuristic};
use collapsing_mcts::config::SearchConfig;
use collapsing_mcts::mcts::{CollapsingMcts, SearchError};
use collapsing_mcts::random::StandardRandomGenerator;
use tracing::info;

const ACTION_NAMES: [&str; 5] = ["stay", "up", "down", "left", "right"];

fn main() -> Result<(), SearchError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("collapsing_mcts=info")),
        )
        .init();

    let mut board = GridChase::default();
    let config = SearchConfig::default().with_iterations(300).with_tree_reuse(true);
    let mut mcts = CollapsingMcts::builder(board.clone(), GridChaseHeuristic::default())
        .with_random_generator(StandardRandomGenerator::seeded(2024))
        .with_config(config)
        .build()?;

    // Play the game out, one search per tick
    while !board.is_terminal() {
        let action = mcts.decide_action(&board)?;

        let tree = mcts.get_tree();
        let root = mcts.get_root().value();
        for (child_action, child_id) in root.expanded_children() {
            if let Some(child) = tree.get(child_id) {
                let child = child.value();
                println!(
                    "  {:>5}: visits {:>4}, mean {:+.3}{}",
                    ACTION_NAMES[child_action],
                    child.visits,
                    child.mean_value(),
                    if root.is_representative(child_action) { " *" } else { "" }
                );
            }
        }

        board.perform_action(action);
        info!(
            tick = board.tick(),
            action = ACTION_NAMES[action],
            scores = ?board.scores(),
            iterations = mcts.last_stats().iterations,
            "played"
        );
    }

    println!("Game over: {:?} with scores {:?}", board.outcome(), board.scores());
    Ok(())
}

//! Self-play data generation and evaluation for arbor.
//!
//! Generates tic-tac-toe self-play games with the AlphaZero-style search
//! and writes the training examples as JSON lines or MessagePack. Also
//! pits the baseline and heuristic searches against each other, and asks
//! any of the three searches for a best move.

use anyhow::{bail, Context, Result};
use arbor_core::{GameState, Player};
use arbor_inference::{RemoteConfig, RemoteEvaluator};
use arbor_mcts::games::TicTacToeState;
use arbor_mcts::{
    AlphaZeroMcts, Evaluator, HeuristicMcts, Mcts, MctsConfig, RolloutEvaluator, SearchResult,
    UniformEvaluator, VirtualLossMode,
};
use arbor_selfplay::{
    ActionSelection, ExampleSink, JsonLinesSink, MessagePackSink, SelfPlay, SelfPlayConfig,
};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Arbor tree search: self-play and evaluation tool.
#[derive(Parser)]
#[command(name = "arbor-selfplay")]
#[command(about = "Generate self-play training data and compare search variants")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate self-play games for training.
    Generate {
        /// Number of games to generate.
        #[arg(short, long, default_value = "10")]
        games: usize,

        /// Search iterations per move for both players.
        #[arg(short, long, default_value = "100")]
        iterations: usize,

        /// Override the first player's iterations per move.
        #[arg(long)]
        first_iterations: Option<usize>,

        /// Override the second player's iterations per move.
        #[arg(long)]
        second_iterations: Option<usize>,

        /// Where leaf evaluations come from.
        #[arg(short, long, value_enum, default_value = "rollout")]
        evaluator: EvaluatorKind,

        /// Inference service URL for the remote evaluator and training.
        #[arg(long, default_value = "http://localhost:5000")]
        url: String,

        /// Per-request timeout for the remote evaluator, in seconds.
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Maximum playout length for the rollout evaluator.
        #[arg(long, default_value = "50")]
        rollout_depth: usize,

        /// Output file for training examples.
        #[arg(short, long, default_value = "data/training.jsonl")]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "jsonl")]
        format: OutputFormat,

        /// Append to the output file instead of replacing it.
        #[arg(long)]
        append: bool,

        /// Sample moves from the visit distribution instead of playing the
        /// search's best action.
        #[arg(long)]
        sample: bool,

        /// Fraction of root priors replaced by Dirichlet noise.
        #[arg(long, default_value = "0.0")]
        noise_fraction: f32,

        /// Worker threads (defaults to available parallelism).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Random seed for reproducibility.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Post the examples to the service's /train endpoint, then have it
        /// reload its model.
        #[arg(long)]
        train: bool,
    },

    /// Play baseline UCT against heuristic MCTS with alternating colours.
    Evaluate {
        /// Number of games to play.
        #[arg(short, long, default_value = "20")]
        games: usize,

        /// Search iterations per move for both sides.
        #[arg(short, long, default_value = "500")]
        iterations: usize,

        /// Remove virtual loss when each heuristic iteration completes.
        #[arg(long)]
        compensated: bool,

        /// Random seed for reproducibility.
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Print the best move for a tic-tac-toe position.
    BestMove {
        /// Nine cells of X, O or '.', row by row; '/' separators are allowed.
        #[arg(short, long, default_value = ".........")]
        board: String,

        #[arg(short, long, value_enum, default_value = "uct")]
        variant: Variant,

        /// Search iterations.
        #[arg(short, long, default_value = "1000")]
        iterations: usize,

        /// Optional time budget in milliseconds.
        #[arg(long)]
        time_ms: Option<u64>,

        /// Random seed for reproducibility.
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EvaluatorKind {
    Uniform,
    Rollout,
    Remote,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Jsonl,
    Msgpack,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Uct,
    Heuristic,
    Alphazero,
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Run the generate command.
#[allow(clippy::too_many_arguments)]
fn cmd_generate(
    games: usize,
    iterations: usize,
    first_iterations: Option<usize>,
    second_iterations: Option<usize>,
    evaluator: EvaluatorKind,
    url: String,
    timeout: u64,
    rollout_depth: usize,
    output: PathBuf,
    format: OutputFormat,
    append: bool,
    sample: bool,
    noise_fraction: f32,
    workers: Option<usize>,
    seed: u64,
    train: bool,
) -> Result<()> {
    let remote = RemoteConfig {
        io_timeout: Duration::from_secs(timeout),
        ..RemoteConfig::new(url)
    };
    let evaluator: Arc<dyn Evaluator<TicTacToeState>> = match evaluator {
        EvaluatorKind::Uniform => Arc::new(UniformEvaluator),
        EvaluatorKind::Rollout => Arc::new(RolloutEvaluator::new(seed.wrapping_add(1), rollout_depth)),
        EvaluatorKind::Remote => Arc::new(RemoteEvaluator::new(remote.clone())),
    };

    let config = SelfPlayConfig {
        games,
        player_iterations: [
            first_iterations.unwrap_or(iterations),
            second_iterations.unwrap_or(iterations),
        ],
        workers,
        seed,
        action_selection: if sample {
            ActionSelection::Sample
        } else {
            ActionSelection::Greedy
        },
        mcts: MctsConfig::alphazero(iterations).with_root_noise(0.3, noise_fraction),
        ..Default::default()
    };
    let selfplay = SelfPlay::new(config, evaluator).context("Invalid self-play settings")?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let mut sink: Box<dyn ExampleSink> = match format {
        OutputFormat::Jsonl => Box::new(
            JsonLinesSink::create(&output, append)
                .with_context(|| format!("Failed to open {:?}", output))?,
        ),
        OutputFormat::Msgpack => Box::new(
            MessagePackSink::create(&output, append)
                .with_context(|| format!("Failed to open {:?}", output))?,
        ),
    };

    info!(games, iterations, ?output, "generating self-play games");
    let start = Instant::now();
    let report = selfplay.run(&TicTacToeState::new())?;

    for game in &report.games {
        sink.write_examples(&game.examples)
            .with_context(|| format!("Failed to write game {}", game.index))?;
    }
    sink.finish().context("Failed to flush training examples")?;

    let (first, second, draws) = report.outcomes();
    println!("Completed in {:.2}s", start.elapsed().as_secs_f64());
    println!("Games finished: {}", report.games.len());
    println!("Games failed:   {}", report.failures.len());
    println!("Examples:       {}", report.total_examples());
    println!("Outcomes: X wins: {first}, O wins: {second}, Draws: {draws}");
    println!("Examples saved to: {:?}", output);

    if report.games.is_empty() && !report.failures.is_empty() {
        bail!("every game failed; first error: {}", report.failures[0].error);
    }

    if train {
        let service = RemoteEvaluator::new(remote);
        let examples: Vec<_> = report.examples().collect();
        let reply = service
            .train(&examples)
            .with_context(|| format!("Training request to {} failed", service.config().base_url))?;
        println!("Training: {reply}");
        let reply = service.load_model().context("Model reload failed")?;
        println!("Model reload: {reply}");
    }
    Ok(())
}

/// Tally of an arena run from the baseline's point of view.
#[derive(Debug, Default)]
struct ArenaResult {
    baseline_wins: usize,
    heuristic_wins: usize,
    draws: usize,
}

fn cmd_evaluate(games: usize, iterations: usize, compensated: bool, seed: u64) -> Result<()> {
    let mode = if compensated {
        VirtualLossMode::Compensated
    } else {
        VirtualLossMode::Persistent
    };
    let mut result = ArenaResult::default();

    println!("Playing {games} games: baseline UCT vs heuristic MCTS ({iterations} iterations)");
    for i in 0..games {
        let game_seed = seed.wrapping_add(i as u64 * 1000);
        let baseline_seat = if i % 2 == 0 { Player::First } else { Player::Second };

        let mut baseline = Mcts::new(
            MctsConfig::baseline(iterations),
            ChaCha8Rng::seed_from_u64(game_seed),
        );
        let heuristic = HeuristicMcts::new(
            MctsConfig::heuristic(iterations).with_virtual_loss_mode(mode),
            game_seed.wrapping_add(1),
        );

        let mut state = TicTacToeState::new();
        while !state.is_terminal() {
            let action = if state.current_player() == baseline_seat {
                baseline.best_action(&state)?
            } else {
                heuristic.best_action(&state)?
            };
            state = state.apply(action);
        }

        let reward = state.reward(baseline_seat)?;
        if reward > 0.0 {
            result.baseline_wins += 1;
        } else if reward < 0.0 {
            result.heuristic_wins += 1;
        } else {
            result.draws += 1;
        }
        info!(game = i, reward, "arena game finished");
    }

    println!("Baseline wins:  {}", result.baseline_wins);
    println!("Heuristic wins: {}", result.heuristic_wins);
    println!("Draws:          {}", result.draws);
    Ok(())
}

fn print_search<S: GameState>(result: &SearchResult<S>) {
    println!(
        "Iterations: {} ({:.1} ms){}",
        result.iterations(),
        result.elapsed().as_secs_f64() * 1000.0,
        if result.is_exhausted() { ", fully explored" } else { "" }
    );
    for (action, visits) in result.visit_counts() {
        println!("  {:?}: {} visits", action, visits);
    }
}

fn cmd_best_move(board: &str, variant: Variant, iterations: usize, time_ms: Option<u64>, seed: u64) -> Result<()> {
    let state: TicTacToeState = board
        .parse()
        .with_context(|| format!("Invalid board: {board}"))?;
    if state.is_terminal() {
        bail!("the game on this board is already over");
    }

    let with_budget = |config: MctsConfig| match time_ms {
        Some(ms) => config.with_time_budget(Duration::from_millis(ms)),
        None => config,
    };

    let result = match variant {
        Variant::Uct => Mcts::new(
            with_budget(MctsConfig::baseline(iterations)),
            ChaCha8Rng::seed_from_u64(seed),
        )
        .search(&state)?,
        Variant::Heuristic => {
            HeuristicMcts::new(with_budget(MctsConfig::heuristic(iterations)), seed).search(&state)?
        }
        Variant::Alphazero => AlphaZeroMcts::new(
            with_budget(MctsConfig::alphazero(iterations)),
            RolloutEvaluator::new(seed.wrapping_add(1), 50),
            ChaCha8Rng::seed_from_u64(seed),
        )
        .search(&state)?,
    };

    print!("{state}");
    print_search(&result);
    match result.best_action() {
        Some(action) => println!("Best move: cell {} {}", action.0, action),
        None => bail!("search ran no iterations; raise the budget"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Generate {
            games,
            iterations,
            first_iterations,
            second_iterations,
            evaluator,
            url,
            timeout,
            rollout_depth,
            output,
            format,
            append,
            sample,
            noise_fraction,
            workers,
            seed,
            train,
        } => cmd_generate(
            games,
            iterations,
            first_iterations,
            second_iterations,
            evaluator,
            url,
            timeout,
            rollout_depth,
            output,
            format,
            append,
            sample,
            noise_fraction,
            workers,
            seed,
            train,
        ),

        Commands::Evaluate {
            games,
            iterations,
            compensated,
            seed,
        } => cmd_evaluate(games, iterations, compensated, seed),

        Commands::BestMove {
            board,
            variant,
            iterations,
            time_ms,
            seed,
        } => cmd_best_move(&board, variant, iterations, time_ms, seed),
    }
}

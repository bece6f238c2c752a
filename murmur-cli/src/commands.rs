//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use murmur_core::mechanism::selection::Quota;
use murmur_core::simulator::{AnyOf, MaxIterations, NoMoreNew};
use murmur_core::{
    CorpusBuilder, EdgeKind, EdgeOrientation, InformationCorpus, SimRng, SimulationConfig,
    Simulator, presets,
};

/// Diffusion model to run.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Model {
    /// Count-based selection, broadcast to all neighbors
    Simple,
    /// Push epidemic: hand everything to one partner per round
    Push,
    /// Pull epidemic: take one partner's payload per round
    Pull,
    /// Push-pull hybrid exchange
    PushPull,
    /// Rumor spreading with fixed fan-out
    Rumor,
    /// Independent cascade model
    Cascade,
    /// Count-threshold model
    CountThreshold,
    /// Proportion-threshold model
    ProportionThreshold,
}

/// Shape of the synthetic social graph.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Topology {
    /// Directed cycle: user i follows user i+1
    Ring,
    /// Every ordered pair connected
    Complete,
    /// Erdos-Renyi: each ordered pair connected with probability
    /// `edge-prob`
    Random,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a diffusion scenario over a synthetic graph
    Run {
        /// Diffusion model to simulate
        #[arg(short, long, value_enum, default_value = "simple")]
        model: Model,
        /// Number of users in the graph
        #[arg(short, long, default_value = "100")]
        users: usize,
        /// Graph topology
        #[arg(short, long, value_enum, default_value = "random")]
        topology: Topology,
        /// Edge probability for the random topology
        #[arg(long, default_value = "0.05")]
        edge_prob: f64,
        /// Number of users seeded with one authored piece each
        #[arg(long, default_value = "1")]
        seeders: usize,
        /// Activation probability (cascade model)
        #[arg(long, default_value = "0.2")]
        probability: f64,
        /// Adopter threshold (threshold models; proportion for
        /// proportion-threshold)
        #[arg(long, default_value = "2")]
        threshold: f64,
        /// Fan-out (rumor model)
        #[arg(long, default_value = "2")]
        fanout: usize,
        /// Partner revisit wait (push/pull models)
        #[arg(long, default_value = "1")]
        wait: u32,
        /// Iteration cap
        #[arg(long, default_value = "50")]
        max_iterations: u32,
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Write the full report as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Generate a synthetic corpus and print its summary
    Inspect {
        /// Number of users in the graph
        #[arg(short, long, default_value = "100")]
        users: usize,
        /// Graph topology
        #[arg(short, long, value_enum, default_value = "random")]
        topology: Topology,
        /// Edge probability for the random topology
        #[arg(long, default_value = "0.05")]
        edge_prob: f64,
        /// Number of users seeded with one authored piece each
        #[arg(long, default_value = "1")]
        seeders: usize,
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            model,
            users,
            topology,
            edge_prob,
            seeders,
            probability,
            threshold,
            fanout,
            wait,
            max_iterations,
            seed,
            json,
        } => run_scenario(RunOptions {
            model,
            users,
            topology,
            edge_prob,
            seeders,
            probability,
            threshold,
            fanout,
            wait,
            max_iterations,
            seed,
            json,
        }),
        Commands::Inspect {
            users,
            topology,
            edge_prob,
            seeders,
            seed,
        } => inspect(users, topology, edge_prob, seeders, seed),
    }
}

struct RunOptions {
    model: Model,
    users: usize,
    topology: Topology,
    edge_prob: f64,
    seeders: usize,
    probability: f64,
    threshold: f64,
    fanout: usize,
    wait: u32,
    max_iterations: u32,
    seed: u64,
    json: Option<PathBuf>,
}

/// Builds a synthetic corpus: `seeders` users author one piece each at
/// consecutive timestamps, wired by the requested topology.
fn build_corpus(
    users: usize,
    topology: Topology,
    edge_prob: f64,
    seeders: usize,
    seed: u64,
) -> Result<InformationCorpus> {
    let mut builder = CorpusBuilder::new();
    let names: Vec<String> = (0..users).map(|i| format!("u{i}")).collect();
    for name in &names {
        builder = builder.user(name.clone());
    }
    for (i, name) in names.iter().take(seeders).enumerate() {
        builder = builder.piece(format!("piece-{i}"), i as i64, &[name.as_str()]);
    }

    let mut rng = SimRng::from_seed(seed).fork(0xC0FFEE);
    for i in 0..users {
        for j in 0..users {
            if i == j {
                continue;
            }
            let connect = match topology {
                Topology::Ring => j == (i + 1) % users,
                Topology::Complete => true,
                Topology::Random => rng.random_bool(edge_prob),
            };
            if connect {
                builder = builder.edge(names[i].clone(), names[j].clone(), 1.0, EdgeKind::Original);
            }
        }
    }
    builder.build().context("failed to assemble corpus")
}

fn run_scenario(options: RunOptions) -> Result<()> {
    tracing::info!(
        model = ?options.model,
        users = options.users,
        seed = options.seed,
        "running scenario"
    );
    let corpus = Arc::new(build_corpus(
        options.users,
        options.topology,
        options.edge_prob,
        options.seeders,
        options.seed,
    )?);

    let orientation = EdgeOrientation::Out;
    let builder = match options.model {
        Model::Simple => presets::simple(Quota::Limit(1), Quota::Limit(1), orientation, options.seed),
        Model::Push => presets::push(options.wait, orientation, options.seed),
        Model::Pull => presets::pull(options.wait, orientation, options.seed),
        Model::PushPull => presets::push_pull(options.wait, orientation, options.seed),
        Model::Rumor => presets::rumor_spreading(options.fanout, orientation, options.seed),
        Model::Cascade => presets::independent_cascade(
            options.probability,
            Quota::All,
            orientation,
            options.seed,
        ),
        Model::CountThreshold => presets::count_threshold(
            Quota::Limit(1),
            options.threshold as u32,
            orientation,
            options.seed,
        ),
        Model::ProportionThreshold => presets::proportion_threshold(
            Quota::Limit(1),
            options.threshold,
            orientation,
            options.seed,
        ),
    };
    let protocol = builder
        .build(&corpus)
        .context("failed to assemble protocol")?;

    let stop = AnyOf(vec![
        Box::new(MaxIterations(options.max_iterations)),
        Box::new(NoMoreNew),
    ]);
    let mut simulator = Simulator::new(corpus, protocol, stop, SimulationConfig::default());
    let report = simulator.run()?;

    println!("{}", report.summary());
    if let Some(path) = options.json {
        let serialized =
            serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(&path, serialized)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn inspect(
    users: usize,
    topology: Topology,
    edge_prob: f64,
    seeders: usize,
    seed: u64,
) -> Result<()> {
    let corpus = build_corpus(users, topology, edge_prob, seeders, seed)?;
    println!("{}", corpus.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_corpus_topologies() {
        let ring = build_corpus(5, Topology::Ring, 0.0, 1, 1).unwrap();
        assert_eq!(ring.graph().edge_count(), 5);
        assert_eq!(ring.piece_count(), 1);

        let complete = build_corpus(4, Topology::Complete, 0.0, 2, 1).unwrap();
        assert_eq!(complete.graph().edge_count(), 12);
        assert_eq!(complete.piece_count(), 2);
    }

    #[test]
    fn test_run_scenario_smoke() {
        let options = RunOptions {
            model: Model::Simple,
            users: 10,
            topology: Topology::Ring,
            edge_prob: 0.0,
            seeders: 1,
            probability: 0.2,
            threshold: 1.0,
            fanout: 2,
            wait: 1,
            max_iterations: 5,
            seed: 42,
            json: None,
        };
        run_scenario(options).unwrap();
    }
}

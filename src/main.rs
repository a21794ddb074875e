//! augur CLI: knowledge-graph interpolation and extrapolation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use augur::config::EngineConfig;
use augur::engine::Engine;
use augur::graph::import;
use augur::graph::memory::MemoryGraph;
use augur::predict::Prediction;
use augur::predict::interpolation::InterpolationAnswer;

#[derive(Parser)]
#[command(name = "augur", version, about = "Knowledge-graph embedding prediction engine")]
struct Cli {
    /// Graph document (JSON) to load into the in-memory backend.
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Engine configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding dimension (overrides the config file).
    #[arg(long, global = true)]
    dimension: Option<usize>,

    /// RNG seed (overrides the config file).
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine info and statistics.
    Info,

    /// Train both models and save them.
    Train {
        /// Static training epochs.
        #[arg(long)]
        epochs: Option<usize>,

        /// Temporal training epochs.
        #[arg(long)]
        temporal_epochs: Option<usize>,

        /// Adam learning rate.
        #[arg(long)]
        lr: Option<f32>,

        /// Directory to write the trained models to.
        #[arg(long)]
        out: PathBuf,
    },

    /// Complete a partially given triple.
    Interpolate {
        #[arg(long)]
        entity1: Option<String>,

        #[arg(long)]
        relation: Option<String>,

        #[arg(long)]
        entity2: Option<String>,

        #[command(flatten)]
        output: QueryArgs,
    },

    /// Rank missing (relation, target) pairs for an entity.
    Missing {
        #[arg(long)]
        entity: String,

        #[command(flatten)]
        output: QueryArgs,
    },

    /// Forecast an entity's future relations.
    Extrapolate {
        #[arg(long)]
        entity: String,

        /// Years into the future.
        #[arg(long, default_value = "5")]
        years: u32,

        #[command(flatten)]
        output: QueryArgs,
    },

    /// Forecast intra-industry relations.
    Trend {
        #[arg(long)]
        industry: String,

        /// Years into the future.
        #[arg(long, default_value = "5")]
        years: u32,

        #[command(flatten)]
        output: QueryArgs,
    },

    /// Write the loaded graph back out as a JSON document.
    ExportGraph {
        #[arg(long)]
        out: PathBuf,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Number of results to return.
    #[arg(long, default_value = "5")]
    top_k: usize,

    /// Directory of trained models to load before predicting.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dimension) = cli.dimension {
        config.dimension = dimension;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    let graph = Arc::new(match &cli.graph {
        Some(path) => import::load_json(path)?.0,
        None => {
            tracing::warn!("no --graph given, starting from an empty graph");
            MemoryGraph::new()
        }
    });

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::ExportGraph { out } => {
            import::save_json(&graph, &out)?;
            println!(
                "Exported {} nodes and {} relationships to {}",
                graph.node_count(),
                graph.edge_count(),
                out.display()
            );
        }

        Commands::Info => {
            let engine = Engine::build(graph, config)?;
            println!("{}", engine.info());
        }

        Commands::Train {
            epochs,
            temporal_epochs,
            lr,
            out,
        } => {
            let training = config.training.clone();
            let engine = Engine::build(graph, config)?;
            let lr = lr.unwrap_or(training.learning_rate);
            let static_report = engine.train(epochs.unwrap_or(training.epochs), lr);
            println!("interpolation: {static_report}");
            let temporal_report =
                engine.train_temporal(temporal_epochs.unwrap_or(training.temporal_epochs), lr);
            println!("extrapolation: {temporal_report}");
            engine.save_to(&out)?;
            println!("Saved models to {}", out.display());
        }

        Commands::Interpolate {
            entity1,
            relation,
            entity2,
            output,
        } => {
            let engine = open(graph, config, output.model.as_deref())?;
            let answer = engine.predict_interpolation(
                entity1.as_deref(),
                relation.as_deref(),
                entity2.as_deref(),
                output.top_k,
            )?;
            if output.json {
                print_json(&answer)?;
            } else {
                match answer {
                    InterpolationAnswer::Predictions(predictions) => print_predictions(&predictions),
                    InterpolationAnswer::InsufficientParameters(guidance) => print!("{guidance}"),
                }
            }
        }

        Commands::Missing { entity, output } => {
            let engine = open(graph, config, output.model.as_deref())?;
            let predictions = engine.predict_missing_relations(&entity, output.top_k)?;
            if output.json {
                print_json(&predictions)?;
            } else {
                print_predictions(&predictions);
            }
        }

        Commands::Extrapolate {
            entity,
            years,
            output,
        } => {
            let engine = open(graph, config, output.model.as_deref())?;
            let report = engine.predict_extrapolation(&entity, years, output.top_k)?;
            if output.json {
                print_json(&report)?;
            } else {
                for (year, predictions) in &report.predictions_by_year {
                    println!("{year}:");
                    print_predictions(predictions);
                }
                if !report.relation_histogram.is_empty() {
                    println!("Relation types:");
                    for (relation, count) in &report.relation_histogram {
                        println!("  {relation}: {count}");
                    }
                }
                println!("{}", report.rationale);
            }
        }

        Commands::Trend {
            industry,
            years,
            output,
        } => {
            let engine = open(graph, config, output.model.as_deref())?;
            let predictions = engine.predict_industry_trend(&industry, years, output.top_k)?;
            if output.json {
                print_json(&predictions)?;
            } else {
                print_predictions(&predictions);
            }
        }
    }

    Ok(())
}

/// Build an engine and optionally swap in trained models.
fn open(graph: Arc<MemoryGraph>, config: EngineConfig, model: Option<&Path>) -> Result<Engine> {
    let engine = Engine::build(graph, config)?;
    if let Some(dir) = model {
        engine.load_from(dir)?;
    }
    Ok(engine)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_predictions(predictions: &[Prediction]) {
    if predictions.is_empty() {
        println!("No predictions.");
        return;
    }
    for (i, p) in predictions.iter().enumerate() {
        println!("{:>3}. {p}", i + 1);
    }
}

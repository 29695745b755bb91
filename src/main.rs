use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, info_span};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use graphia_core::attribute::AttributeRegistry;
use graphia_core::document::Document;
use graphia_core::graph::GraphSnapshot;
use graphia_core::transform::{known_actions, parse_transform_config};
use graphia_core::visualisation::parse_visualisation_config;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a graph snapshot, apply a transform and visualisation line list,
    /// and print the resulting attribute/alert summary.
    Apply {
        #[clap(long)]
        graph: String,
        #[clap(long)]
        transforms: Option<String>,
        #[clap(long)]
        visualisations: Option<String>,
    },
    /// Parse a transform-list file and report parse/semantic errors without
    /// running anything.
    Validate {
        #[clap(long)]
        transforms: String,
    },
    /// List every registered transform action and whether it requires a
    /// `where` clause.
    DescribeOps,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = match args
        .log_level
        .unwrap_or("info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("{}", log_level)))
        .without_time()
        .init();

    match args.command {
        Commands::Apply { graph, transforms, visualisations } => run_apply(graph, transforms, visualisations)?,
        Commands::Validate { transforms } => run_validate(transforms)?,
        Commands::DescribeOps => run_describe_ops(),
    }

    Ok(())
}

fn read_lines(path: &str) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    Ok(text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
}

fn run_apply(graph_path: String, transforms_path: Option<String>, visualisations_path: Option<String>) -> Result<()> {
    let span = info_span!("rebuild", transform_count = transforms_path.is_some() as usize);
    let _enter = span.enter();

    let graph_text = std::fs::read_to_string(&graph_path).with_context(|| format!("reading {graph_path}"))?;
    let snapshot: GraphSnapshot = if graph_path.ends_with(".yaml") || graph_path.ends_with(".yml") {
        serde_yaml::from_str(&graph_text)?
    } else {
        serde_json::from_str(&graph_text)?
    };
    let source_graph = snapshot.into_mutable_graph().context("building graph from snapshot")?;
    info!(nodes = source_graph.num_nodes(), edges = source_graph.num_edges(), "graph loaded");

    let transform_lines = transforms_path.map(|path| read_lines(&path)).transpose()?.unwrap_or_default();
    let transforms = transform_lines
        .iter()
        .map(|line| parse_transform_config(line))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing transform list")?;

    let visualisation_lines = visualisations_path.map(|path| read_lines(&path)).transpose()?.unwrap_or_default();
    let visualisations = visualisation_lines
        .iter()
        .map(|line| parse_visualisation_config(line))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing visualisation list")?;

    let mut document = Document::new(source_graph, AttributeRegistry::new());
    document.apply(transforms, visualisations, false);

    if let Some(report) = document.last_rebuild_report().as_ref() {
        info!(changed = ?report.changed_attribute_names, cancelled = report.cancelled, "rebuild finished");
        for (index, alert) in &report.alerts {
            if alert.is_error() {
                error!(transform_index = index, "{}", alert.message);
            } else {
                tracing::warn!(transform_index = index, "{}", alert.message);
            }
        }
    }
    for (index, alert) in document.last_visualisation_alerts().iter() {
        if alert.is_error() {
            error!(visualisation_index = index, "{}", alert.message);
        } else {
            tracing::warn!(visualisation_index = index, "{}", alert.message);
        }
    }

    println!("nodes: {}", document.graph().num_nodes());
    println!("edges: {}", document.graph().num_edges());
    for name in document.attributes().names() {
        println!("attribute: {name}");
    }

    Ok(())
}

fn run_validate(transforms_path: String) -> Result<()> {
    let lines = read_lines(&transforms_path)?;
    let mut failed = 0usize;
    for (i, line) in lines.iter().enumerate() {
        match parse_transform_config(line) {
            Ok(config) => {
                if !graphia_core::transform::config_is_valid(&config) {
                    println!("line {}: invalid configuration for {:?}", i + 1, config.action);
                    failed += 1;
                }
            }
            Err(err) => {
                println!("line {}: {}", i + 1, err);
                failed += 1;
            }
        }
    }
    if failed == 0 {
        println!("{} transform(s) valid", lines.len());
    } else {
        println!("{failed} of {} transform(s) invalid", lines.len());
        std::process::exit(1);
    }
    Ok(())
}

fn run_describe_ops() {
    for (action, requires_condition) in known_actions() {
        if requires_condition {
            println!("{action} (requires where clause)");
        } else {
            println!("{action}");
        }
    }
}

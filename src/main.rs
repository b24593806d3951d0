mod app;
mod corpus;
mod layout;
mod model;
mod pipeline;
mod publish;
mod stability;
mod util;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::{GraphApp, GraphSource};
use crate::corpus::{DEFAULT_LINK_PREFIX, DirectoryCorpus};
use crate::layout::LayoutConfig;
use crate::pipeline::{BuildOptions, RelayoutOptions};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract the corpus, place nodes and publish the graph document.
    Build(BuildArgs),
    /// Re-settle every non-pivot node and publish the result.
    Relayout(RelayoutArgs),
    /// Drop stored positions of nodes that left the corpus.
    Prune(PruneArgs),
    /// Write the node/edge set for ad-hoc viewing, optionally settled.
    Extract(ExtractArgs),
    /// Open the interactive viewer.
    View(ViewArgs),
}

#[derive(Debug, clap::Args)]
struct CorpusArgs {
    #[arg(long)]
    corpus: PathBuf,
    #[arg(long, default_value = DEFAULT_LINK_PREFIX)]
    link_prefix: String,
}

#[derive(Debug, clap::Args)]
struct BuildArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    pivots: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 25.0)]
    drift_warn: f64,
}

#[derive(Debug, clap::Args)]
struct RelayoutArgs {
    #[command(flatten)]
    build: BuildArgs,
    #[arg(long)]
    iterations: Option<usize>,
    #[arg(long)]
    layout_config: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct PruneArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    pivots: PathBuf,
}

#[derive(Debug, clap::Args)]
struct ExtractArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    settle: bool,
    #[arg(long)]
    layout_config: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct ViewArgs {
    #[arg(long)]
    graph: PathBuf,
    #[arg(long)]
    fallback: Option<PathBuf>,
    #[arg(long)]
    night: bool,
    #[arg(long)]
    layout_config: Option<PathBuf>,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            store: self.store.clone(),
            pivots: self.pivots.clone(),
            out: self.out.clone(),
            link_prefix: self.corpus.link_prefix.clone(),
            drift_warn: self.drift_warn,
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn layout_config(path: Option<&Path>) -> Result<LayoutConfig> {
    match path {
        Some(path) => LayoutConfig::load(path),
        None => Ok(LayoutConfig::default()),
    }
}

fn view(args: ViewArgs) -> Result<()> {
    let layout = layout_config(args.layout_config.as_deref())?;
    let source = GraphSource {
        primary: args.graph,
        fallback: args.fallback,
    };
    let night = args.night;
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 860.0]),
        ..Default::default()
    };

    eframe::run_native(
        "athanor-graph",
        options,
        Box::new(move |cc| Ok(Box::new(GraphApp::new(cc, source, night, layout)))),
    )
    .map_err(|error| anyhow!("viewer failed: {error}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Build(args) => {
            let corpus = DirectoryCorpus::new(&args.corpus.corpus);
            pipeline::run_build(&corpus, &args.options())?;
        }
        Command::Relayout(args) => {
            let corpus = DirectoryCorpus::new(&args.build.corpus.corpus);
            let options = RelayoutOptions {
                build: args.build.options(),
                iterations: args.iterations,
                layout: layout_config(args.layout_config.as_deref())?,
            };
            pipeline::run_relayout(&corpus, &options)?;
        }
        Command::Prune(args) => {
            let corpus = DirectoryCorpus::new(&args.corpus.corpus);
            pipeline::run_prune(&corpus, &args.store, &args.pivots, &args.corpus.link_prefix)?;
        }
        Command::Extract(args) => {
            let corpus = DirectoryCorpus::new(&args.corpus.corpus);
            let layout = args
                .settle
                .then(|| layout_config(args.layout_config.as_deref()))
                .transpose()?;
            pipeline::run_extract(&corpus, &args.out, &args.corpus.link_prefix, layout.as_ref())?;
        }
        Command::View(args) => view(args)?,
    }
    Ok(())
}

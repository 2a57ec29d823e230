use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use relfeat_core::baseline::run_baseline;
use relfeat_core::persist::{open_index, IndexPaths};
use relfeat_core::{FeatureCatalog, FeaturePipeline, PipelineConfig, Searcher};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "extractor")]
#[command(about = "Compute query/product relevance features from a product index", long_about = None)]
struct Cli {
    /// Index directory path
    #[arg(long, default_value = "./index", global = true)]
    index: String,
    /// Rows evaluated and written together
    #[arg(long, default_value_t = 1024, global = true)]
    batch_size: usize,
    /// Evaluate the rows of each batch in parallel
    #[arg(long, default_value_t = false, global = true)]
    parallel: bool,
    /// Worker threads for --parallel (defaults to one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FeatureSet {
    Standard,
    Idf,
    All,
}

#[derive(Args)]
struct Selection {
    /// Named feature set
    #[arg(long, value_enum, default_value_t = FeatureSet::Standard)]
    set: FeatureSet,
    /// Explicit comma-separated feature names, overriding --set
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,
}

impl Selection {
    fn catalog(&self) -> Result<FeatureCatalog> {
        if !self.features.is_empty() {
            return Ok(FeatureCatalog::select(self.features.as_slice())?);
        }
        Ok(match self.set {
            FeatureSet::Standard => FeatureCatalog::standard(),
            FeatureSet::Idf => FeatureCatalog::idf_extension(),
            FeatureSet::All => FeatureCatalog::all(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a full feature file for a query file
    Build {
        /// Query CSV (product_uid, search_term, optional id and relevance)
        #[arg(long)]
        queries: String,
        #[arg(long)]
        output: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Add features to an existing feature file, row-aligned with the query file
    Augment {
        #[arg(long)]
        queries: String,
        #[arg(long)]
        existing: String,
        #[arg(long)]
        output: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Write rank-based relevance guesses (id, relevance)
    Baseline {
        #[arg(long)]
        queries: String,
        #[arg(long)]
        output: String,
    },
    /// Print feature names in column order
    List {
        #[command(flatten)]
        selection: Selection,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }
    let config = PipelineConfig { batch_size: cli.batch_size, parallel: cli.parallel };

    match &cli.command {
        Commands::List { selection } => {
            for name in selection.catalog()?.names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Build { queries, output, selection } => {
            let catalog = selection.catalog()?;
            let searcher = load_searcher(&cli.index)?;
            let pipeline = FeaturePipeline::new(&searcher, &catalog).with_config(config);
            let summary = write_atomically(Path::new(output), |w| Ok(pipeline.build(open(queries)?, w)?))?;
            tracing::info!(rows = summary.rows, features = summary.features, output = %output, "wrote features");
            Ok(())
        }
        Commands::Augment { queries, existing, output, selection } => {
            let catalog = selection.catalog()?;
            let searcher = load_searcher(&cli.index)?;
            let pipeline = FeaturePipeline::new(&searcher, &catalog).with_config(config);
            let summary = write_atomically(Path::new(output), |w| {
                Ok(pipeline.augment(open(queries)?, open(existing)?, w)?)
            })?;
            tracing::info!(rows = summary.rows, features = summary.features, output = %output, "augmented features");
            Ok(())
        }
        Commands::Baseline { queries, output } => {
            let searcher = load_searcher(&cli.index)?;
            let rows = write_atomically(Path::new(output), |w| Ok(run_baseline(&searcher, open(queries)?, w)?))?;
            tracing::info!(rows, output = %output, "wrote baseline");
            Ok(())
        }
    }
}

fn load_searcher(index: &str) -> Result<Searcher> {
    let index = open_index(&IndexPaths::new(index)).with_context(|| format!("loading index from {index}"))?;
    Ok(Searcher::new(index))
}

fn open(path: &str) -> Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("opening {path}"))?;
    Ok(BufReader::new(f))
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write through `<output>.partial`, renamed into place only on success.
fn write_atomically<T, F>(output: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let partial = partial_path(output);
    let mut w = BufWriter::new(File::create(&partial).with_context(|| format!("creating {}", partial.display()))?);
    match write(&mut w).and_then(|v| w.into_inner().map_err(|e| e.into_error().into()).map(|_| v)) {
        Ok(v) => {
            fs::rename(&partial, output)?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&partial) {
                tracing::warn!(error = %rm, path = %partial.display(), "could not remove partial output");
            }
            Err(e)
        }
    }
}

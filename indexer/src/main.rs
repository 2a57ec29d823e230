use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relfeat_core::persist::{save_index, save_meta, IndexPaths, MetaFile, INDEX_VERSION};
use relfeat_core::{InvertedIndex, ProductId};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct TitleRecord {
    product_uid: ProductId,
    product_title: String,
}

#[derive(Debug, Deserialize)]
struct DescriptionRecord {
    product_uid: ProductId,
    product_description: String,
}

#[derive(Debug, Default, PartialEq)]
struct Product {
    title: String,
    description: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the product index used for feature extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from product title and description CSV files
    Build {
        /// Title CSV files or directories (product_uid, product_title)
        #[arg(long, required = true, num_args = 1..)]
        titles: Vec<String>,
        /// Description CSV file (product_uid, product_description)
        #[arg(long)]
        descriptions: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { titles, descriptions, output } => build_index(&titles, &descriptions, &output),
    }
}

fn build_index(titles: &[String], descriptions: &str, output: &str) -> Result<()> {
    let mut products: BTreeMap<ProductId, Product> = BTreeMap::new();

    for file in titles.iter().flat_map(|t| csv_files(Path::new(t))) {
        let n = read_titles(&file, &mut products)?;
        tracing::info!(file = %file.display(), records = n, "read titles");
    }
    let n = read_descriptions(Path::new(descriptions), &mut products)?;
    tracing::info!(file = descriptions, records = n, "read descriptions");

    let index = index_products(products);
    tracing::info!(num_docs = index.num_docs, title_terms = index.title.dictionary.len(), "indexed products");

    let out_paths = IndexPaths::new(output);
    save_index(&out_paths, &index)?;
    let meta = MetaFile {
        num_docs: index.num_docs,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: INDEX_VERSION,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

/// A CSV file as given, or every `.csv` below a directory in path order.
fn csv_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("csv"))
        .collect();
    files.sort();
    files
}

fn read_titles(file: &Path, products: &mut BTreeMap<ProductId, Product>) -> Result<usize> {
    let mut reader = csv::Reader::from_path(file).with_context(|| format!("opening {}", file.display()))?;
    let mut n = 0;
    for record in reader.deserialize() {
        let record: TitleRecord = record.with_context(|| format!("reading {}", file.display()))?;
        products.entry(record.product_uid).or_default().title = record.product_title;
        n += 1;
    }
    Ok(n)
}

fn read_descriptions(file: &Path, products: &mut BTreeMap<ProductId, Product>) -> Result<usize> {
    let mut reader = csv::Reader::from_path(file).with_context(|| format!("opening {}", file.display()))?;
    let mut n = 0;
    for record in reader.deserialize() {
        let record: DescriptionRecord = record.with_context(|| format!("reading {}", file.display()))?;
        products.entry(record.product_uid).or_default().description = record.product_description;
        n += 1;
    }
    Ok(n)
}

fn index_products(products: BTreeMap<ProductId, Product>) -> InvertedIndex {
    let mut index = InvertedIndex::new();
    for (product_id, product) in products {
        index.add_product(product_id, &product.title, &product.description);
    }
    index
}

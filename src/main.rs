use std::sync::Arc;

use clap::Parser;
use recollect::{
    cache::{self, FsCacheStore},
    config::{IndexConfig, SearchParams, Settings},
    embedding::{Encoders, HashingEncoder},
    error::{self, Error},
    extractor::{ExtensionRouter, TextExtractor},
    index::IndexBuilder,
    search::{self, SearchEngine},
    walker,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{ClearCacheArgs, Cli, Command, FilesArgs, IndexArgs, SearchArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RECOLLECT_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let settings = Settings::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Files(args) => cmd_files(&settings, &args),
        Command::Index(args) => cmd_index(&settings, &args),
        Command::Search(args) => cmd_search(&settings, &args),
        Command::ClearCache(args) => cmd_clear_cache(&args),
    }
}

/// Hashing encoder for both modalities. It embeds text only, so image
/// documents are searchable through whatever text they carry.
fn encoders() -> Encoders {
    let encoder = Arc::new(HashingEncoder::default());
    Encoders::new(encoder.clone(), encoder)
}

fn builder() -> IndexBuilder {
    let extractor =
        ExtensionRouter::new().route(["txt", "md"], TextExtractor::default());
    IndexBuilder::new(
        Arc::new(extractor),
        encoders(),
        Arc::new(FsCacheStore::new()),
    )
}

/// Apply command-line overrides on top of the configured index settings.
fn index_config(settings: &Settings, args: &IndexArgs) -> IndexConfig {
    let mut config = settings.index.clone();
    if !args.extensions.is_empty() {
        config = config.with_extensions(&args.extensions);
    }
    if args.no_cache {
        config = config.with_cache(false);
    }
    if args.subcache_threshold.is_some() {
        config = config.with_subcache_threshold(args.subcache_threshold);
    }
    config
}

fn require_dir(path: &std::path::Path) -> error::Result<()> {
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn cmd_files(settings: &Settings, args: &FilesArgs) -> error::Result<()> {
    require_dir(&args.root)?;

    let extensions = if args.extensions.is_empty() {
        settings.index.allowed_extensions.clone()
    } else {
        args.extensions.clone()
    };

    let files = walker::enumerate(&args.root, &extensions);
    for file in &files {
        println!("{}", file.display());
    }
    eprintln!("{} file(s)", files.len());
    Ok(())
}

fn cmd_index(settings: &Settings, args: &IndexArgs) -> error::Result<()> {
    let config = index_config(settings, args);
    let documents = builder().build(&args.root, &config)?;

    let empty = documents.iter().filter(|d| d.is_empty()).count();
    println!(
        "Indexed {} document(s) under {}",
        documents.len(),
        args.root.display()
    );
    if empty > 0 {
        println!("  {empty} without embeddings (not searchable)");
    }
    Ok(())
}

fn cmd_search(settings: &Settings, args: &SearchArgs) -> error::Result<()> {
    let config = index_config(settings, &args.index);
    let documents = builder().build(&args.index.root, &config)?;

    let params = SearchParams {
        top_k: args.top_k.unwrap_or(settings.search.top_k),
        image_weight: args.image_weight.unwrap_or(settings.search.image_weight),
    };

    let engine = SearchEngine::new(encoders());
    let results = engine.rank(&args.query, &documents, &params);

    if args.json {
        println!("{}", search::to_json(&results, &args.query)?);
    } else {
        search::format_human(&results);
    }
    Ok(())
}

fn cmd_clear_cache(args: &ClearCacheArgs) -> error::Result<()> {
    require_dir(&args.root)?;
    let removed = cache::clear(&args.root)?;
    println!("Removed {removed} cache(s) under {}", args.root.display());
    Ok(())
}

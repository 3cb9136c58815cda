use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "recollect",
    about = "Semantic search over directories of scanned documents"
)]
pub struct Cli {
    /// Read settings from this JSON file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the files that would be indexed
    Files(FilesArgs),
    /// Build (or load) the index of a directory
    Index(IndexArgs),
    /// Rank the documents of a directory against a query
    Search(SearchArgs),
    /// Delete every cache below a directory
    ClearCache(ClearCacheArgs),
}

/// Options shared by every command that walks a directory.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory to index
    pub root: PathBuf,

    /// File extension to include (repeatable; overrides the configured list)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Neither read nor write caches
    #[arg(long)]
    pub no_cache: bool,

    /// Give a directory its own cache once it holds more than this many
    /// freshly indexed documents
    #[arg(long, value_name = "COUNT")]
    pub subcache_threshold: Option<usize>,
}

// -- Files --

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Directory to walk
    pub root: PathBuf,

    /// File extension to include (repeatable; overrides the configured list)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,
}

// -- Search --

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Number of results to return
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,

    /// Multiplier for image similarities
    #[arg(long)]
    pub image_weight: Option<f32>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Clear cache --

#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Directory whose caches to remove
    pub root: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_search_defaults() {
        let cli =
            Cli::parse_from(["recollect", "search", "a rocket", "./scans"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "a rocket");
                assert_eq!(args.index.root, PathBuf::from("./scans"));
                assert!(args.index.extensions.is_empty());
                assert!(!args.index.no_cache);
                assert_eq!(args.index.subcache_threshold, None);
                assert_eq!(args.top_k, None);
                assert_eq!(args.image_weight, None);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_index_options() {
        let cli = Cli::parse_from([
            "recollect",
            "-vv",
            "index",
            "docs",
            "--ext",
            "txt",
            "--ext",
            "png",
            "--no-cache",
            "--subcache-threshold",
            "50",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.extensions, vec!["txt", "png"]);
                assert!(args.no_cache);
                assert_eq!(args.subcache_threshold, Some(50));
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(
            Cli::try_parse_from(["recollect", "-q", "-v", "clear-cache", "."])
                .is_err()
        );
    }
}

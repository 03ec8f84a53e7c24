//! assetgraph CLI - Asset dependency queries from the command line.
//!
//! Loads a JSONL asset manifest into an in-memory catalogue, builds the
//! dependency graph with a full scan, and answers one query.

use std::path::PathBuf;
use std::process::ExitCode;

use assetgraph::domain::ReferenceKind;
use assetgraph::store::Direction;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// assetgraph: Query asset reference graphs.
#[derive(Parser, Debug)]
#[command(name = "assetgraph")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSONL asset manifest to load
    #[arg(short, long, global = true, env = "ASSETGRAPH_MANIFEST")]
    manifest: Option<PathBuf>,

    /// YAML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what an asset depends on, transitively
    Deps {
        /// Asset identifier (e.g., "/Game/Props/Crate.Crate")
        asset: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show what depends on an asset, transitively
    Refs {
        /// Asset identifier
        asset: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Look for a reference cycle reachable from an asset
    Cycle {
        /// Asset identifier
        asset: String,

        /// Reference kinds to follow (repeatable; default: hard and soft)
        #[arg(short, long = "kind")]
        kinds: Vec<ReferenceKind>,
    },

    /// List every group of assets that reference each other circularly
    Cycles {
        /// Reference kinds to follow (repeatable; default: hard and soft)
        #[arg(short, long = "kind")]
        kinds: Vec<ReferenceKind>,
    },

    /// Show the shortest reference chain from one asset to another
    Path {
        /// Referencing asset
        from: String,

        /// Referenced asset
        to: String,

        /// Reference kinds to follow (repeatable; default: hard and soft)
        #[arg(short, long = "kind")]
        kinds: Vec<ReferenceKind>,
    },

    /// Check an asset's dependencies for missing assets
    Health {
        /// Asset identifier
        asset: String,

        /// Reference kinds to follow (repeatable; default: hard and soft)
        #[arg(short, long = "kind")]
        kinds: Vec<ReferenceKind>,
    },

    /// Show graph statistics
    Stats,
}

/// Traversal options shared by `deps` and `refs`.
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Maximum depth (0 shows only the asset itself)
    #[arg(short, long, allow_negative_numbers = true)]
    depth: Option<i64>,

    /// Reference kinds to follow (repeatable; default: hard and soft)
    #[arg(short, long = "kind")]
    kinds: Vec<ReferenceKind>,

    /// Only show assets of these types (repeatable)
    #[arg(long = "allow-type", conflicts_with = "deny_types")]
    allow_types: Vec<String>,

    /// Hide assets of these types (repeatable)
    #[arg(long = "deny-type")]
    deny_types: Vec<String>,

    /// Most new assets to show per node; the rest are collapsed
    #[arg(short, long)]
    breadth: Option<usize>,

    /// Skip engine-native /Script packages
    #[arg(long)]
    no_native: bool,

    /// Only show assets in these packages (repeatable)
    #[arg(long = "package")]
    packages: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(manifest) = cli.manifest.as_deref() else {
        anyhow::bail!("no manifest given (use --manifest or ASSETGRAPH_MANIFEST)");
    };
    let session = cli::Session::open(manifest, cli.config.as_deref(), cli.json).await?;

    let result = match cli.command {
        Commands::Deps { asset, filters } => {
            cli::deps::run(&session, &asset, Direction::Dependencies, &filters.into())
                .await
        }
        Commands::Refs { asset, filters } => {
            cli::deps::run(&session, &asset, Direction::Dependents, &filters.into())
                .await
        }
        Commands::Cycle { asset, kinds } => cli::cycles::run_one(&session, &asset, &kinds).await,
        Commands::Cycles { kinds } => cli::cycles::run_all(&session, &kinds).await,
        Commands::Path { from, to, kinds } => cli::path::run(&session, &from, &to, &kinds).await,
        Commands::Health { asset, kinds } => cli::health::run(&session, &asset, &kinds).await,
        Commands::Stats => cli::stats::run(&session).await,
    };

    session.close().await?;
    result
}

impl From<FilterArgs> for cli::deps::Filters {
    fn from(args: FilterArgs) -> Self {
        Self {
            depth: args.depth,
            kinds: args.kinds,
            allow_types: args.allow_types,
            deny_types: args.deny_types,
            breadth: args.breadth,
            no_native: args.no_native,
            packages: args.packages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_deps_with_filters() {
        let cli = Cli::try_parse_from([
            "assetgraph",
            "--manifest",
            "assets.jsonl",
            "deps",
            "/Game/A.A",
            "--depth",
            "2",
            "--kind",
            "hard",
            "--kind",
            "soft",
            "--deny-type",
            "World",
            "--no-native",
        ])
        .unwrap();

        assert_eq!(cli.manifest, Some(PathBuf::from("assets.jsonl")));
        match cli.command {
            Commands::Deps { asset, filters } => {
                assert_eq!(asset, "/Game/A.A");
                assert_eq!(filters.depth, Some(2));
                assert_eq!(filters.kinds, vec![ReferenceKind::Hard, ReferenceKind::Soft]);
                assert_eq!(filters.deny_types, vec!["World".to_string()]);
                assert!(filters.no_native);
            }
            other => panic!("Expected Deps command, got {other:?}"),
        }
    }

    #[test]
    fn parse_negative_depth_reaches_validation() {
        let cli = Cli::try_parse_from(["assetgraph", "refs", "/Game/A", "--depth", "-1"]).unwrap();
        match cli.command {
            Commands::Refs { filters, .. } => assert_eq!(filters.depth, Some(-1)),
            other => panic!("Expected Refs command, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let result = Cli::try_parse_from(["assetgraph", "cycles", "--kind", "weak"]);
        assert!(result.is_err());
    }

    #[test]
    fn allow_and_deny_types_conflict() {
        let result = Cli::try_parse_from([
            "assetgraph",
            "deps",
            "/Game/A",
            "--allow-type",
            "Material",
            "--deny-type",
            "World",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["assetgraph", "stats", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Stats));
    }
}

//! CLI argument parsing and command definitions.
//!
//! Global flags select the config file, verbosity, the endpoint and the
//! output format; subcommands map onto the engine's operations.

use clap::{Parser, Subcommand};
use skosnav_core::{OrphanStrategy, ResourceKind};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "skosnav", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "SKOSNAV_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// SPARQL endpoint URL; overrides `endpoint.url` from the config.
    #[arg(short, long, env = "SKOSNAV_ENDPOINT_URL", global = true)]
    pub endpoint: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the endpoint, gather statistics and store the analysis.
    Analyze {
        /// Re-analyze even when a fresh analysis is on record.
        #[arg(short, long)]
        force: bool,
    },

    /// List concept schemes.
    Schemes,

    /// Page through the root concepts of a scheme.
    Tree {
        /// Scheme IRI.
        #[arg(short, long)]
        scheme: String,

        /// Number of pages to load.
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },

    /// Page through the children of a concept or collection.
    Children {
        /// Parent IRI.
        uri: String,

        /// The parent is a collection.
        #[arg(long)]
        collection: bool,

        /// Scheme to flag children against.
        #[arg(short, long)]
        scheme: Option<String>,

        /// Number of pages to load.
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },

    /// Discover the collections of a scheme, stage by stage.
    Collections {
        /// Scheme IRI.
        #[arg(short, long)]
        scheme: String,

        /// Always run the property-path stage.
        #[arg(long)]
        paranoid: bool,
    },

    /// Find resources that no scheme places.
    Orphans {
        /// Resource kind: concept or collection.
        #[arg(short, long, default_value = "concept")]
        kind: ResourceKind,

        /// Strategy: auto, single-query or multi-query.
        #[arg(long)]
        strategy: Option<OrphanStrategy>,
    },

    /// Resolve the display label of a resource.
    Label {
        /// Resource IRI.
        uri: String,

        /// Resource kind: concept, scheme or collection.
        #[arg(short, long, default_value = "concept")]
        kind: ResourceKind,
    },

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "discovery.page_size").
        key: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================

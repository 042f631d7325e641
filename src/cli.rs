use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hivekeep")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Keep containers, networks and packages in their declared state",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(DesiredArgs),

    /// Converge live state to the desired state
    Apply(ApplyArgs),

    /// Write managed containers as a desired-state document
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect and control containers
    #[command(subcommand)]
    Containers(ContainersCommand),

    /// Inspect and create networks
    #[command(subcommand)]
    Networks(NetworksCommand),

    /// Inspect and install packages
    #[command(subcommand)]
    Packages(PackagesCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Desired state
// ============================================================================

#[derive(Args, Clone)]
pub struct DesiredArgs {
    /// Desired-state document (YAML or JSON)
    #[arg(short, long, env = "HIVEKEEP_DESIRED")]
    pub file: Option<PathBuf>,

    /// Extra package to keep installed (`name` or `name>=version`)
    #[arg(short, long = "package", value_name = "PACKAGE")]
    pub packages: Vec<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub desired: DesiredArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

// ============================================================================
// Containers
// ============================================================================

#[derive(Subcommand)]
pub enum ContainersCommand {
    /// List containers
    #[command(alias = "ls")]
    List {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,

        /// Only containers hivekeep manages
        #[arg(short, long)]
        managed: bool,
    },

    /// Show one container and its status
    #[command(alias = "inspect")]
    Describe { name: String },

    /// Start a managed container
    Start { name: String },

    /// Stop a managed container
    Stop { name: String },

    /// Remove a managed container
    #[command(alias = "rm")]
    Remove {
        name: String,

        /// Remove even if running
        #[arg(short, long)]
        force: bool,
    },
}

// ============================================================================
// Networks
// ============================================================================

#[derive(Subcommand)]
pub enum NetworksCommand {
    /// List networks
    #[command(alias = "ls")]
    List,

    /// Create a managed network
    Create {
        /// Network name (the configured network when omitted)
        name: Option<String>,
    },
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Subcommand)]
pub enum PackagesCommand {
    /// List installed packages
    #[command(alias = "ls")]
    List,

    /// Show what each repository offers for the given names
    Search {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Install or upgrade packages as one transaction
    Install {
        /// Packages (`name` or `name>=version`)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

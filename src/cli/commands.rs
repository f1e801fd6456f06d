//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// Singer tap for the Lightspeed Retail (R-Series) API
#[derive(Parser, Debug)]
#[command(name = "tap-lightspeed-rseries")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// State file (JSON) from a previous run
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Catalog file (JSON) with stream selection
    #[arg(long, alias = "properties")]
    pub catalog: Option<PathBuf>,

    /// Print the catalog and exit
    #[arg(long)]
    pub discover: bool,
}

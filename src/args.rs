use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON network description: a name, the layer list and optional solver
    /// settings.
    pub path: PathBuf,

    /// Seed for weight initialization. Drawn from the OS when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

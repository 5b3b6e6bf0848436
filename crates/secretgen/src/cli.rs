//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;
use secretgen_core::config::STDIN_PATH;
use secretgen_core::layout::DEFAULT_SECRETS_DIR;

/// secretgen - reproducible, age-encrypted secret generation
#[derive(Parser, Debug)]
#[command(name = "secretgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file, `-` reads standard input
    #[arg(short, long, default_value = STDIN_PATH)]
    pub config: Utf8PathBuf,

    /// age identity file of the generator
    #[arg(short, long, env = "SECRETGEN_IDENTITY")]
    pub identity: Utf8PathBuf,

    /// Directory holding `data/` and `entropy/`
    #[arg(short, long, default_value = DEFAULT_SECRETS_DIR)]
    pub secrets_dir: Utf8PathBuf,
}

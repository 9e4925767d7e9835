pub mod seed;
pub mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "bootcamp-seed")]
#[command(about = "Load or clear the sample bootcamp directory data")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Import users, bootcamps and courses, then compute average costs")]
    Import {
        #[arg(long, default_value = "data", help = "Directory holding users.json, bootcamps.json and courses.json")]
        data_dir: PathBuf,
    },

    #[command(about = "Delete every record from every collection")]
    Destroy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Import { data_dir } => seed::import(&data_dir, output_format).await,
        Commands::Destroy => seed::destroy(output_format).await,
    }
}

//! CLI commands.

mod join;
mod template;

#[cfg(test)]
pub(crate) use template::template_text;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Join worker nodes into an OpenWhisk cluster.
#[derive(Debug, Parser)]
#[command(name = "nodelift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve target nodes and join them into the cluster.
    Join(join::JoinCommand),

    /// Show or create the configuration template.
    Template(template::TemplateCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Join(cmd) => cmd.run().await,
            Commands::Template(cmd) => cmd.run(),
            Commands::Version => {
                println!("nodelift {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

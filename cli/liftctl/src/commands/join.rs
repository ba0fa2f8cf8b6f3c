//! `nodelift join` - resolve target nodes and join them.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use nodelift_provision::provider::ecs::EcsFactory;
use nodelift_provision::{ClusterTopology, KubectlMembership, Orchestrator, ScriptJoinExecutor};
use tracing::info;

use crate::config::{CliDefaults, ConfigDocument};
use crate::output;

#[derive(Debug, Args)]
pub struct JoinCommand {
    /// Config file path.
    #[arg(short, long, default_value = "./nodelift.yaml")]
    config: PathBuf,

    /// Node count to join, when the config document omits one.
    #[arg(long, default_value_t = 1)]
    node_count: usize,

    /// Working directory for the join script, when the config document
    /// omits one.
    #[arg(short = 'd', long, default_value = "/root/node-handler")]
    working_directory: PathBuf,
}

impl JoinCommand {
    pub async fn run(self) -> Result<()> {
        let document = ConfigDocument::load(&self.config)?;
        let plan = document.resolve(&CliDefaults {
            node_count: self.node_count,
            working_directory: self.working_directory,
        })?;

        if let ClusterTopology::Fixed(pool) = &plan.topology {
            output::print_candidates(&pool.candidates);
        }

        info!(
            node_count = plan.node_count,
            working_directory = %plan.working_directory.display(),
            "starting provisioning run"
        );

        let membership = KubectlMembership::default();
        let providers = EcsFactory;
        let executor = ScriptJoinExecutor;
        let orchestrator = Orchestrator::new(
            &membership,
            &providers,
            &executor,
            plan.working_directory.clone(),
        );

        orchestrator.run(&plan.topology, plan.node_count).await?;

        println!("{}", "Nodes joined.".green().bold());
        Ok(())
    }
}

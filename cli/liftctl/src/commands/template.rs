//! `nodelift template` - show or create the configuration template.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

const CONFIG_TEMPLATE: &str = r#"cluster-type: "fixed" # fixed joins machines from the candidate pool below; dynamic purchases instances first
fixed:
  ssh-port: 22
  user-name: "root"
  ssh-key-file: "/root/id_rsa" # private-key login; wins over password when both are set
  # password: "123456Abc" # password login
  nodes:
    - inner-ip: "172.17.0.2"
      host-name: "a"
    - inner-ip: "172.17.0.3"
      host-name: "b"
    - inner-ip: "172.17.0.4"
      host-name: "c"
dynamic:
  cloud-provider: "aliyun"
  aliyun:
    # Region the instances are purchased in.
    region-id: "cn-shenzhen"
    # Access key pair; may belong to a RAM user.
    access-key-id: "123456abcdef"
    access-key-secret: "asdfasdfasdf"
    # Launch template the instances are created from.
    template-id: "lt-lkjhasdfg"
    # Purchase period; leave unset for post-paid launch templates.
    # period: 1
    # period-unit: "Week" # Month or Week
    # Prefix for generated instance and host names, default "worker".
    host-name-prefix: "worker"
    # SSH port the created instances listen on, default 22.
    ssh-port: 22
    # Key pair registered in the ECS console; wins over password and
    # requires ssh-key-file.
    ssh-key-pair-name: "test-key"
    # Private key file matching ssh-key-pair-name.
    ssh-key-file: "/root/id_rsa"
    # Password login, used when no key pair is set.
    # password: "123456Abc"
    # Ask the provider to dry-run the purchase instead of buying.
    debug: false
# Command-line fallbacks; may be pinned here instead.
# node-count: 1
# working-directory: "/root/node-handler"
"#;

/// The embedded configuration template, exposed for config tests.
#[cfg(test)]
pub(crate) fn template_text() -> &'static str {
    CONFIG_TEMPLATE
}

#[derive(Debug, Args)]
pub struct TemplateCommand {
    #[command(subcommand)]
    command: TemplateSubcommand,
}

#[derive(Debug, Subcommand)]
enum TemplateSubcommand {
    /// Print the template to stdout.
    Show,

    /// Write (or overwrite) the template at the path.
    Create {
        /// Destination path for the config file.
        #[arg(short, long, default_value = "./nodelift.yaml")]
        path: PathBuf,
    },
}

impl TemplateCommand {
    pub fn run(self) -> Result<()> {
        match self.command {
            TemplateSubcommand::Show => {
                println!("{CONFIG_TEMPLATE}");
                Ok(())
            }
            TemplateSubcommand::Create { path } => {
                fs::write(&path, CONFIG_TEMPLATE)
                    .with_context(|| format!("failed to write template to {}", path.display()))?;
                println!("Template written to {}", path.display());
                Ok(())
            }
        }
    }
}

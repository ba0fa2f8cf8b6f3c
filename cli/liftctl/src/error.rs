//! Error display for the CLI.

use colored::Colorize;
use nodelift_provision::ProvisionError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    // Provide hints for the errors an operator can fix directly.
    if let Some(provision_err) = err.downcast_ref::<ProvisionError>() {
        match provision_err {
            ProvisionError::MissingCredential(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Set ssh-key-file (with ssh-key-pair-name for dynamic mode) or password in the config."
                        .yellow()
                );
            }
            ProvisionError::UnsupportedProvider(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Only cloud-provider \"aliyun\" is implemented.".yellow()
                );
            }
            ProvisionError::MembershipQueryFailed(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check that kubectl is installed and points at the cluster.".yellow()
                );
            }
            ProvisionError::DescribeFailed(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Instances may have been purchased but not joined; check the provider console."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}

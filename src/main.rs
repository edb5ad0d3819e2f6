//! Mastodon Upgrade - guided upgrades for self-hosted Mastodon instances.
//!
//! Exit codes: 0 on success, 1 on failure, 2 when the operator aborts.

use mastodon_upgrade::cli;
use mastodon_upgrade::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&suggestion);
                }
            }

            process::exit(e.exit_code());
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use toolgate::cli::Console;
use toolgate::permissions::{normalize_permission_origin, normalize_runtime_permission_origin};
use toolgate::{GateConfig, JsonFileStore, PermissionManager, Policy};

#[derive(Parser)]
#[command(name = "toolgate", version, about = "Inspect and resolve browser tool permissions")]
struct Cli {
    /// Rule store file (overrides TOOLGATE_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log directory (overrides TOOLGATE_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether a tool may run on a page
    Evaluate {
        tool: String,
        url: String,
        /// Report a pending request instead of prompting
        #[arg(long)]
        no_prompt: bool,
    },
    /// Always allow a tool (or tool pattern) on an origin (or origin pattern)
    Allow { tool: String, origin: String },
    /// Always deny a tool (or tool pattern) on an origin (or origin pattern)
    Deny { tool: String, origin: String },
    /// Remove a stored rule
    Remove { tool: String, origin: String },
    /// List stored rules
    List,
    /// Show how an origin would be stored
    Normalize {
        input: String,
        /// Normalize as a runtime request URL (no wildcards)
        #[arg(long)]
        runtime: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GateConfig::from_env();
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }
    if let Some(log_dir) = cli.log_dir {
        config = config.with_log_dir(log_dir);
    }

    toolgate::logging::init_logging(&config.log_dir)?;
    tracing::debug!("Configuration: {:?}", config);

    let console = Console::new();
    let mut manager = PermissionManager::new(JsonFileStore::with_path(&config.store_path))
        .with_storage_key(config.storage_key.clone());

    match cli.command {
        Command::Evaluate {
            tool,
            url,
            no_prompt,
        } => {
            let mut outcome = manager.evaluate_tool_permission(&tool, &url).await?;

            // One round trip: ask, apply, then evaluate again so a one-time
            // decision is consumed the way the extension would consume it
            if let Some(request) = outcome.request().cloned().filter(|_| !no_prompt) {
                let decision = console.ask_permission(&request)?;
                manager
                    .apply_tool_permission_decision(&request.request_id, decision)
                    .await?;
                outcome = manager.evaluate_tool_permission(&tool, &url).await?;
            }

            if cli.json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else {
                console.print_outcome(&tool, &url, &outcome);
            }
        }
        Command::Allow { tool, origin } => {
            let rule = manager
                .upsert_tool_permission_policy(&tool, &origin, Policy::Allow)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string(&rule)?);
            } else {
                console.print_rule(&rule);
            }
        }
        Command::Deny { tool, origin } => {
            let rule = manager
                .upsert_tool_permission_policy(&tool, &origin, Policy::Deny)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string(&rule)?);
            } else {
                console.print_rule(&rule);
            }
        }
        Command::Remove { tool, origin } => {
            let removed = manager.delete_tool_permission_policy(&tool, &origin).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else if removed {
                console.print_system(&format!("Removed rule {} @ {}", tool, origin));
            } else {
                console.print_system(&format!("No rule stored for {} @ {}", tool, origin));
            }
        }
        Command::List => {
            let rules = manager.list_tool_permission_policies().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else {
                console.print_rules(&rules);
            }
        }
        Command::Normalize { input, runtime } => {
            let normalized = if runtime {
                normalize_runtime_permission_origin(&input)
            } else {
                normalize_permission_origin(&input)
            };
            if cli.json {
                println!("{}", serde_json::json!({ "origin": normalized }));
            } else {
                match normalized {
                    Some(origin) => println!("{}", origin),
                    None => {
                        console.print_error(&format!("'{}' is not a valid permission origin", input));
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

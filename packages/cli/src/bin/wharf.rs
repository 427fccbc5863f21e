use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use std::process;
use wharf_cli::{init_tracing, run_server, WharfClient};
use wharf_config::Config;

#[derive(Parser)]
#[command(name = "wharf")]
#[command(about = "Wharf - per-workspace editor sandboxes with a browser terminal")]
#[command(version)]
struct Cli {
    /// Server URL for client commands (defaults to the configured API address)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Bind host (overrides WHARF_API_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides WHARF_API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start the sandbox for a workspace
    Start { workspace_id: String },
    /// Stop the sandbox for a workspace
    Stop { workspace_id: String },
    /// Run a one-shot command inside a workspace sandbox
    Exec {
        workspace_id: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List running workspaces
    List,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match handle_command(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

/// Returns the process exit code
async fn handle_command(cli: Cli) -> anyhow::Result<i32> {
    let mut config = Config::from_env()?;

    let client = || {
        let url = cli
            .server
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", config.api_host, config.api_port));
        WharfClient::new(url)
    };

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.api_host = host;
            }
            if let Some(port) = port {
                config.api_port = port;
            }
            init_tracing();
            run_server(config).await?;
            Ok(0)
        }
        Commands::Start { workspace_id } => {
            let result = client().start(&workspace_id).await?;
            println!(
                "{} Workspace {} running at {}",
                "✓".green().bold(),
                workspace_id.bold(),
                result.url.cyan()
            );
            Ok(0)
        }
        Commands::Stop { workspace_id } => {
            client().stop(&workspace_id).await?;
            println!("{} Workspace {} stopped", "✓".green().bold(), workspace_id.bold());
            Ok(0)
        }
        Commands::Exec {
            workspace_id,
            command,
        } => {
            let result = client().exec(&workspace_id, command).await?;
            print!("{}", result.output);
            Ok(i32::try_from(result.exit_code).unwrap_or(1))
        }
        Commands::List => {
            let workspaces = client().list().await?;
            if workspaces.is_empty() {
                println!("{}", "No running workspaces".yellow());
                return Ok(0);
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Workspace", "Status", "Port", "Sandbox", "Created"]);
            for workspace in &workspaces {
                table.add_row(vec![
                    workspace.id.clone(),
                    workspace.status.to_string(),
                    workspace.port.to_string(),
                    workspace.sandbox.name.clone(),
                    workspace.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
            Ok(0)
        }
    }
}

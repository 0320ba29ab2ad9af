use anyhow::Result;
use clap::Parser;
use spkit::config::DEFAULT_CONFIG_FILE;
use spkit::generate::{GenerateOptions, generate_types};
use spkit::resolve::SelectionStrategy;
use std::path::PathBuf;

/// spkit - SharePoint Kit
///
/// Resolve SharePoint content types to lists through Microsoft Graph and generate
/// TypeScript interfaces for their fields.
///
/// Authentication uses SHAREPOINT_ACCESS_TOKEN when set, otherwise the client
/// credentials from the config file or SHAREPOINT_TENANT_ID, SHAREPOINT_CLIENT_ID
/// and SHAREPOINT_CLIENT_SECRET.
///
/// Examples:
///   spkit generate                          # Use ./sharepoint.config.json
///   spkit generate --strategy all           # Generate for every matching list
///   spkit generate --clear-cache            # Forget cached list resolutions
#[derive(Parser, Debug)]
#[command(author, version = env!("SPKIT_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Microsoft Graph URL (defaults to https://graph.microsoft.com/v1.0)
    #[arg(long = "graph-url", value_name = "URL", global = true)]
    pub graph_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate TypeScript interfaces for the configured content types
    Generate(GenerateArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Path to the config file
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Never prompt; abort on the first failing content type
    #[arg(long)]
    pub non_interactive: bool,

    /// How to choose when a content type is found in several lists
    #[arg(long, value_enum)]
    pub strategy: Option<SelectionStrategy>,

    /// Clear the resolution cache and exit
    #[arg(long, conflicts_with = "update_cache")]
    pub clear_cache: bool,

    /// Ignore cached resolutions and resolve again
    #[arg(long)]
    pub update_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = spkit::runtime::RealRuntime;

    match cli.command {
        Commands::Generate(args) => {
            generate_types(
                &runtime,
                GenerateOptions {
                    config_path: args.config,
                    non_interactive: args.non_interactive,
                    strategy: args.strategy,
                    clear_cache: args.clear_cache,
                    update_cache: args.update_cache,
                    graph_url: cli.graph_url,
                },
            )
            .await?;
        }
    }
    Ok(())
}

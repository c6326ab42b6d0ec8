mod commands;

use clap::{Parser, Subcommand};
use stackforge_template::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Declarative CloudFormation stacks from KDL blueprints", long_about = None)]
struct Cli {
    /// Stack file (skips discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the stack template
    Render {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format (json, yaml)
        #[arg(short, long)]
        format: Option<Format>,
    },
    /// Check the stack file and print a summary
    Validate,
    /// Render and submit the stack to CloudFormation
    Deploy {
        /// Region (defaults to the stack file, then the AWS environment)
        #[arg(short, long)]
        region: Option<String>,
        /// Stack name (defaults to the stack file)
        #[arg(short = 'n', long)]
        stack_name: Option<String>,
        /// Acknowledge CAPABILITY_IAM
        #[arg(long)]
        capability_iam: bool,
        /// Submit without the dry-run preview
        #[arg(short, long)]
        yes: bool,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Render { output, format } => {
            commands::render::handle(config, output.as_deref(), format)?;
        }
        Commands::Validate => {
            commands::validate::handle(config)?;
        }
        Commands::Deploy {
            region,
            stack_name,
            capability_iam,
            yes,
        } => {
            let options = commands::deploy::DeployOptions {
                region,
                stack_name,
                capability_iam,
                yes,
            };
            commands::deploy::handle(config, options).await?;
        }
        Commands::Version => {
            println!("stackforge {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

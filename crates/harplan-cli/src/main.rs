mod config;
mod generate_cmd;
mod merge_cmd;
mod output;
mod parse_cmd;
mod ping_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use harplan_core::export::ExportFormat;
use harplan_core::plan::ArtifactKind;
use harplan_core::traffic::SourceFormat;

use config::{CliOverrides, HarplanConfig};

#[derive(Parser)]
#[command(
    name = "harplan",
    version,
    about = "Turn captured HTTP traffic into LLM-authored API test plans"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Provider settings shared by commands that talk to the model.
#[derive(clap::Args, Debug, Default)]
struct ProviderArgs {
    /// API base URL (overrides HARPLAN_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,
    /// Model or deployment name (overrides HARPLAN_MODEL)
    #[arg(long)]
    model: Option<String>,
    /// Azure api-version (overrides HARPLAN_API_VERSION)
    #[arg(long)]
    api_version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a harplan config file
    Init {
        /// API base URL
        #[arg(long, default_value = "https://api.openai.com/v1")]
        endpoint: String,
        /// Model or deployment name
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        /// Azure api-version (omit for OpenAI)
        #[arg(long)]
        api_version: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Normalize a HAR file or Postman collection and list its API requests
    Parse {
        /// Path to the capture file
        file: PathBuf,
        /// Input format (sniffed when omitted): har or postman
        #[arg(long)]
        format: Option<SourceFormat>,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a test artifact from a capture file
    Generate {
        /// Path to the capture file
        file: PathBuf,
        /// Input format (sniffed when omitted): har or postman
        #[arg(long)]
        format: Option<SourceFormat>,
        /// Artifact type: testPlan, testScenario, testCases, or code
        #[arg(long = "type", default_value = "testPlan")]
        kind: ArtifactKind,
        /// Output format: json, markdown, or playwright
        #[arg(long, default_value = "json")]
        export: ExportFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Fuzzy-merge tuning TOML overriding the built-in threshold and aliases
        #[arg(long)]
        tuning: Option<PathBuf>,
        /// Output token budget per request (overrides HARPLAN_TOKEN_SIZE)
        #[arg(long)]
        token_size: Option<u32>,
        /// Records per batch (overrides HARPLAN_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Merge saved partial artifacts into one plan
    Merge {
        /// Partial artifact JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// How to read the inputs: testPlan reads whole plans, other types only stories
        #[arg(long = "type", default_value = "testPlan")]
        kind: ArtifactKind,
        /// Output format: json, markdown, or playwright
        #[arg(long, default_value = "json")]
        export: ExportFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Fuzzy-merge tuning TOML overriding the built-in threshold and aliases
        #[arg(long)]
        tuning: Option<PathBuf>,
    },
    /// Check connectivity to the configured provider
    Ping {
        #[command(flatten)]
        provider: ProviderArgs,
    },
}

impl ProviderArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_version: self.api_version.clone(),
            ..CliOverrides::default()
        }
    }
}

fn cmd_init(
    endpoint: &str,
    model: &str,
    api_version: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let api_key = std::env::var(config::ENV_API_KEY).unwrap_or_default();
    let cfg = config::ConfigFile {
        provider: config::ProviderSection {
            endpoint: endpoint.to_string(),
            api_key: api_key.clone(),
            api_version: api_version.unwrap_or_default().to_string(),
            model: model.to_string(),
            timeout_secs: None,
        },
        generation: config::GenerationSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  provider.endpoint = {endpoint}");
    println!("  provider.model = {model}");
    if let Some(version) = api_version {
        println!("  provider.api_version = {version}");
    }
    println!();
    if api_key.is_empty() {
        println!(
            "Next: set provider.api_key in the config file (or export {}), then run `harplan ping`.",
            config::ENV_API_KEY
        );
    } else {
        println!("  provider.api_key = {}", config::mask_secret(&api_key));
        println!();
        println!("Next: run `harplan ping` to check the connection.");
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init {
            endpoint,
            model,
            api_version,
            force,
        } => cmd_init(&endpoint, &model, api_version.as_deref(), force),
        Commands::Parse { file, format, json } => parse_cmd::run_parse(&file, format, json),
        Commands::Generate {
            file,
            format,
            kind,
            export,
            output,
            tuning,
            token_size,
            batch_size,
            provider,
        } => {
            let overrides = CliOverrides {
                token_size,
                batch_size,
                ..provider.overrides()
            };
            let resolved = HarplanConfig::resolve(&overrides)?;
            let args = generate_cmd::GenerateArgs {
                file,
                format,
                kind,
                export,
                output,
                tuning,
            };
            generate_cmd::run_generate(&args, &resolved).await
        }
        Commands::Merge {
            files,
            kind,
            export,
            output,
            tuning,
        } => merge_cmd::run_merge(&merge_cmd::MergeArgs {
            files,
            kind,
            export,
            output,
            tuning,
        }),
        Commands::Ping { provider } => {
            let resolved = HarplanConfig::resolve(&provider.overrides())?;
            ping_cmd::run_ping(&resolved).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

//! Tracker Migration CLI
//!
//! CLI tool for migrating issue trees from Jira into ClickUp.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tracker_migrate::config::{DestinationConfig, SourceConfig};
use tracker_migrate::connectors::create_destination;
use tracker_migrate::pipeline::read_id_map;
use tracker_migrate::{DestinationSchema, LinkReconciler, MigrationConfig, Pipeline};

#[derive(Parser)]
#[command(name = "tracker-migrate")]
#[command(version)]
#[command(about = "Migrate Jira issue trees into ClickUp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings that take precedence over the configuration file.
#[derive(Args, Default)]
struct Overrides {
    /// Dry run mode (don't write to destination)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Page size override
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Start offset override (resume an aborted run)
    #[arg(long, global = true)]
    start_offset: Option<usize>,

    /// Raw Jira Authorization header value
    #[arg(long, env = "JIRA_AUTHORIZATION", hide_env_values = true, global = true)]
    jira_authorization: Option<String>,

    /// Jira API token (used with the configured email)
    #[arg(long, env = "JIRA_API_TOKEN", hide_env_values = true, global = true)]
    jira_api_token: Option<String>,

    /// ClickUp API key
    #[arg(long, env = "CLICKUP_API_KEY", hide_env_values = true, global = true)]
    clickup_api_key: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut MigrationConfig) {
        if self.dry_run {
            config.options.dry_run = true;
        }
        if let Some(size) = self.page_size {
            config.options.page_size = size;
        }
        if let Some(offset) = self.start_offset {
            config.options.start_offset = offset;
        }

        let SourceConfig::Jira(jira) = &mut config.source;
        if let Some(auth) = &self.jira_authorization {
            jira.authorization = Some(auth.clone());
        }
        if let Some(token) = &self.jira_api_token {
            jira.api_token = Some(token.clone());
        }

        let DestinationConfig::ClickUp(clickup) = &mut config.destination;
        if let Some(key) = &self.clickup_api_key {
            clickup.api_key = key.clone();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run migration from config file
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Show the destination field catalog and check the mappings against it
    Schema {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "migration.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Resolve stored link ids into destination relationships
    Links {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Identifier mapping written by a previous run
        #[arg(long, value_name = "FILE")]
        id_map: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Run { config }) => {
            run_migration(&config, &cli.overrides).await?;
        }
        Some(Commands::Validate { config }) => {
            validate_config(&config, &cli.overrides)?;
        }
        Some(Commands::Schema { config }) => {
            show_schema(&config, &cli.overrides).await?;
        }
        Some(Commands::Init { output, force }) => {
            generate_config(&output, force)?;
        }
        Some(Commands::Links { config, id_map }) => {
            reconcile_links(&config, id_map.as_deref(), &cli.overrides).await?;
        }
        None => {
            // Default: run migration if config provided
            if let Some(config) = cli.config {
                run_migration(&config, &cli.overrides).await?;
            } else {
                eprintln!("Usage: tracker-migrate --config <FILE> or tracker-migrate <COMMAND>");
                eprintln!("Try 'tracker-migrate --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(config_path: &Path, overrides: &Overrides) -> anyhow::Result<MigrationConfig> {
    info!("Loading configuration from {:?}", config_path);

    let mut config = MigrationConfig::from_file(config_path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run_migration(config_path: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;

    info!("Starting migration...");

    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.run().await?;
    let stats = &summary.stats;

    println!("\nMigration Complete!");
    println!("   Pages:       {}", stats.pages);
    println!("   Extracted:   {}", stats.extracted);
    println!("   Created:     {}", stats.created);
    println!("   Failed:      {}", stats.failed);
    println!("   Attachments: {}", stats.attachments);
    println!("   Comments:    {}", stats.comments);
    println!("   Duration:    {:.2}s", stats.duration_secs);

    if !summary.report.is_clean() {
        println!("\nFailures ({}):", summary.report.failures.len());
        for failure in &summary.report.failures {
            println!("   - {}", failure);
        }
    }

    Ok(())
}

fn validate_config(config_path: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;
    let SourceConfig::Jira(jira) = &config.source;
    let DestinationConfig::ClickUp(clickup) = &config.destination;

    println!("Configuration is valid!");
    println!("   Source:      jira ({})", jira.url);
    println!("   Query:       {}", jira.query);
    println!("   Destination: clickup list {}", clickup.list_id);
    println!("   Fields:      {}", config.fields.len());
    println!("   Page size:   {}", config.options.page_size);
    println!("   Delay:       {}ms", config.options.operation_delay_ms);

    Ok(())
}

async fn show_schema(config_path: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;
    let destination = create_destination(
        &config.destination,
        false,
        config.options.request_timeout(),
    )?;
    let schema = DestinationSchema::load(destination.as_ref()).await?;

    println!("\nDestination Schema ({} fields):", schema.len());
    for field in schema.fields() {
        println!("   - {} [{}] ({})", field.name, field.id, field.field_type);
        for option in field.options.options() {
            println!("       * {}", option.text);
        }
    }

    let missing: Vec<_> = config
        .fields
        .iter()
        .filter(|m| schema.field_id(&m.destination).is_err())
        .map(|m| m.destination.as_str())
        .collect();
    if missing.is_empty() {
        println!("\nAll {} mapped fields exist in the destination.", config.fields.len());
    } else {
        warn!("{} mapped fields are missing from the destination", missing.len());
        println!("\nMapped fields missing from the destination:");
        for name in missing {
            println!("   - {}", name);
        }
    }

    Ok(())
}

fn generate_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", output);
    }

    let template = serde_yaml::to_string(&MigrationConfig::template())?;
    std::fs::write(output, template)?;
    println!("Generated configuration: {:?}", output);
    println!(
        "   Edit the file and run: tracker-migrate run --config {:?}",
        output
    );

    Ok(())
}

async fn reconcile_links(
    config_path: &Path,
    id_map_path: Option<&Path>,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;
    let links = config
        .links
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("configuration has no `links` section"))?;

    let destination = create_destination(
        &config.destination,
        config.options.dry_run,
        config.options.request_timeout(),
    )?;

    let id_map_path = id_map_path
        .map(Path::to_path_buf)
        .or_else(|| config.options.id_map_path.clone())
        .filter(|p| p.exists());
    let id_map = match &id_map_path {
        Some(path) => {
            info!("Using identifier mapping from {:?}", path);
            Some(read_id_map(path).await?)
        }
        None => None,
    };

    let mut reconciler =
        LinkReconciler::new(destination.as_ref(), links).with_throttle(config.options.throttle());
    if let Some(ids) = &id_map {
        reconciler = reconciler.with_id_map(ids);
    }
    let stats = reconciler.run().await?;

    println!("\nLink pass complete!");
    println!("   Pages:      {}", stats.pages);
    println!("   Records:    {}", stats.records_scanned);
    println!("   Links:      {}", stats.links_added);
    println!("   Unresolved: {}", stats.unresolved.len());
    for entry in &stats.unresolved {
        println!("   - {}", entry);
    }
    for failure in &stats.failures {
        println!("   ! {}", failure);
    }

    Ok(())
}

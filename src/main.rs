//! MRP AI Optimizer CLI - answer business-data questions at minimal cost

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mrp_ai_optimizer::{
    api::OpenAiClient,
    config::Config,
    manager::{sample_snapshot, AskOptions, OptimizationManager, QueryPlan},
    selector::SelectionOptions,
    tui::{TerminalRenderer, WaitSpinner},
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "mrp-ai-optimizer")]
#[command(about = "Cache, model selection and context shrinking for MRP assistant queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question about the business data
    Ask {
        /// Question text
        query: String,

        /// JSON snapshot of the business data (default: built-in sample)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,

        /// Favor fast model tiers
        #[arg(long)]
        prioritize_speed: bool,

        /// Favor cheap model tiers
        #[arg(long)]
        prioritize_cost: bool,

        /// Favor accurate model tiers
        #[arg(long)]
        prioritize_accuracy: bool,

        /// Budget ceiling per request in USD
        #[arg(long)]
        max_cost: Option<f64>,
    },

    /// Show how a question would be classified, shrunk and routed
    Analyze {
        /// Question text
        query: String,

        /// JSON snapshot of the business data (default: built-in sample)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Run the pipeline over sample queries without calling a model
    Benchmark {
        /// Custom queries (repeatable)
        #[arg(short, long)]
        query: Vec<String>,
    },

    /// Show cache and usage statistics
    Stats,

    /// Show system health
    Status,

    /// Clear persisted per-model usage statistics
    ResetStats,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show only specific section (api, cache, selector, context, storage)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Ask {
            query,
            data,
            no_cache,
            prioritize_speed,
            prioritize_cost,
            prioritize_accuracy,
            max_cost,
        } => {
            let mut config = Config::load_from(config_path)?;
            config.selector.prioritize_speed |= prioritize_speed;
            config.selector.prioritize_cost |= prioritize_cost;
            config.selector.prioritize_accuracy |= prioritize_accuracy;
            if max_cost.is_some() {
                config.selector.max_cost_per_request = max_cost;
            }
            run_ask(&config, &query, data.as_deref(), no_cache).await?;
        }
        Commands::Analyze { query, data } => {
            let config = Config::load_from(config_path)?;
            run_analyze(&config, &query, data.as_deref())?;
        }
        Commands::Benchmark { query } => {
            let config = Config::load_from(config_path)?;
            let manager = OptimizationManager::from_config(&config);
            let queries = if query.is_empty() { None } else { Some(query.as_slice()) };
            let report = manager.run_performance_test(queries);
            TerminalRenderer::new().render_report(&report);
        }
        Commands::Stats => {
            let config = Config::load_from(config_path)?;
            let manager = OptimizationManager::from_config(&config);
            TerminalRenderer::new().render_report(&manager.get_performance_stats());
        }
        Commands::Status => {
            let config = Config::load_from(config_path)?;
            let manager = OptimizationManager::from_config(&config);
            TerminalRenderer::new().render_status(&manager.get_system_status());
        }
        Commands::ResetStats => {
            let config = Config::load_from(config_path)?;
            let manager = OptimizationManager::from_config(&config);
            manager.selector().reset_stats()?;
            TerminalRenderer::new().render_success("Usage statistics cleared");
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, &config_path)?;
        }
    }

    Ok(())
}

fn load_data(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let data = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            Ok(data)
        }
        None => {
            info!("No data file given, using the built-in sample snapshot");
            Ok(sample_snapshot())
        }
    }
}

async fn run_ask(config: &Config, query: &str, data: Option<&Path>, no_cache: bool) -> Result<()> {
    let renderer = TerminalRenderer::new();
    let data = load_data(data)?;

    let client = OpenAiClient::new(config.openai_config()?)?;
    let manager = OptimizationManager::from_config(config);
    manager.initialize(config.cache.to_cache_config());

    let options = AskOptions {
        selection: config.selector.selection_options(),
        enable_cache: config.cache.enabled,
        skip_cache: no_cache,
        ..AskOptions::default()
    };

    let mut spinner = WaitSpinner::new();
    spinner.start("Thinking...");
    let result = manager.ask(query, &data, &client, &options).await;
    spinner.stop();
    manager.shutdown();

    match result {
        Ok(answer) => renderer.render_answer(&answer),
        Err(e) => {
            renderer.render_error(&e.to_string());
            return Err(e.into());
        }
    }

    Ok(())
}

fn run_analyze(config: &Config, query: &str, data: Option<&Path>) -> Result<()> {
    let renderer = TerminalRenderer::new();
    let data = load_data(data)?;
    let manager = OptimizationManager::from_config(config);
    let options: SelectionOptions = config.selector.selection_options();

    let QueryPlan { context, model } = manager.plan(query, &data, None, &options);
    let meta = &context.metadata;

    println!("=== Query Analysis ===");
    renderer.render_field("Categories:", format!("{:?}", meta.analysis.categories));
    renderer.render_field("Operations:", format!("{:?}", meta.analysis.operations));
    renderer.render_field("Time scope:", format!("{:?}", meta.analysis.time_scope));
    renderer.render_field("Confidence:", format!("{:.2}", meta.confidence));
    renderer.render_field("Complex:", meta.analysis.is_complex);
    println!();

    println!("=== Relevance ===");
    for (category, weight) in meta.relevance.iter() {
        renderer.render_field(category.key(), format!("{:.1}", weight));
    }
    println!();

    println!("=== Context ===");
    renderer.render_field("Strategy:", meta.strategy);
    let included: Vec<&str> = meta.included_categories.iter().map(|c| c.key()).collect();
    renderer.render_field("Included:", included.join(", "));
    renderer.render_field(
        "Size:",
        format!(
            "{} -> {} est. tokens ({:.1}% smaller)",
            meta.original_size, meta.optimized_size, meta.reduction_percent
        ),
    );
    println!();

    println!("=== Model ===");
    renderer.render_field("Selected:", model.model_name());
    renderer.render_field("Complexity:", model.complexity);
    renderer.render_field("Temperature:", model.temperature);
    renderer.render_field("Max output tokens:", model.max_output_tokens);
    renderer.render_field("Est. cost:", format!("${:.5}", model.estimated_cost));
    for score in manager
        .selector()
        .score_tiers(model.complexity, &model.tokens, &options)
    {
        let mut notes = Vec::new();
        if !score.fits_context {
            notes.push("overflows context");
        }
        if !score.within_budget {
            notes.push("over budget");
        }
        renderer.render_field(
            &format!("  {}", score.name),
            format!(
                "score {:>6.1}  ${:.5} {}",
                score.score,
                score.estimated_cost,
                notes.join(", ")
            ),
        );
    }

    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            config_init(force, path)?;
        }
        ConfigCommands::Show { section } => {
            config_show(section, path)?;
        }
        ConfigCommands::Path => {
            config_path(path);
        }
        ConfigCommands::Validate => {
            config_validate(path)?;
        }
    }
    Ok(())
}

fn config_init(force: bool, path: &Path) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.to_path_buf())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to add your API key, or");
    println!("  2. Set the environment variable:");
    println!("     export OPENAI_API_KEY=your_key");

    Ok(())
}

fn config_show(section: Option<String>, path: &Path) -> Result<()> {
    let config = Config::load_from(path.to_path_buf())?;

    let display = if let Some(sec) = section {
        match sec.to_lowercase().as_str() {
            "api" => {
                let mut api = config.api.clone();
                if api.api_key.is_some() {
                    api.api_key = Some("***".to_string());
                }
                toml::to_string_pretty(&api)?
            }
            "cache" => toml::to_string_pretty(&config.cache)?,
            "selector" => toml::to_string_pretty(&config.selector)?,
            "context" => toml::to_string_pretty(&config.context)?,
            "storage" => toml::to_string_pretty(&config.storage)?,
            _ => {
                println!("Unknown section: {}", sec);
                println!("Available: api, cache, selector, context, storage");
                return Ok(());
            }
        }
    } else {
        let mut display_config = config.clone();
        if display_config.api.api_key.is_some() {
            display_config.api.api_key = Some("***".to_string());
        }
        toml::to_string_pretty(&display_config)?
    };

    println!("{}", display);

    println!("\n--- Environment Variables ---");
    for name in ["OPENAI_API_KEY", "OPENAI_BASE_URL", "MRP_AI_CACHE_DURATION_SECS", "MRP_AI_CACHE_MAX_SIZE"] {
        let status = match std::env::var(name) {
            Ok(_) if name == "OPENAI_API_KEY" => "set".to_string(),
            Ok(value) => value,
            Err(_) => "not set".to_string(),
        };
        println!("{}: {}", name, status);
    }

    Ok(())
}

fn config_path(path: &Path) {
    println!("{}", path.display());

    if path.exists() {
        println!("(file exists)");
    } else {
        println!("(file does not exist - run 'config init' to create)");
    }
}

fn config_validate(path: &Path) -> Result<()> {
    let config = Config::load_from(path.to_path_buf())?;

    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid!");
            println!();
            if config.api_key().is_some() {
                println!("  API: {} (key set)", config.api.base_url);
            } else {
                println!("  API: {} but NO API KEY", config.api.base_url);
            }
            if config.cache.enabled {
                println!(
                    "  Cache: enabled ({} entries, {} s)",
                    config.cache.max_size, config.cache.duration_secs
                );
            } else {
                println!("  Cache: disabled");
            }
            let tiers: Vec<&str> = config.selector.tiers.iter().map(|t| t.name.as_str()).collect();
            println!("  Model tiers: {}", tiers.join(", "));
            println!("  Usage stats: {}", config.storage.usage_stats_path().display());
        }
        Err(e) => {
            println!("Configuration validation failed:");
            println!("  {}", e);
        }
    }

    Ok(())
}

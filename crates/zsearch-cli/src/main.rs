use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zsearch_api::{ContentSize, RecencyFilter, SearchEngine};
use zsearch_core::{Config, OutputFormat, Renderer, SearchBackend, ToolServer};

#[derive(Parser)]
#[command(name = "zsearch")]
#[command(version, about = "Web search from the terminal via the Zhipu BigModel API", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "ZSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// API key (overrides BIGMODEL_API_KEY and the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Endpoint URL (overrides ZSEARCH_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a single web search and print the response
    Search {
        /// Search query (quoting is optional)
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// search_std, search_pro, search_pro_sogou, search_pro_quark, search_pro_jina, search_pro_bing
        #[arg(short, long)]
        engine: Option<SearchEngine>,

        /// Number of results, 1-50
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// oneDay, oneWeek, oneMonth, oneYear or noLimit
        #[arg(short, long)]
        recency: Option<RecencyFilter>,

        /// Only return results from this domain
        #[arg(short, long)]
        domain: Option<String>,

        /// medium or high
        #[arg(long)]
        content_size: Option<ContentSize>,

        /// Let the service run intent recognition on the query first
        #[arg(long)]
        intent: bool,

        /// json (raw response), text or markdown
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },
    /// Serve the web-search tool over stdio (Model Context Protocol)
    Serve,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration (API key masked)
    Show,
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env has to be loaded before clap reads ZSEARCH_CONFIG and before RUST_LOG is consulted
    let dotenv_path = dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout is reserved for results and protocol traffic
    let default_filter = if cli.verbose {
        "zsearch=debug,zsearch_api=debug,zsearch_core=debug"
    } else {
        "zsearch=info,zsearch_api=warn,zsearch_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = dotenv_path {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    match cli.command {
        Commands::Search {
            query,
            engine,
            count,
            recency,
            domain,
            content_size,
            intent,
            format,
        } => {
            let config = resolve_config(&config_path, cli.api_key, cli.base_url)?;

            let mut request = config.request(query.join(" ")).domain(domain).intent(intent);
            if let Some(engine) = engine {
                request = request.engine(engine);
            }
            if let Some(count) = count {
                request = request.count(count);
            }
            if let Some(recency) = recency {
                request = request.recency(recency);
            }
            if let Some(size) = content_size {
                request = request.content_size(size);
            }

            tracing::info!("Searching for: {}", request.search_query);
            let client = config.client()?;
            let raw = SearchBackend::search(&client, &request).await?;
            println!("{}", Renderer::render(&raw, format)?);
        }
        Commands::Serve => {
            let config = resolve_config(&config_path, cli.api_key, cli.base_url)?;
            let client = config.client()?;
            let server = ToolServer::new(Box::new(client), config.search.clone());
            server.serve_stdio().await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => {
                println!("{}", config_path.display());
            }
            ConfigAction::Show => {
                let config = resolve_config(&config_path, cli.api_key, cli.base_url)?;
                let rendered = toml::to_string_pretty(&config.redacted())
                    .context("Failed to render config")?;
                print!("{}", rendered);
            }
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                let mut config = Config::default();
                config.api.key = cli.api_key;
                config.save_to(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}

/// File, then environment, then command-line flags
fn resolve_config(
    path: &std::path::Path,
    api_key: Option<String>,
    base_url: Option<String>,
) -> anyhow::Result<Config> {
    let mut config = Config::load_from(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env();
    config.apply_overrides(api_key, base_url);
    Ok(config)
}

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use mapstate::import::HttpFetcher;
use mapstate::import::HttpKmlMetadataProvider;
use mapstate::prelude::*;
use std::path::PathBuf;

/// Translates viewer permalinks and checks KML/GPX files before import
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Service preset: production, integration or development
    #[arg(long, default_value = "production")]
    env: String,

    /// JSON configuration file overriding the preset
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical form of a permalink
    Translate {
        url: String,
        /// Also print the resulting state as JSON
        #[arg(long)]
        state: bool,
        /// Resolve a drawing admin id through the KML service
        #[arg(long)]
        resolve_admin: bool,
        /// Flag layers missing from the live layer catalog
        #[arg(long)]
        catalog: bool,
    },
    /// Validate a KML or GPX file, given as URL or local path
    Validate { source: String },
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    if let Some(path) = &cli.config {
        return SyncConfig::from_json_file(path)
            .map_err(|e| anyhow!("reading {}: {}", path.display(), e));
    }
    let env = match cli.env.as_str() {
        "production" => Environment::Production,
        "integration" => Environment::Integration,
        "development" => Environment::Development,
        other => return Err(anyhow!("unknown environment {:?}", other)),
    };
    Ok(env.resolve())
}

struct TranslateArgs<'a> {
    url: &'a str,
    state: bool,
    resolve_admin: bool,
    catalog: bool,
}

async fn translate(config: SyncConfig, args: TranslateArgs<'_>) -> anyhow::Result<()> {
    let TranslateArgs {
        url,
        state,
        resolve_admin,
        catalog,
    } = args;
    let base = PermalinkUrl::parse(url)
        .map_err(|e| anyhow!("{}", e))?
        .base;
    let provider = HttpKmlMetadataProvider::from_config(&config.services);

    let mut controller = if catalog {
        let loaded = InMemoryCatalog::load(&config.services.layers_config_url)
            .await
            .map_err(|e| anyhow!("loading layer catalog: {}", e))?;
        log::info!("layer catalog has {} entries", loaded.len());
        MapController::new(config).with_catalog(Arc::new(loaded))
    } else {
        MapController::new(config)
    };

    let provider = resolve_admin.then_some(&provider as &dyn KmlMetadataProvider);
    controller
        .load_permalink(url, provider)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    println!("{}", controller.permalink_url(&base));
    for layer in controller.active_layers().iter() {
        if let Some(error) = &layer.error {
            log::warn!("{}", error);
        }
    }
    if let Some(query) = &controller.state().search_query {
        log::info!("legacy search query: {}", query);
    }
    if state {
        println!("{}", serde_json::to_string_pretty(controller.state())?);
    }
    Ok(())
}

async fn validate(config: SyncConfig, source: &str) -> anyhow::Result<bool> {
    let fetcher = Arc::new(HttpFetcher::new(
        config.services.http_timeout(),
        config.import.max_size_bytes,
    ));
    let validator = ImportValidator::new(fetcher, &config.import);

    let source = if source.starts_with("http://") || source.starts_with("https://") {
        ImportSource::url(source)
    } else {
        let content = std::fs::read(source).with_context(|| format!("reading {}", source))?;
        ImportSource::file(source, content)
    };

    let outcome = validator.validate(source).await;
    for warning in &outcome.result.warnings {
        log::warn!("{}", warning);
    }
    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    if let Some(document) = &outcome.document {
        println!("{} features", document.features.len());
    }
    Ok(outcome.result.is_ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Translate {
            url,
            state,
            resolve_admin,
            catalog,
        } => {
            let args = TranslateArgs {
                url,
                state: *state,
                resolve_admin: *resolve_admin,
                catalog: *catalog,
            };
            translate(config, args).await
        }
        Commands::Validate { source } => {
            if !validate(config, source).await? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

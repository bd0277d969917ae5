use clap::Parser;
use supermarket_ingestion::cli::{Cli, Commands};
use supermarket_ingestion::{AppConfig, ImportService, ParserRegistry};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("supermarket_ingestion=debug".parse()?)
                .add_directive("mongodb=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let command = cli.command();
    if command == Commands::ListParsers {
        list_parsers();
        return Ok(());
    }

    let mut config = AppConfig::load()?;
    command.apply_to(&mut config);
    debug!(
        "Environment: DATABASE_TYPE={:?}, DUMPS_FOLDER={}",
        config.database_type,
        config.import.dumps_folder.display()
    );

    info!("Starting supermarket import: {:?}", command);
    let service = ImportService::new(config).await?;

    let outcome = run_command(&service, command).await;
    service.close().await?;
    outcome
}

async fn run_command(service: &ImportService, command: Commands) -> Result<(), BoxError> {
    match command {
        Commands::Stats => {
            let stats = service.orchestrator().get_stats().await?;
            println!("stores:     {}", stats.stores);
            println!("prices:     {}", stats.prices);
            println!("promotions: {}", stats.promotions);
        }
        Commands::CreateIndexes => {
            service.orchestrator().create_indexes().await?;
            println!("indexes created");
        }
        Commands::Import { provider, .. } => {
            let clear = service.config().import.clear_existing;
            let stats = service.trigger_import(&provider, clear).await?;
            println!("{}: {}", provider, stats);
        }
        Commands::ImportAll { .. } => {
            let results = service.trigger_import_all().await?;
            for (provider, stats) in &results {
                println!("{:<20} {}", provider, stats);
            }
        }
        Commands::ListParsers => list_parsers(),
    }
    Ok(())
}

fn list_parsers() {
    let registry = ParserRegistry::with_default_providers();

    let implemented = registry.list_implemented();
    println!("Implemented ({}):", implemented.len());
    for name in &implemented {
        println!("  {}", name);
    }

    let skeletons = registry.list_skeletons();
    println!("Not yet implemented ({}):", skeletons.len());
    for name in &skeletons {
        println!("  {}", name);
    }
}

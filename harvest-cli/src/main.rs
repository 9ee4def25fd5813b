use clap::{Parser, Subcommand};
use harvest_core::{BootstrapReport, Catalog, Config};
use harvest_types::EntityKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "harvest", about = "Maintenance commands for the food bank resource site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing tables and add demo rows to empty ones.
    Seed,
    /// Drop and recreate every table.
    Reset {
        /// Leave the tables empty.
        #[arg(long)]
        empty: bool,
    },
    /// Print every row of one table as JSON.
    List {
        /// Table name or URL slug, e.g. `guidebooks` or `implementation-plans`.
        entity: EntityKind,
    },
    /// Report whether each table exists and how many rows it holds.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,harvest_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let catalog = Catalog::new(config.backend.open()?, config.auto_seed);

    let result = run(&catalog, cli.command).await;
    catalog.close().await?;
    result
}

async fn run(catalog: &Catalog, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Seed => print_report(&catalog.seed_demo_data().await?),
        Command::Reset { empty } => {
            let report = catalog.reset(!empty).await?;
            println!("schema recreated");
            print_report(&report);
        }
        Command::List { entity } => {
            let rows = catalog.list_records(entity).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Check => {
            println!("backend: {}", catalog.store().backend());
            for table in catalog.status().await? {
                match table.rows {
                    Some(rows) => println!("{:<24} {rows} rows", table.kind.table_name()),
                    None => println!("{:<24} missing", table.kind.table_name()),
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &BootstrapReport) {
    if report.inserted.is_empty() {
        println!("no demo rows needed");
    }
    for (kind, rows) in &report.inserted {
        println!("{:<24} +{rows}", kind.table_name());
    }
}

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use splitpay::application::orchestrator::PaymentOrchestrator;
use splitpay::config::{Config, WebhookSecret};
use splitpay::domain::distribution::{Environment, FeePolicy};
use splitpay::domain::ports::{ContractorAccountsBox, DistributionStoreBox, GatewayBox};
use splitpay::infrastructure::in_memory::{DerivedContractorAccounts, InMemoryDistributionStore};
use splitpay::infrastructure::stripe::StripeGateway;
use splitpay::interfaces::csv::quote::quote_all;
use splitpay::interfaces::http::{AppState, create_router};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the payment API server
    Serve {
        /// Address to listen on; overrides SPLITPAY_BIND
        #[arg(long)]
        bind: Option<String>,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Quote the fee split for each row of a CSV file
    Quote {
        /// Input CSV with `total_amount,complexity` rows
        input: PathBuf,

        /// Fee profile: development, staging or production
        #[arg(long, default_value = "production")]
        environment: Environment,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}

fn distribution_store(db_path: Option<PathBuf>) -> Result<DistributionStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = splitpay::infrastructure::rocksdb::RocksDBDistributionStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryDistributionStore::new()))
        }
        None => Ok(Box::new(InMemoryDistributionStore::new())),
    }
}

async fn serve(bind: Option<String>, db_path: Option<PathBuf>) -> Result<()> {
    let distributions = distribution_store(db_path)?;
    let config = Config::from_env().into_diagnostic()?;
    init_tracing(config.log_json);

    let gateway: GatewayBox = Box::new(StripeGateway::from_config(&config).into_diagnostic()?);
    let accounts: ContractorAccountsBox = Box::new(DerivedContractorAccounts);
    let orchestrator = PaymentOrchestrator::new(gateway, distributions, accounts, config.fee_policy())
        .with_payout_currency(config.payout_currency.clone());

    let app = create_router(AppState::new(orchestrator, WebhookSecret::default()));

    let bind = bind.unwrap_or(config.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await.into_diagnostic()?;
    info!(%bind, environment = ?config.environment, "Payment API listening");
    axum::serve(listener, app).await.into_diagnostic()?;

    Ok(())
}

fn quote(input: PathBuf, environment: Environment) -> Result<()> {
    init_tracing(false);

    let file = File::open(input).into_diagnostic()?;
    let stdout = io::stdout();
    quote_all(&FeePolicy::for_environment(environment), file, stdout.lock()).into_diagnostic()?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, db_path } => serve(bind, db_path).await,
        Command::Quote { input, environment } => quote(input, environment),
    }
}

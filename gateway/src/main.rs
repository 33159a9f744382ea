//! Wallet Gateway binary entry point.
//!
//! Wires the concrete Postgres/chain/cache adapters into the gateway core
//! and either serves the HTTP/WebSocket API plus its background loops
//! (`serve`), or runs schema migrations (`migrate`).

use std::sync::Arc;

use chain_client::StandardEvmProvider;
use clap::{Parser, Subcommand};
use gateway::api::{self, AppState};
use gateway::config::Settings;
use gateway::housekeeper::Housekeeper;
use gateway::indexer::BlockMonitor;
use gateway::intake::Intake;
use gateway::notifier::{Notifier, NotifierPort, QueuePassTrigger};
use gateway::ports::GasOracle;
use gateway::queue::{QueueProcessor, QueueProcessorHandle};
use gateway::store::{
    CompositeDispatcher, HttpGasOracle, MemoryCache, PostgresStore, PushEndpoints, WsRegistry,
};
use gateway::types::primitives::{EthAddress, WeiAmount};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "wallet-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Deployment environment, selects `config/{environment}.toml`.
    #[arg(short, long, env = "APP_ENV", default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP/WebSocket API and run the background loops (Block
    /// Monitor, Housekeeper) until terminated.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Print version information and exit.
    Version,
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// A gas oracle that always returns the configured fallback reading, used
/// when no oracle URL is configured.
#[derive(Debug, Clone, Copy)]
struct StaticGasOracle {
    reading: gateway::ports::GasPriceReading,
}

#[async_trait::async_trait]
impl GasOracle for StaticGasOracle {
    async fn fetch(&self) -> gateway::error::Result<gateway::ports::GasPriceReading> {
        Ok(self.reading)
    }
}

async fn serve(settings: Settings) -> eyre::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(settings.database.connect_timeout())
        .idle_timeout(settings.database.idle_timeout())
        .connect(&settings.database.dsn)
        .await?;

    let store = PostgresStore::new(pool);
    store.run_migrations().await?;

    let cache = Arc::new(MemoryCache::new());
    let chain = Arc::new(StandardEvmProvider::new(&settings.ethereum.url).await?);

    let fallback_gas_price = WeiAmount::parse(&settings.ethereum.fallback_gas_price_wei)
        .map_err(|e| eyre::eyre!("invalid ethereum.fallback_gas_price_wei: {e}"))?;

    let gas_oracle: Arc<dyn GasOracle> = match &settings.gas_oracle.url {
        Some(url) => Arc::new(HttpGasOracle::new(
            url.clone(),
            settings.gas_oracle.request_timeout(),
        )?),
        None => Arc::new(StaticGasOracle {
            reading: gateway::ports::GasPriceReading {
                average: fallback_gas_price,
                safe_low: fallback_gas_price,
            },
        }),
    };

    let ws = WsRegistry::new();
    let push = PushEndpoints {
        gcm_url: settings
            .push
            .gcm
            .enabled
            .then(|| "https://fcm.googleapis.com/fcm/send".to_string()),
        gcm_key: settings.push.gcm.enabled.then(|| settings.push.gcm.api_key.clone()),
        apn_url: settings.push.apn.enabled.then(|| {
            if settings.push.apn.sandbox {
                "https://api.sandbox.push.apple.com".to_string()
            } else {
                "https://api.push.apple.com".to_string()
            }
        }),
    };
    let dispatcher = Arc::new(CompositeDispatcher::new(ws.clone(), reqwest::Client::new(), push));

    let queue_processor = Arc::new(QueueProcessor::new(
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&chain),
        settings.ethereum.network_id,
    ));
    let queue_handle = QueueProcessorHandle::new(Arc::clone(&queue_processor));

    let notifier: Arc<dyn NotifierPort> = Arc::new(Notifier::new(
        Arc::new(store.clone()),
        Arc::clone(&dispatcher),
        Arc::new(queue_handle.clone()),
        settings.ethereum.network_id,
    ));
    queue_processor.set_notifier(Arc::clone(&notifier));
    let self_trigger: Arc<dyn QueuePassTrigger> = Arc::new(queue_handle.clone());
    queue_processor.set_self_trigger(Arc::clone(&self_trigger));

    let intake = Arc::new(Intake::new(
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&chain),
        Arc::clone(&notifier),
        settings.ethereum.network_id,
        settings.ethereum.default_gas,
        fallback_gas_price,
    ));

    let weth_address = settings
        .ethereum
        .weth_address
        .as_deref()
        .map(EthAddress::from_hex)
        .transpose()
        .map_err(|e| eyre::eyre!("invalid ethereum.weth_address: {e}"))?;

    let block_monitor = Arc::new(BlockMonitor::new(
        store.clone(),
        Arc::clone(&chain),
        Arc::clone(&notifier),
        settings.ethereum.confirmations_required,
        settings.ethereum.max_blocks_per_tick,
        weth_address,
    ));

    let housekeeper = Arc::new(Housekeeper::new(
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&chain),
        Arc::clone(&gas_oracle),
        self_trigger,
        settings.ethereum.network_id,
        settings.housekeeper.stale_sender_max_age_secs,
    ));

    // Seed the gas-price floor synchronously so the Queue Processor never
    // defers its first pass for want of a cached value; the refresh loop
    // below keeps it current afterward.
    if let Err(err) = housekeeper.refresh_gas_price().await {
        tracing::warn!(%err, "initial gas-price refresh failed, relying on fallback only");
        cache.set_gas_price_floor(fallback_gas_price, fallback_gas_price);
    }

    tokio::spawn(Arc::clone(&block_monitor).run_loop(settings.ethereum.poll_interval()));
    tokio::spawn(Arc::clone(&housekeeper).run_sanity_sweep_loop(settings.housekeeper.sanity_interval()));
    tokio::spawn(Arc::clone(&housekeeper).run_gas_refresh_loop(settings.gas_oracle.poll_interval()));

    let state = AppState {
        intake,
        queue: queue_processor,
        store,
        chain,
        ws,
        network_id: settings.ethereum.network_id,
    };

    let router = api::build_router(state);
    let addr = settings.api.socket_addr();
    info!(%addr, "starting wallet gateway");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn migrate(settings: &Settings) -> eyre::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.dsn)
        .await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    info!("migrations applied");
    Ok(())
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("wallet-gateway {}", gateway::VERSION);
        return Ok(());
    }

    let settings = Settings::load(&cli.environment)?;
    if let Err(errors) = settings.validate() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        eyre::bail!("invalid configuration ({} error(s))", errors.len());
    }

    init_tracing(&settings);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Commands::Serve => serve(settings).await,
            Commands::Migrate => migrate(&settings).await,
            Commands::Version => unreachable!("handled above"),
        }
    })
}

use challenge_buddy::{
    config::{self, database},
    core::catalog::seed_catalog,
    errors::Result,
    scheduler::TransitionScheduler,
    service::ChallengeService,
};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = Arc::new(
        config::load_default_config()
            .inspect_err(|e| error!("Failed to load configuration: {}", e))?,
    );
    info!("Configuration loaded.");

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the item and avatar catalogs
    seed_catalog(&db, &app_config)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;

    // 6. Start the scheduled transition job
    let db = Arc::new(db);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler =
        TransitionScheduler::new(Arc::clone(&db), Arc::clone(&app_config)).spawn(shutdown_rx);

    let service = ChallengeService::new(db, Arc::clone(&app_config));
    info!(
        max_members = service.config().rules.max_members,
        "Challenge engine ready, press Ctrl-C to stop"
    );

    // 7. Wait for shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown_tx.send(true).ok();
    if let Err(e) = scheduler.await {
        error!("Scheduler task ended abnormally: {}", e);
    }

    Ok(())
}

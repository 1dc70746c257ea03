use std::sync::Arc;

use journey::config::AppConfig;
use journey::db::{init_pool, run_migrations};
use journey::error::AppError;
use journey::routes::create_router;
use journey::services::{
    mailer::SmtpMailer,
    store::{SqliteStore, TripStore},
};
use journey::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = run_migrations(&db).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let store: Arc<dyn TripStore> = Arc::new(SqliteStore::new(db));
    let mailer = Arc::new(SmtpMailer::new(&config, store.clone()));
    info!(
        smtp_host = %config.smtp_host,
        smtp_port = config.smtp_port,
        "mail submission configured"
    );

    let state = AppState::new(config.clone(), store, mailer);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,journey=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

//! f1db server: settings from the environment, schema bootstrap, then serve the catalog tables.
//!
//! Run from repo root: `cargo run -p f1db-server`

use f1db::routes::with_http_layers;
use f1db::{
    app_routes, apply_schema, bootstrap_admin, ensure_database_exists, load_catalog, resolve, AppState, SessionStore,
    Settings,
};
use std::time::Duration;
use tokio::net::TcpListener;

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("f1db=info,f1db_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let catalog = load_catalog(settings.catalog_path.as_deref()).await?;
    let model = resolve(&catalog)?;
    if settings.auto_migrate {
        apply_schema(&pool, &model).await?;
    }
    if let Some((username, password)) = settings.admin_seed() {
        bootstrap_admin(&pool, &model, username, password).await?;
    }

    let sessions = SessionStore::new(settings.session_ttl).with_secure_cookies(settings.cookie_secure);
    let state = AppState::new(pool, model, sessions.clone());
    let app = with_http_layers(app_routes(state)?, settings.body_limit_bytes);

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            tick.tick().await;
            let removed = sessions.prune();
            if removed > 0 {
                tracing::debug!(removed, "expired sessions pruned");
            }
        }
    });

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("f1db listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

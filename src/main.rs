use std::sync::Arc;

use chat_service::accounts::PgAccountDirectory;
use chat_service::config::Config;
use chat_service::error::AppError;
use chat_service::store::PgChatStore;
use chat_service::{db, logging, migrations, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;
    migrations::run_all(&pool).await?;

    let store = Arc::new(PgChatStore::new(pool.clone()));
    let accounts = Arc::new(PgAccountDirectory::new(pool));
    let state = AppState::new(store, accounts, config.clone());

    let app = routes::build_router().with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "chat service listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    Ok(())
}

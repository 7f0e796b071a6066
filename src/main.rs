mod config;
mod db;
mod frame;
mod hub;
mod quiz;
mod routes;
mod services;
mod state;
mod validate;

use std::time::Duration;

use services::{play, session};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");
    let state = state::AppState::new(pool, config);

    let _sweeper = play::spawn_sweeper(state.plays.clone(), Duration::from_secs(state.config.play_session_ttl_secs));
    let _purger = session::spawn_purger(state.pool.clone(), SESSION_PURGE_INTERVAL);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "educonnect listening");
    axum::serve(listener, app).await.expect("server failed");
}

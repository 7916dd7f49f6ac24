use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use chat_relay::auth::provider::{AuthProvider, StaticTokenProvider};
use chat_relay::auth::user::{Rank, UserProfile};
use chat_relay::config::RelayConfig;
use chat_relay::core::coordinator::Coordinator;
use chat_relay::handlers::websocket::ws_route;
use chat_relay::storage::memory::MemoryStore;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("No .env file loaded: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // Load config from the environment
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration: host={}, port={}", config.host, config.port);

    // Dev deployment: in-memory store and a static token table. Real
    // deployments wire their own AuthProvider / MessageStore here.
    let auth = Arc::new(StaticTokenProvider::new());
    info!("Auth provider: {}", auth.provider_name());
    if let Ok(token) = std::env::var("CHAT_RELAY_ADMIN_TOKEN") {
        auth.insert_token(token, UserProfile::new("1", "Admin", Rank::Admin))
            .await;
        info!("Admin token registered from CHAT_RELAY_ADMIN_TOKEN");
    } else {
        warn!("CHAT_RELAY_ADMIN_TOKEN not set; no credentials are accepted");
    }
    let store = Arc::new(MemoryStore::new());

    let coordinator = Arc::new(Coordinator::new(config.clone(), auth, store));
    coordinator.start_sweepers();

    // Routes: relay WebSocket endpoint plus a health check
    let routes = ws_route(coordinator).or(warp::path("health").map(|| "OK"));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting chat relay on {}", addr);
    warp::serve(routes).run(addr).await;
}

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use warp::{self, Filter};

use noor_relay::config::RelayConfig;
use noor_relay::constants::WS_PATH;
use noor_relay::core::registry::{ConnectionRegistry, SharedRegistry};
use noor_relay::handlers::websocket::handle_ws_client;
use noor_relay::sync::{EmptySyncProvider, SharedSyncProvider};

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    // Load config from the environment
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration: host={}, port={}", config.host, config.port);

    let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
    let sync: SharedSyncProvider = Arc::new(EmptySyncProvider);

    // WebSocket route carrying a device identity: /ws/{user_id}/device/{device_id}
    let ws_device_route = warp::path(WS_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path("device"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_registry(registry.clone()))
        .and(with_sync(sync.clone()))
        .map(
            |user_id: String,
             device_id: String,
             ws: warp::ws::Ws,
             peer: Option<SocketAddr>,
             registry: SharedRegistry,
             sync: SharedSyncProvider| {
                info!("New websocket connection for user {}", user_id);
                ws.on_upgrade(move |socket| {
                    handle_ws_client(socket, user_id, Some(device_id), peer, registry, sync)
                })
            },
        );

    // WebSocket route keyed by user identity only: /ws/{user_id}
    let ws_user_route = warp::path(WS_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_registry(registry.clone()))
        .and(with_sync(sync.clone()))
        .map(
            |user_id: String,
             ws: warp::ws::Ws,
             peer: Option<SocketAddr>,
             registry: SharedRegistry,
             sync: SharedSyncProvider| {
                info!("New websocket connection for user {}", user_id);
                ws.on_upgrade(move |socket| {
                    handle_ws_client(socket, user_id, None, peer, registry, sync)
                })
            },
        );

    // Health check route
    let health_route = warp::path("health").map(|| "OK");

    // Service info route with the live connection count
    let info_route = warp::path("info")
        .and(with_registry(registry.clone()))
        .and_then(info_handler);

    // Combine routes
    let routes = ws_device_route
        .or(ws_user_route)
        .or(health_route)
        .or(info_route);

    // Build the server address
    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    // Start the server
    info!("Starting Noor Relay server on {}", addr);

    warp::serve(routes).run(addr).await;
}

async fn info_handler(registry: SharedRegistry) -> Result<impl warp::Reply, Infallible> {
    let body = serde_json::json!({
        "name": "noor-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "websocket_connections": registry.connection_count().await,
    });
    Ok(warp::reply::json(&body))
}

// Helper functions to include shared state in requests
fn with_registry(
    registry: SharedRegistry,
) -> impl Filter<Extract = (SharedRegistry,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

fn with_sync(
    sync: SharedSyncProvider,
) -> impl Filter<Extract = (SharedSyncProvider,), Error = Infallible> + Clone {
    warp::any().map(move || sync.clone())
}

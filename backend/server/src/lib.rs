//! Documentation of a fact-of-the-day voting service.
//!
//!
//!
//! # General Infrastructure
//! - Client fetches the current fact and renders the countdown from `publishedAt`
//! - Client generates a UUID once, keeps it in local storage and sends it as `voterId`
//! - Backend records one vote per voter per fact and returns the updated tallies
//! - Facts are published by hand with `fact-admin publish`
//!
//!
//!
//! # Votes
//!
//! **Goal**: exactly one counted vote per (fact, voter), whatever the client does.
//!
//! - The client remembers which facts it voted on, but that is only a hint
//! - The voter ledger in the store decides, a repeat is answered with `409` and the recorded choice
//! - The client overwrites its local marker with `previousChoice` from that response
//! - `VOTE_POLICY=change` lets a voter switch sides, `VOTE_POLICY=locked` keeps the first vote
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/fact/current` | 200 fact, 404 when nothing is published |
//! | POST | `/fact` | 201 fact |
//! | GET | `/fact/{id}` | 200 fact |
//! | PATCH | `/fact/{id}/vote` | 200 fact, 409 on a repeat vote |
//! | GET | `/fact/{id}/vote/{voterId}` | 200 `{"choice": ...}` |
//! | GET | `/health` | 200 when the store answers, 503 otherwise |
//!
//! Errors are JSON: `{"error": "duplicate_vote", "message": "...", "previousChoice": "agree"}`.
//!
//!
//!
//! # Notes
//!
//! ## Startup
//! The listener binds before the store is up. Requests that need the store get
//! `503` until the connection task reports ready, and keep getting it if every
//! attempt fails.
//!
//! ## Redis
//! Without `REDIS_URL` facts are kept in memory only. Fine for local runs,
//! everything is lost on restart.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://localhost:6379 RUST_LOG=info cargo run --bin fact
//! ```
//!
//! Publish a fact.
//! ```sh
//! cargo run --bin fact-admin -- publish "Honey never spoils"
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod connect;
pub mod database;
pub mod error;
pub mod fact;
pub mod memory;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use connect::connect_with_retry;
use error::StartupError;
use routes::{
    create_handler, current_handler, fact_handler, health_handler, vote_handler,
    voter_choice_handler,
};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/fact", post(create_handler))
        .route("/fact/current", get(current_handler))
        .route("/fact/{id}", get(fact_handler))
        .route("/fact/{id}/vote", patch(vote_handler))
        .route("/fact/{id}/vote/{voter_id}", get(voter_choice_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config);

    tokio::spawn({
        let state = state.clone();
        async move {
            let connector = state.connector();
            if let Err(e) =
                connect_with_retry(&state.storage, connector.as_ref(), &state.config.retry).await
            {
                error!("Store unavailable, serving 503s: {e}");
            }
        }
    });

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        groups::{
            create_group_handler, delete_group_handler, group_details_handler,
            group_messages_handler, join_group_handler, leave_group_handler, my_groups_handler,
        },
        middleware::require_auth,
        rest::{
            complete_task_handler, create_task_handler, delete_task_handler,
            global_leaderboard_handler, group_leaderboard_handler, list_tasks_handler,
            start_session_handler, stop_session_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db_adapter, config.clone()));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Every route requires a verified user id from the identity provider.
    let api_router = Router::new()
        .route("/sessions/start", post(start_session_handler))
        .route("/sessions/{session_id}/stop", post(stop_session_handler))
        .route("/tasks", post(create_task_handler).get(list_tasks_handler))
        .route("/tasks/{task_id}/complete", patch(complete_task_handler))
        .route("/tasks/{task_id}", delete(delete_task_handler))
        .route("/leaderboard", get(global_leaderboard_handler))
        .route("/leaderboard/group/{group_id}", get(group_leaderboard_handler))
        .route("/groups", post(create_group_handler))
        .route("/groups/join", post(join_group_handler))
        .route("/groups/mygroups", get(my_groups_handler))
        .route(
            "/groups/{group_id}",
            get(group_details_handler).delete(delete_group_handler),
        )
        .route("/groups/{group_id}/leave", patch(leave_group_handler))
        .route("/groups/{group_id}/messages", get(group_messages_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

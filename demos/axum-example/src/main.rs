use axum::{
    body::Body, error_handling::HandleErrorLayer, http::StatusCode, routing::get, Extension,
    Router,
};
use log::{info, warn};
use tokio::signal;
use tower::{BoxError, ServiceBuilder};
use tower_jwt_authentication::{
    config::Configuration, middleware::JwtAuthentication, token::TokenAttributes,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "supersecret".to_owned());
    let config = Configuration::<Body>::new(secret)
        .and_then(|config| config.with_path(["/api"]))
        .and_then(|config| config.with_ignore(["/api/health"]))
        .expect("Failed to build configuration");
    let authentication = JwtAuthentication::new(config);

    let app = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/hello", get(hello))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_error))
                .layer(authentication.into_layer()),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
    info!("Running axum on port: 3000");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn root() -> &'static str {
    "Public"
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn hello(tokens: Extension<TokenAttributes>) -> Result<(StatusCode, String), StatusCode> {
    let sub = tokens
        .get("token")
        .and_then(|token| token.get_str("sub").ok())
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((StatusCode::OK, format!("Hello, {}", sub)))
}

async fn handle_error(error: BoxError) -> (StatusCode, String) {
    warn!("Request failed: {}", error);
    (StatusCode::FORBIDDEN, error.to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use resale_server::auth::TokenVerifier;
use resale_server::config::Config;
use resale_server::notify::{DisabledNotifier, PushNotifier, WebPushNotifier};
use resale_server::routes::create_routes;
use resale_server::state::AppState;
use resale_server::store::PgStore;

const DEFAULT_LOG_FILTER: &str = "resale_server=debug,tower_http=info";

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let notifier: Arc<dyn PushNotifier> = match &config.vapid_private_key_path {
        Some(path) => Arc::new(
            WebPushNotifier::from_pem_file(path, config.vapid_subject.clone())
                .await
                .expect("Failed to set up web push"),
        ),
        None => {
            tracing::warn!("VAPID_PRIVATE_KEY_PATH not set, push notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let state = AppState::new(
        Arc::new(PgStore::new(pool)),
        notifier,
        TokenVerifier::new(&config.jwt_secret, config.allowed_email_domain.clone()),
    );
    let app = create_routes(state, &config);

    tracing::info!("Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use token_service::config::Config;
use token_service::config::NotifierConfig;
use token_service::config::NotifierKind;
use token_service::domain::credentials::ports::AuthServicePort;
use token_service::domain::credentials::ports::CredentialStore;
use token_service::domain::credentials::ports::Notifier;
use token_service::domain::credentials::service::AuthService;
use token_service::domain::credentials::service::TokenPolicy;
use token_service::inbound::http::router::create_router;
use token_service::outbound::notifier::LogNotifier;
use token_service::outbound::repositories::InMemoryCredentialStore;
use token_service::outbound::repositories::PostgresCredentialStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "token-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;
    let policy = config.token_policy()?;

    tracing::info!(
        http_port = config.server.http_port,
        persistent = config.database.url.is_some(),
        access_token_ttl_secs = policy.access_token_ttl().num_seconds(),
        refresh_token_ttl_secs = policy.refresh_token_ttl().num_seconds(),
        notifier = ?config.notifier.kind,
        "Configuration loaded"
    );

    let auth_service: Arc<dyn AuthServicePort> = match &config.database.url {
        Some(url) => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            let store = Arc::new(PostgresCredentialStore::new(pg_pool));
            build_service(store, &config.notifier, policy)?
        }
        None => {
            tracing::warn!("No database configured, credentials are kept in memory");
            let store = Arc::new(InMemoryCredentialStore::new());
            build_service(store, &config.notifier, policy)?
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(auth_service, &config.cors.allowed_origins);

    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server exited successfully");

    Ok(())
}

fn build_service<CS>(
    store: Arc<CS>,
    notifier: &NotifierConfig,
    policy: TokenPolicy,
) -> Result<Arc<dyn AuthServicePort>, anyhow::Error>
where
    CS: CredentialStore,
{
    match notifier.kind {
        NotifierKind::Log => with_notifier(store, Arc::new(LogNotifier::new()), policy),
        #[cfg(feature = "kafka")]
        NotifierKind::Kafka => {
            let kafka = token_service::outbound::notifier::KafkaNotifier::new(notifier)?;
            with_notifier(store, Arc::new(kafka), policy)
        }
        #[cfg(not(feature = "kafka"))]
        NotifierKind::Kafka => {
            anyhow::bail!("notifier.kind = \"kafka\" requires the `kafka` feature")
        }
    }
}

fn with_notifier<CS, N>(
    store: Arc<CS>,
    notifier: Arc<N>,
    policy: TokenPolicy,
) -> Result<Arc<dyn AuthServicePort>, anyhow::Error>
where
    CS: CredentialStore,
    N: Notifier,
{
    let service: Arc<dyn AuthServicePort> = Arc::new(AuthService::new(store, notifier, policy)?);
    Ok(service)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

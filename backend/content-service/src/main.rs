use actix_web::{web, App, HttpResponse, HttpServer};
use cache_invalidation::{CacheInvalidator, RedisCacheStore};
use content_service::db::{PgPostRepository, MIGRATOR};
use content_service::services::{HttpMediaClient, PostService};
use content_service::{handlers, Config};
use event_bus::{EventBus, KafkaConnector};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use transactional_outbox::{OutboxMetrics, OutboxRelay, SqlxOutboxRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn health_summary(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "content-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "content-service"
        })),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Content Service
///
/// # Routes
///
/// - `/api/v1/posts/*` - Create (multipart, with media saga), read, page, edit, delete, like
/// - `/api/v1/health` - PostgreSQL-backed health check
/// - `/metrics` - Prometheus metrics
///
/// Startup order is store, then broker, then HTTP. An unreachable broker is
/// not fatal: committed events wait in the outbox until the relay can
/// publish them.
#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting content-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("Failed to connect to PostgreSQL: {}", e),
            )
        })?;

    MIGRATOR
        .run(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Migrations failed: {}", e)))?;
    tracing::info!("Database migrations applied");

    let cache_store = RedisCacheStore::connect(&config.cache.url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("Failed to connect to Redis: {}", e),
            )
        })?;
    let invalidator = Arc::new(CacheInvalidator::new(Arc::new(cache_store), "content-service"));

    let bus = Arc::new(EventBus::new(config.events.clone(), Arc::new(KafkaConnector)));
    if let Err(e) = bus.connect().await {
        tracing::warn!(
            error = %e,
            "Event bus unavailable at startup, events stay in the outbox until it recovers"
        );
    }

    let relay = OutboxRelay::new(
        Arc::new(SqlxOutboxRepository::new(db_pool.clone())),
        bus.clone(),
        config.outbox.clone(),
    )
    .with_metrics(OutboxMetrics::new("content-service"));
    let relay_handle = tokio::spawn(async move { relay.start().await });

    let repo = Arc::new(PgPostRepository::new(
        db_pool.clone(),
        config.transactions.clone(),
    ));
    let media = Arc::new(HttpMediaClient::new(
        config.media.base_url.clone(),
        config.media.upload_timeout,
    ));
    let post_service = web::Data::new(PostService::new(repo, media, invalidator));
    let pool_data = web::Data::new(db_pool.clone());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("HTTP server listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(post_service.clone())
            .app_data(pool_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(content_service::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    server_handle.stop(true).await;
    if let Err(e) = server_task.await {
        tracing::error!("HTTP server task failed: {}", e);
    }

    relay_handle.abort();
    if let Err(e) = bus.close().await {
        tracing::warn!(error = %e, "Event bus close failed");
    }
    db_pool.close().await;

    tracing::info!("Content-service shut down");
    Ok(())
}

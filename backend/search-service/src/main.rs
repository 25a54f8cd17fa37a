use actix_web::{web, App, HttpResponse, HttpServer};
use cache_invalidation::{CacheInvalidator, RedisCacheStore};
use event_bus::{EventBus, EventHandler, KafkaConnector};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler};
use search_service::consumers::{PostIndexConsumer, UserIndexConsumer, POST_BINDINGS, USER_BINDING};
use search_service::index::{PgSearchIndex, SearchIndex};
use search_service::services::SearchService;
use search_service::{handlers, Config, MIGRATOR};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const IDEMPOTENCY_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

async fn health_summary(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "search-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "search-service"
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

async fn subscribe_all(
    bus: &EventBus,
    posts: Arc<dyn EventHandler>,
    users: Arc<dyn EventHandler>,
) -> event_bus::Result<()> {
    for binding in POST_BINDINGS {
        bus.subscribe(binding, posts.clone()).await?;
    }
    bus.subscribe(USER_BINDING, users).await
}

/// Search Service
///
/// The index is written only by event consumers, so the service refuses to
/// start without the broker.
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

    tracing::info!("Starting search-service v{}", env!("CARGO_PKG_VERSION"));

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
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

    let cache_store = RedisCacheStore::connect(&config.redis_url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("Failed to connect to Redis: {}", e),
            )
        })?;
    let cache = Arc::new(CacheInvalidator::new(Arc::new(cache_store), "search-service"));

    let index: Arc<dyn SearchIndex> = Arc::new(PgSearchIndex::new(db_pool.clone()));
    let guard = IdempotencyGuard::postgres(db_pool.clone(), config.idempotency_retention);
    let posts: Arc<dyn EventHandler> = Arc::new(IdempotentHandler::new(
        PostIndexConsumer::new(index.clone(), cache.clone()),
        guard.clone(),
    ));
    let users: Arc<dyn EventHandler> = Arc::new(IdempotentHandler::new(
        UserIndexConsumer::new(index.clone(), cache.clone()),
        guard.clone(),
    ));

    let bus = Arc::new(EventBus::new(config.events.clone(), Arc::new(KafkaConnector)));
    if let Err(e) = subscribe_all(&bus, posts, users).await {
        tracing::error!(error = %e, "Event bus unavailable, search index cannot be maintained");
        eprintln!("ERROR: Failed to subscribe to event bus: {}", e);
        let _ = bus.close().await;
        db_pool.close().await;
        std::process::exit(1);
    }

    let tombstones = index.clone();
    let tombstone_retention = config.idempotency_retention;
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(IDEMPOTENCY_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match guard.cleanup_old_events().await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(deleted, "Dropped expired processed event ids")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Processed event cleanup failed"),
            }
            // Tombstones live as long as redeliveries can
            match tombstones.purge_tombstones(tombstone_retention).await {
                Ok(purged) if purged > 0 => tracing::info!(purged, "Dropped expired post tombstones"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Post tombstone cleanup failed"),
            }
        }
    });

    let service_data = web::Data::new(SearchService::new(index, cache));
    let pool_data = web::Data::new(db_pool.clone());
    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("HTTP server listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .app_data(pool_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(search_service::metrics::serve_metrics))
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

    cleanup_handle.abort();
    if let Err(e) = bus.close().await {
        tracing::warn!(error = %e, "Event bus close failed");
    }
    db_pool.close().await;

    tracing::info!("Search-service shut down");
    Ok(())
}

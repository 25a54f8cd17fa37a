use actix_web::{web, App, HttpResponse, HttpServer};
use cache_invalidation::{CacheInvalidator, RedisCacheStore};
use event_bus::{EventBus, KafkaConnector};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler};
use notification_service::consumers::{PostLikedConsumer, POST_LIKED_BINDING};
use notification_service::db::{PgNotificationRepository, MIGRATOR};
use notification_service::services::NotificationService;
use notification_service::{handlers, Config};
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
            "service": "notification-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "notification-service"
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

/// Notification Service
///
/// Notifications are only ever created by the `post.liked` consumer, so the
/// service refuses to start without the broker.
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

    tracing::info!("Starting notification-service v{}", env!("CARGO_PKG_VERSION"));
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

    let cache_store = RedisCacheStore::connect(&config.redis_url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("Failed to connect to Redis: {}", e),
            )
        })?;
    let cache = Arc::new(CacheInvalidator::new(Arc::new(cache_store), "notification-service"));

    let notification_service = Arc::new(NotificationService::new(
        Arc::new(PgNotificationRepository::new(db_pool.clone())),
        cache,
    ));
    let guard = IdempotencyGuard::postgres(db_pool.clone(), config.idempotency_retention);
    let consumer = IdempotentHandler::new(
        PostLikedConsumer::new(notification_service.clone()),
        guard.clone(),
    );

    let bus = Arc::new(EventBus::new(config.events.clone(), Arc::new(KafkaConnector)));
    if let Err(e) = bus.subscribe(POST_LIKED_BINDING, Arc::new(consumer)).await {
        tracing::error!(error = %e, "Event bus unavailable, like notifications cannot be created");
        eprintln!("ERROR: Failed to subscribe to event bus: {}", e);
        let _ = bus.close().await;
        db_pool.close().await;
        std::process::exit(1);
    }

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
        }
    });

    let service_data = web::Data::from(notification_service);
    let pool_data = web::Data::new(db_pool.clone());
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("HTTP server listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .app_data(pool_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(notification_service::metrics::serve_metrics))
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

    tracing::info!("Notification-service shut down");
    Ok(())
}

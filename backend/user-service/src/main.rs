use actix_web::{web, App, HttpResponse, HttpServer};
use cache_invalidation::{CacheInvalidator, RedisCacheStore};
use event_bus::{EventBus, EventHandler, KafkaConnector};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::{OutboxMetrics, OutboxRelay, SqlxOutboxRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_service::consumers::{PostCounterConsumer, POST_COUNTER_BINDINGS};
use user_service::db::{PgUserRepository, MIGRATOR};
use user_service::services::UserService;
use user_service::{handlers, Config};

const IDEMPOTENCY_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

async fn health_summary(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "user-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "user-service"
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

/// User Service
///
/// # Routes
///
/// - `/api/v1/users/*` - Create, read (cached), update, delete profiles
/// - `/api/v1/health` - PostgreSQL-backed health check
/// - `/metrics` - Prometheus metrics
///
/// A broker outage degrades the service: profile writes keep their events in
/// the outbox and the posts counter catches up once a later start
/// subscribes again.
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

    tracing::info!("Starting user-service v{}", env!("CARGO_PKG_VERSION"));
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
    let invalidator = Arc::new(CacheInvalidator::new(Arc::new(cache_store), "user-service"));

    let repo = Arc::new(PgUserRepository::new(
        db_pool.clone(),
        config.transactions.clone(),
    ));
    let user_service = Arc::new(UserService::new(repo, invalidator));

    let bus = Arc::new(EventBus::new(config.events.clone(), Arc::new(KafkaConnector)));
    let guard = IdempotencyGuard::postgres(db_pool.clone(), config.idempotency_retention);
    let counter: Arc<dyn EventHandler> = Arc::new(IdempotentHandler::new(
        PostCounterConsumer::new(user_service.clone()),
        guard.clone(),
    ));
    for binding in POST_COUNTER_BINDINGS {
        if let Err(e) = bus.subscribe(binding, counter.clone()).await {
            tracing::warn!(
                binding,
                error = %e,
                "Event bus unavailable, posts_count will not follow post events until restart"
            );
            break;
        }
    }

    let relay = OutboxRelay::new(
        Arc::new(SqlxOutboxRepository::new(db_pool.clone())),
        bus.clone(),
        config.outbox.clone(),
    )
    .with_metrics(OutboxMetrics::new("user-service"));
    let relay_handle = tokio::spawn(async move { relay.start().await });

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

    let service_data = web::Data::from(user_service);
    let pool_data = web::Data::new(db_pool.clone());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("HTTP server listening on {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .app_data(pool_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(user_service::metrics::serve_metrics))
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
    cleanup_handle.abort();
    if let Err(e) = bus.close().await {
        tracing::warn!(error = %e, "Event bus close failed");
    }
    db_pool.close().await;

    tracing::info!("User-service shut down");
    Ok(())
}

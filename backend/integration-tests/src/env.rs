//! Test environment: three services, one broker, one cache

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
use content_service::db::memory::InMemoryPostRepository;
use content_service::models::{MediaUpload, Post};
use content_service::services::media_client::HttpMediaClient;
use content_service::services::PostService;
use event_bus::{AckPolicy, EventBus, EventBusConfig, InMemoryBroker};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler, InMemoryProcessedEventStore};
use media_service::consumers::{PostDeletedConsumer, MEDIA_RELEASE_BINDINGS};
use media_service::db::InMemoryMediaRepository;
use media_service::services::MediaService;
use media_service::storage::InMemoryObjectStorage;
use resilience::RetryConfig;
use search_service::consumers::{PostIndexConsumer, POST_BINDINGS};
use search_service::index::InMemorySearchIndex;
use search_service::services::SearchService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::{OutboxRelay, OutboxRelayConfig, OutboxStore};
use uuid::Uuid;

const IDEMPOTENCY_RETENTION: Duration = Duration::from_secs(3600);
const MEDIA_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestEnvironmentBuilder {
    ack_policy: AckPolicy,
    subscribe_media: bool,
}

impl Default for TestEnvironmentBuilder {
    fn default() -> Self {
        Self {
            ack_policy: AckPolicy::AlwaysAck,
            subscribe_media: true,
        }
    }
}

impl TestEnvironmentBuilder {
    pub fn ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    /// Leave media-service's cleanup consumer unsubscribed
    pub fn without_media_consumer(mut self) -> Self {
        self.subscribe_media = false;
        self
    }

    pub async fn start(self) -> anyhow::Result<TestEnvironment> {
        init_test_logging();

        let broker = InMemoryBroker::new();
        let bus = Arc::new(EventBus::new(
            EventBusConfig::new("integration-tests").with_ack_policy(self.ack_policy),
            Arc::new(broker.connector()),
        ));
        bus.connect().await?;

        let cache_store = Arc::new(InMemoryCacheStore::new());

        // media-service over HTTP
        let media_repo = Arc::new(InMemoryMediaRepository::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let media = Arc::new(MediaService::new(media_repo.clone(), storage.clone()));
        let (media_addr, media_server) = start_media_server(media.clone())?;

        // content-service in-process, calling media-service over the wire
        let posts = Arc::new(InMemoryPostRepository::new(
            Arc::new(transactional_outbox::InMemoryOutbox::new()),
            RetryConfig::new(3, Duration::from_millis(1)),
        ));
        let content = Arc::new(PostService::new(
            posts.clone(),
            Arc::new(HttpMediaClient::new(format!("http://{}", media_addr), MEDIA_TIMEOUT)),
            Arc::new(CacheInvalidator::new(cache_store.clone(), "content-service")),
        ));
        let outbox: Arc<dyn OutboxStore> = posts.outbox().clone();
        let relay = OutboxRelay::new(outbox, bus.clone(), OutboxRelayConfig::default());

        // search-service consumers
        let index = Arc::new(InMemorySearchIndex::new());
        let search_cache = Arc::new(CacheInvalidator::new(cache_store.clone(), "search-service"));
        let search = Arc::new(SearchService::new(index.clone(), search_cache.clone()));
        let indexer = Arc::new(IdempotentHandler::new(
            PostIndexConsumer::new(index.clone(), search_cache),
            guard(),
        ));
        for binding in POST_BINDINGS {
            bus.subscribe(binding, indexer.clone()).await?;
        }

        if self.subscribe_media {
            let cleanup = Arc::new(IdempotentHandler::new(PostDeletedConsumer::new(media.clone()), guard()));
            for binding in MEDIA_RELEASE_BINDINGS {
                bus.subscribe(binding, cleanup.clone()).await?;
            }
        }

        Ok(TestEnvironment {
            broker,
            bus,
            cache_store,
            posts,
            content,
            relay,
            media_repo,
            storage,
            media,
            media_server,
            index,
            search,
        })
    }
}

pub struct TestEnvironment {
    pub broker: InMemoryBroker,
    pub bus: Arc<EventBus>,
    /// Shared by content-service and search-service, as in production
    pub cache_store: Arc<InMemoryCacheStore>,
    pub posts: Arc<InMemoryPostRepository>,
    pub content: Arc<PostService>,
    relay: OutboxRelay,
    pub media_repo: Arc<InMemoryMediaRepository>,
    pub storage: Arc<InMemoryObjectStorage>,
    pub media: Arc<MediaService>,
    media_server: ServerHandle,
    pub index: Arc<InMemorySearchIndex>,
    pub search: Arc<SearchService>,
}

impl TestEnvironment {
    pub fn builder() -> TestEnvironmentBuilder {
        TestEnvironmentBuilder::default()
    }

    /// Environment with `AlwaysAck` and every consumer subscribed
    pub async fn start() -> anyhow::Result<Self> {
        Self::builder().start().await
    }

    /// Run one relay pass; returns the number of events published.
    pub async fn flush_outbox(&self) -> anyhow::Result<usize> {
        Ok(self.relay.process_batch().await?)
    }

    /// Create a post carrying one small PNG per name.
    pub async fn create_post(&self, user_id: Uuid, content: &str, images: &[&str]) -> anyhow::Result<Post> {
        let files = images
            .iter()
            .map(|name| MediaUpload {
                filename: name.to_string(),
                content_type: "image/png".to_string(),
                data: bytes::Bytes::from(format!("png:{}", name)),
            })
            .collect();
        Ok(self.content.create_post(user_id, content.to_string(), files).await?)
    }

    pub async fn shutdown(self) {
        self.media_server.stop(true).await;
        if let Err(e) = self.bus.close().await {
            tracing::warn!(error = %e, "Event bus close failed");
        }
    }
}

fn guard() -> IdempotencyGuard {
    IdempotencyGuard::new(Arc::new(InMemoryProcessedEventStore::new()), IDEMPOTENCY_RETENTION)
}

fn start_media_server(service: Arc<MediaService>) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let data = web::Data::from(service);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(web::scope("/api/v1").configure(media_service::handlers::configure))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))?;

    let addr = server
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no bound address"))?;
    let server = server.run();
    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

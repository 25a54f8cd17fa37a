//! Search endpoints fed through the event bus

use actix_web::{http::StatusCode, test, web, App};
use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
use chrono::Utc;
use event_bus::{AckPolicy, EventBus, EventBusConfig, InMemoryBroker};
use event_schema::{DomainEvent, EventMessage, PostCreated, PostDeleted, UserCreated};
use idempotent_consumer::{IdempotencyGuard, IdempotentHandler, InMemoryProcessedEventStore};
use search_service::consumers::{PostIndexConsumer, UserIndexConsumer, POST_BINDINGS, USER_BINDING};
use search_service::handlers;
use search_service::index::{InMemorySearchIndex, SearchIndex};
use search_service::services::SearchService;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    broker: InMemoryBroker,
    bus: EventBus,
    index: Arc<InMemorySearchIndex>,
    service: web::Data<SearchService>,
}

async fn harness() -> Harness {
    let broker = InMemoryBroker::new();
    let bus = EventBus::new(
        EventBusConfig::new("search-test").with_ack_policy(AckPolicy::default()),
        Arc::new(broker.connector()),
    );
    let index = Arc::new(InMemorySearchIndex::new());
    let cache = Arc::new(CacheInvalidator::new(
        Arc::new(InMemoryCacheStore::new()),
        "search-test",
    ));
    let guard = IdempotencyGuard::new(
        Arc::new(InMemoryProcessedEventStore::new()),
        Duration::from_secs(3600),
    );

    let dyn_index: Arc<dyn SearchIndex> = index.clone();
    let posts = Arc::new(IdempotentHandler::new(
        PostIndexConsumer::new(dyn_index.clone(), cache.clone()),
        guard.clone(),
    ));
    for binding in POST_BINDINGS {
        bus.subscribe(binding, posts.clone()).await.unwrap();
    }
    bus.subscribe(
        USER_BINDING,
        Arc::new(IdempotentHandler::new(
            UserIndexConsumer::new(dyn_index.clone(), cache.clone()),
            guard,
        )),
    )
    .await
    .unwrap();

    Harness {
        broker,
        bus,
        index,
        service: web::Data::new(SearchService::new(dyn_index, cache)),
    }
}

fn post_created(post_id: Uuid, content: &str) -> EventMessage {
    EventMessage::new(DomainEvent::PostCreated(PostCreated {
        post_id,
        user_id: Uuid::new_v4(),
        content: content.to_string(),
        media_urls: Vec::new(),
        created_at: Utc::now(),
    }))
}

#[actix_web::test]
async fn test_redelivered_post_is_indexed_once() {
    let h = harness().await;
    let post_id = Uuid::new_v4();
    let message = post_created(post_id, "sunset over the bay");

    h.bus.publish(&message).await.unwrap();
    h.bus.publish(&message).await.unwrap();
    assert!(h.broker.wait_for_acks(2, WAIT).await);

    assert_eq!(h.index.post_count(), 1);

    let app = test::init_service(
        App::new()
            .app_data(h.service.clone())
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/posts?q=sunset")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["post_id"], post_id.to_string());
}

#[actix_web::test]
async fn test_deleted_post_disappears_from_results() {
    let h = harness().await;
    let post_id = Uuid::new_v4();

    h.bus.publish(&post_created(post_id, "ephemeral")).await.unwrap();
    assert!(h.broker.wait_for_acks(1, WAIT).await);
    assert_eq!(h.service.search_posts("ephemeral", None).await.unwrap().len(), 1);

    h.bus
        .publish_event(DomainEvent::PostDeleted(PostDeleted {
            post_id,
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        }))
        .await
        .unwrap();
    assert!(h.broker.wait_for_acks(2, WAIT).await);

    // the delete evicted the cached page
    assert!(h.service.search_posts("ephemeral", None).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_user_search_and_validation() {
    let h = harness().await;
    h.bus
        .publish_event(DomainEvent::UserCreated(UserCreated {
            user_id: Uuid::new_v4(),
            username: "carol".into(),
            display_name: Some("Carol Danvers".into()),
            created_at: Utc::now(),
        }))
        .await
        .unwrap();
    assert!(h.broker.wait_for_acks(1, WAIT).await);

    let app = test::init_service(
        App::new()
            .app_data(h.service.clone())
            .service(web::scope("/api/v1").configure(handlers::configure)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/search/users?q=danvers&limit=5")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["results"][0]["username"], "carol");

    let req = test::TestRequest::get().uri("/api/v1/search/users").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

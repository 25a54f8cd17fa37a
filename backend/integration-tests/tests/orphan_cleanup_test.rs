//! `post.deleted` cleanup in media-service under both ack policies
//!
//! With `AlwaysAck` a failing cleanup is acked and its media stays orphaned.
//! With `AckOnSuccess` the delivery is retried and, once the budget is spent,
//! parked under `dlq.post.deleted` for replay.

use event_bus::{dead_letter_key, AckPolicy};
use event_schema::{routing_keys, DomainEvent, EventMessage};
use integration_tests::{wait_for_default, TestEnvironment};
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

fn retrying(max_attempts: u32) -> AckPolicy {
    AckPolicy::AckOnSuccess {
        max_attempts,
        retry_delay: Duration::from_millis(5),
        dead_letter: true,
    }
}

/// Create a two-image post, relay its creation, then delete it with object
/// deletes failing. Returns the post id.
async fn delete_with_broken_storage(env: &TestEnvironment) -> Uuid {
    let user = Uuid::new_v4();
    let post = env.create_post(user, "to be removed", &["a.png", "b.png"]).await.unwrap();
    env.flush_outbox().await.unwrap();
    assert!(env.broker.wait_for_acks(1, WAIT).await);

    env.storage.fail_deletes_after(0);
    env.content.delete_post(post.id, user).await.unwrap();
    assert_eq!(env.flush_outbox().await.unwrap(), 1);
    post.id
}

#[actix_web::test]
async fn test_healthy_cleanup_removes_media() {
    let env = TestEnvironment::start().await.unwrap();
    let user = Uuid::new_v4();
    let post = env.create_post(user, "short lived", &["a.png", "b.png"]).await.unwrap();
    env.content.delete_post(post.id, user).await.unwrap();
    assert_eq!(env.flush_outbox().await.unwrap(), 2);

    wait_for_default(|| async { env.storage.is_empty() })
        .await
        .expect("media objects were not purged");
    assert!(env.media.list_for_post(post.id).await.unwrap().is_empty());
    assert!(env.media_repo.is_empty());

    env.shutdown().await;
}

#[actix_web::test]
async fn test_always_ack_loses_failed_cleanup() {
    let env = TestEnvironment::builder()
        .ack_policy(AckPolicy::AlwaysAck)
        .start()
        .await
        .unwrap();

    let post_id = delete_with_broken_storage(&env).await;

    // search + media each ack their copy of post.deleted
    assert!(env.broker.wait_for_acks(3, WAIT).await);
    assert_eq!(env.broker.acked_with_key(routing_keys::POST_DELETED), 2);
    assert_eq!(env.broker.unacked_count(), 0);

    // The orphan stays and nothing records the loss
    assert_eq!(env.media.list_for_post(post_id).await.unwrap().len(), 2);
    assert_eq!(env.storage.len(), 2);
    assert!(env
        .broker
        .published_with_key(&dead_letter_key(routing_keys::POST_DELETED))
        .is_empty());

    // The index side was unaffected
    assert_eq!(env.index.post_count(), 0);

    env.shutdown().await;
}

#[actix_web::test]
async fn test_ack_on_success_dead_letters_failed_cleanup() {
    let env = TestEnvironment::builder()
        .ack_policy(retrying(3))
        .start()
        .await
        .unwrap();

    let post_id = delete_with_broken_storage(&env).await;

    assert!(env.broker.wait_for_acks(3, WAIT).await);
    let dead = env
        .broker
        .published_with_key(&dead_letter_key(routing_keys::POST_DELETED));
    assert_eq!(dead.len(), 1);

    let parked = EventMessage::decode(routing_keys::POST_DELETED, &dead[0].body).unwrap();
    let DomainEvent::PostDeleted(event) = parked.event else {
        panic!("expected post.deleted in the dead-letter queue");
    };
    assert_eq!(event.post_id, post_id);

    // Still orphaned, but recoverable: replaying the parked body after the
    // storage recovers finishes the cleanup
    assert_eq!(env.media.list_for_post(post_id).await.unwrap().len(), 2);
    env.storage.heal();
    env.bus
        .publish_raw(routing_keys::POST_DELETED, &dead[0].body)
        .await
        .unwrap();

    wait_for_default(|| async { env.storage.is_empty() })
        .await
        .expect("replayed cleanup did not purge media");
    assert!(env.media.list_for_post(post_id).await.unwrap().is_empty());

    env.shutdown().await;
}

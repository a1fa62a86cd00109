//! JetStream task queue against a real NATS server.
//!
//! Every test here owns the job applications stream, so they take
//! `STREAM_LOCK` and start from a freshly created stream.

mod common;

use std::time::Duration;

use common::TestHarness;
use pipeline_core::kernel::task_queue::{
    JOB_APPLICATIONS_STREAM, JOB_APPLICATIONS_SUBJECT, WORKER_CONSUMER,
};
use pipeline_core::kernel::{BaseTaskQueue, JetStreamTaskQueue, QueueConfig};
use test_context::test_context;
use tokio::sync::Mutex;

static STREAM_LOCK: Mutex<()> = Mutex::const_new(());

async fn fresh_queue(ctx: &TestHarness, config: &QueueConfig) -> JetStreamTaskQueue {
    let _ = ctx.jetstream.delete_stream(JOB_APPLICATIONS_STREAM).await;
    JetStreamTaskQueue::connect(&ctx.jetstream, config)
        .await
        .unwrap()
}

async fn enqueue(ctx: &TestHarness, payload: &'static str) {
    ctx.jetstream
        .publish(JOB_APPLICATIONS_SUBJECT, payload.into())
        .await
        .unwrap()
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn consumer_is_created_with_single_delivery(ctx: &TestHarness) {
    let _guard = STREAM_LOCK.lock().await;
    let config = QueueConfig {
        ack_wait: Duration::from_secs(600),
        max_in_flight: 8,
    };
    fresh_queue(ctx, &config).await;

    let stream = ctx
        .jetstream
        .get_stream(JOB_APPLICATIONS_STREAM)
        .await
        .unwrap();
    let info = stream.consumer_info(WORKER_CONSUMER).await.unwrap();

    assert_eq!(info.config.max_deliver, 1);
    assert_eq!(info.config.ack_wait, Duration::from_secs(600));
    assert_eq!(info.config.max_ack_pending, 8);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn two_workers_hold_tasks_at_the_same_time(ctx: &TestHarness) {
    let _guard = STREAM_LOCK.lock().await;
    let first = fresh_queue(ctx, &QueueConfig::default()).await;
    let second = JetStreamTaskQueue::connect(&ctx.jetstream, &QueueConfig::default())
        .await
        .unwrap();
    enqueue(ctx, "task-a").await;
    enqueue(ctx, "task-b").await;

    let a = first
        .next_delivery(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("first worker gets a task");
    let b = second
        .next_delivery(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("second worker gets a task while the first is unacked");

    assert_ne!(a.payload, b.payload);
    a.ack().await.unwrap();
    b.ack().await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn expired_task_is_not_handed_to_another_worker(ctx: &TestHarness) {
    let _guard = STREAM_LOCK.lock().await;
    let config = QueueConfig {
        ack_wait: Duration::from_secs(1),
        ..QueueConfig::default()
    };
    let queue = fresh_queue(ctx, &config).await;
    enqueue(ctx, "slow-task").await;

    let held = queue
        .next_delivery(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("task delivered");
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let again = queue.next_delivery(Duration::from_secs(2)).await.unwrap();

    assert!(again.is_none());
    drop(held);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rejected_task_is_never_redelivered(ctx: &TestHarness) {
    let _guard = STREAM_LOCK.lock().await;
    let queue = fresh_queue(ctx, &QueueConfig::default()).await;
    enqueue(ctx, "poison").await;

    let delivery = queue
        .next_delivery(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("task delivered");
    delivery.reject().await.unwrap();

    let again = queue.next_delivery(Duration::from_secs(1)).await.unwrap();
    assert!(again.is_none());
}

// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (rate limiting, sweeps, submission flows) lives in domains and
// is written against these traits so tests can swap in the mocks from
// `test_dependencies`.
//
// Naming convention: Base* for trait names (e.g., BaseCache, BasePage)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::common::BrowserError;

// =============================================================================
// Cache Trait (Infrastructure - shared key/value store)
// =============================================================================

/// Short-lived, idempotent key/value operations shared by every replica.
#[async_trait]
pub trait BaseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically increment an integer key, creating it at 0 first if absent.
    async fn incr(&self, key: &str) -> Result<i64>;

    async fn decr(&self, key: &str) -> Result<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Create-if-absent with expiry. Returns false if the key already exists.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn lpush(&self, key: &str, value: &str) -> Result<i64>;

    /// Keep only the list elements in `start..=stop`.
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()>;

    async fn llen(&self, key: &str) -> Result<i64>;
}

// =============================================================================
// Browser Traits (Infrastructure - automation session)
// =============================================================================

/// Opaque handle to an element on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// The navigable surface adapters drive. Session identity is not reachable from here.
#[async_trait]
pub trait BasePage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Look up an element without waiting. `Ok(None)` when nothing matches.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError>;

    /// Poll for an element until it appears or `timeout` elapses.
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, BrowserError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError>;

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError>;

    async fn set_input_file(&self, element: &ElementHandle, path: &str)
        -> Result<(), BrowserError>;

    async fn move_pointer(&self, x: i64, y: i64) -> Result<(), BrowserError>;

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError>;

    /// Identifier the owning browser uses to close this page.
    fn handle(&self) -> Option<&str> {
        None
    }
}

/// One browser session per process.
#[async_trait]
pub trait BaseBrowser: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn BasePage>, BrowserError>;

    async fn close_page(&self, page: Arc<dyn BasePage>) -> Result<(), BrowserError>;

    async fn shutdown(&self) -> Result<(), BrowserError>;
}

// =============================================================================
// Task Queue Trait (Infrastructure - competing-consumer queue)
// =============================================================================

/// Settles one delivery with the broker.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<()>;

    /// Negative acknowledgement without redelivery.
    async fn reject(self: Box<Self>) -> Result<()>;

    /// Tell the broker the task is still being worked on.
    async fn progress(&self) -> Result<()>;
}

/// A message pulled from the queue that must be acked or rejected exactly once.
pub struct Delivery {
    pub payload: Bytes,
    acker: Box<dyn DeliveryAcker>,
}

impl Delivery {
    pub fn new(payload: Bytes, acker: Box<dyn DeliveryAcker>) -> Self {
        Self { payload, acker }
    }

    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn reject(self) -> Result<()> {
        self.acker.reject().await
    }

    pub async fn progress(&self) -> Result<()> {
        self.acker.progress().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[async_trait]
pub trait BaseTaskQueue: Send + Sync {
    /// Wait up to `wait` for the next delivery. Each call yields at most one.
    async fn next_delivery(&self, wait: Duration) -> Result<Option<Delivery>>;
}

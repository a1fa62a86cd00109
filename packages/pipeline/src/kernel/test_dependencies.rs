// TestDependencies - mock implementations for testing
//
// In-memory stand-ins for every kernel trait and domain store, so the worker
// and schedulers can be exercised without Redis, NATS, Postgres or a browser.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::nats::TestNats;
use super::traits::{
    BaseBrowser, BaseCache, BasePage, BaseTaskQueue, Delivery, DeliveryAcker, ElementHandle,
};
use crate::common::{BrowserError, DelayStrategy, Pacer, PauseBand};
use crate::domains::applications::{
    ApplicationRecord, ApplicationStatus, ApplicationStore, AttemptRecord, CredentialStore,
    PlatformCredentials,
};
use crate::domains::platforms::Platform;

// =============================================================================
// Memory Cache
// =============================================================================

#[derive(Debug, Clone)]
enum Stored {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

/// Redis-like cache on tokio's clock, so `tokio::time::advance` expires keys.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let expired = entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= Instant::now());
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    /// Current text value, if present and unexpired.
    pub fn value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Stored::Text(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live(&mut entries, key).map(|e| &e.value) {
            Some(Stored::List(items)) => items.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Remaining time to live, if the key exists and has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries.lock().unwrap();
        Self::live(&mut entries, key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Seed a counter as if earlier reservations had happened.
    pub fn set_counter(&self, key: &str, value: i64, ttl: Duration) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: Stored::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let current = match Self::live(&mut entries, key) {
            Some(Entry {
                value: Stored::Text(v),
                ..
            }) => v
                .parse::<i64>()
                .map_err(|_| anyhow!("value at {} is not an integer", key))?,
            Some(_) => return Err(anyhow!("WRONGTYPE {} holds a list", key)),
            None => 0,
        };
        let next = current + delta;
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Stored::Text(String::new()),
            expires_at: None,
        });
        entry.value = Stored::Text(next.to_string());
        Ok(next)
    }
}

#[async_trait]
impl BaseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.add(key, 1)
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        self.add(key, -1)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = Self::live(&mut entries, key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: Stored::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        if Self::live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Stored::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        if Self::live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Stored::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Stored::List(items)) => {
                items.push_front(value.to_string());
                Ok(items.len() as i64)
            }
            _ => Err(anyhow!("WRONGTYPE {} is not a list", key)),
        }
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = Self::live(&mut entries, key) else {
            return Ok(());
        };
        let Stored::List(items) = &mut entry.value else {
            return Err(anyhow!("WRONGTYPE {} is not a list", key));
        };
        let len = items.len() as isize;
        let resolve = |i: isize| if i < 0 { len + i } else { i };
        let (start, stop) = (resolve(start).max(0), resolve(stop).min(len - 1));
        if start > stop {
            items.clear();
        } else {
            let kept: VecDeque<String> = items
                .drain(start as usize..=stop as usize)
                .collect();
            *items = kept;
        }
        if items.is_empty() {
            entries.remove(key);
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        Ok(self.list(key).len() as i64)
    }
}

// =============================================================================
// Mock Browser
// =============================================================================

/// Every interaction a mock page received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Goto(String),
    CurrentUrl,
    Query(String),
    WaitFor(String),
    Click(String),
    Clear(String),
    SendKeys(String, String),
    Text(String),
    SetInputFile(String, String),
    MovePointer(i64, i64),
    ScrollBy(i64),
}

/// An element on a scripted screen.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub text: String,
    /// Clicking moves the page to the next screen.
    pub advances: bool,
    /// Clicking changes the current URL.
    pub navigates_to: Option<String>,
}

impl MockElement {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn present() -> Self {
        Self::default()
    }

    pub fn advancing(mut self) -> Self {
        self.advances = true;
        self
    }

    pub fn navigating_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }
}

/// Elements visible at one point of a scripted flow, keyed by exact selector.
#[derive(Debug, Clone, Default)]
pub struct MockScreen {
    elements: HashMap<String, MockElement>,
}

impl MockScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, element: MockElement) -> Self {
        self.elements.insert(selector.to_string(), element);
        self
    }
}

#[derive(Default)]
struct MockPageState {
    screens: Vec<MockScreen>,
    current: usize,
    url: String,
    calls: Vec<PageCall>,
    failing: HashSet<String>,
    navigation_fails: bool,
}

impl MockPageState {
    fn element(&self, selector: &str) -> Option<&MockElement> {
        self.screens
            .get(self.current)
            .and_then(|s| s.elements.get(selector))
    }

    fn check(&self, selector: &str) -> Result<(), BrowserError> {
        if self.failing.contains(selector) {
            return Err(BrowserError::Driver(format!("scripted failure on {}", selector)));
        }
        Ok(())
    }
}

/// A page that walks through scripted screens as advancing elements are clicked.
pub struct MockPage {
    state: Mutex<MockPageState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockPageState {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    /// Append a screen. The first screen is shown until something advances.
    pub fn with_screen(self, screen: MockScreen) -> Self {
        self.state.lock().unwrap().screens.push(screen);
        self
    }

    /// Any interaction with `selector` errors.
    pub fn failing_selector(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(selector.to_string());
        self
    }

    /// `goto` times out.
    pub fn failing_navigation(self) -> Self {
        self.state.lock().unwrap().navigation_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn action_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Click(selector) => Some(selector),
                _ => None,
            })
            .collect()
    }

    pub fn visited(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Goto(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Everything typed into `selector`, concatenated.
    pub fn typed_into(&self, selector: &str) -> String {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::SendKeys(s, text) if s == selector => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn screen_index(&self) -> usize {
        self.state.lock().unwrap().current
    }

    fn record(&self, call: PageCall) -> std::sync::MutexGuard<'_, MockPageState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }

    fn interact(&self, call: PageCall, element: &ElementHandle) -> Result<(), BrowserError> {
        let state = self.record(call);
        state.check(&element.0)?;
        if state.element(&element.0).is_none() {
            return Err(BrowserError::Driver(format!("stale element {}", element.0)));
        }
        Ok(())
    }
}

#[async_trait]
impl BasePage for MockPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.record(PageCall::Goto(url.to_string()));
        if state.navigation_fails {
            return Err(BrowserError::timeout(format!("navigation to {}", url), timeout));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.record(PageCall::CurrentUrl).url.clone())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let state = self.record(PageCall::Query(selector.to_string()));
        state.check(selector)?;
        Ok(state
            .element(selector)
            .map(|_| ElementHandle(selector.to_string())))
    }

    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, BrowserError> {
        let state = self.record(PageCall::WaitFor(selector.to_string()));
        state.check(selector)?;
        state
            .element(selector)
            .map(|_| ElementHandle(selector.to_string()))
            .ok_or_else(|| BrowserError::timeout(selector, timeout))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.interact(PageCall::Click(element.0.clone()), element)?;
        let mut state = self.state.lock().unwrap();
        let Some(target) = state.element(&element.0).cloned() else {
            return Ok(());
        };
        if let Some(url) = target.navigates_to {
            state.url = url;
        }
        if target.advances {
            state.current += 1;
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.interact(PageCall::Clear(element.0.clone()), element)
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.interact(
            PageCall::SendKeys(element.0.clone(), text.to_string()),
            element,
        )
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.interact(PageCall::Text(element.0.clone()), element)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .element(&element.0)
            .map(|e| e.text.clone())
            .unwrap_or_default())
    }

    async fn set_input_file(
        &self,
        element: &ElementHandle,
        path: &str,
    ) -> Result<(), BrowserError> {
        self.interact(
            PageCall::SetInputFile(element.0.clone(), path.to_string()),
            element,
        )
    }

    async fn move_pointer(&self, x: i64, y: i64) -> Result<(), BrowserError> {
        self.record(PageCall::MovePointer(x, y));
        Ok(())
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError> {
        self.record(PageCall::ScrollBy(delta_y));
        Ok(())
    }
}

/// Hands out queued mock pages, then blank ones.
#[derive(Default)]
pub struct MockBrowser {
    pages: Mutex<VecDeque<Arc<MockPage>>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    shut_down: AtomicBool,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: Arc<MockPage>) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseBrowser for MockBrowser {
    async fn new_page(&self) -> Result<Arc<dyn BasePage>, BrowserError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let page: Arc<MockPage> = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockPage::new()));
        let page: Arc<dyn BasePage> = page;
        Ok(page)
    }

    async fn close_page(&self, _page: Arc<dyn BasePage>) -> Result<(), BrowserError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Test Task Queue
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked(Bytes),
    Rejected(Bytes),
}

#[derive(Default)]
struct QueueCounters {
    outcomes: Mutex<Vec<DeliveryOutcome>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    progress: AtomicUsize,
}

/// In-memory queue that records how each delivery was settled.
#[derive(Default)]
pub struct TestTaskQueue {
    pending: Mutex<VecDeque<Bytes>>,
    counters: Arc<QueueCounters>,
    drained: Mutex<Option<CancellationToken>>,
}

impl TestTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json<T: Serialize>(&self, message: &T) {
        let payload = serde_json::to_vec(message).unwrap();
        self.push_raw(payload);
    }

    pub fn push_raw(&self, payload: impl Into<Bytes>) {
        self.pending.lock().unwrap().push_back(payload.into());
    }

    /// Cancel `token` the first time the queue is found empty.
    pub fn cancel_when_drained(&self, token: CancellationToken) {
        *self.drained.lock().unwrap() = Some(token);
    }

    pub fn outcomes(&self) -> Vec<DeliveryOutcome> {
        self.counters.outcomes.lock().unwrap().clone()
    }

    pub fn acked(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, DeliveryOutcome::Acked(_)))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, DeliveryOutcome::Rejected(_)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Progress signals sent across all deliveries.
    pub fn progress_signals(&self) -> usize {
        self.counters.progress.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseTaskQueue for TestTaskQueue {
    async fn next_delivery(&self, wait: Duration) -> Result<Option<Delivery>> {
        let next = self.pending.lock().unwrap().pop_front();
        let Some(payload) = next else {
            if let Some(token) = self.drained.lock().unwrap().take() {
                token.cancel();
                return Ok(None);
            }
            tokio::time::sleep(wait).await;
            return Ok(None);
        };

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        Ok(Some(Delivery::new(
            payload.clone(),
            Box::new(TestAcker {
                payload,
                counters: Arc::clone(&self.counters),
            }),
        )))
    }
}

struct TestAcker {
    payload: Bytes,
    counters: Arc<QueueCounters>,
}

impl TestAcker {
    fn settle(self, outcome: DeliveryOutcome) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.counters.outcomes.lock().unwrap().push(outcome);
    }
}

#[async_trait]
impl DeliveryAcker for TestAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        let payload = self.payload.clone();
        self.settle(DeliveryOutcome::Acked(payload));
        Ok(())
    }

    async fn reject(self: Box<Self>) -> Result<()> {
        let payload = self.payload.clone();
        self.settle(DeliveryOutcome::Rejected(payload));
        Ok(())
    }

    async fn progress(&self) -> Result<()> {
        self.counters.progress.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Test Stores
// =============================================================================

/// Application fixture with everything but platform and status defaulted.
pub fn sample_application(platform: Platform, status: ApplicationStatus) -> ApplicationRecord {
    let now = Utc::now();
    let job_id = Uuid::new_v4().simple().to_string();
    ApplicationRecord {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        platform,
        link: format!("https://jobs.example.com/{}/{}", platform, job_id),
        platform_job_id: job_id,
        job_title: "Backend Engineer".to_string(),
        company: "Acme".to_string(),
        status,
        applied_at: now,
        status_checked_at: None,
        follow_up_sent: false,
        follow_up_sent_at: None,
        retries: 1,
        last_error: None,
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

/// Same selection semantics as the Postgres queries.
#[derive(Default)]
pub struct TestApplicationStore {
    records: Mutex<Vec<ApplicationRecord>>,
    failing_writes: Mutex<HashSet<Uuid>>,
}

impl TestApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ApplicationRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn get(&self, id: Uuid) -> Option<ApplicationRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<ApplicationRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Status writes for `id` fail.
    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing_writes.lock().unwrap().insert(id);
    }

    fn update<F: FnOnce(&mut ApplicationRecord)>(&self, id: Uuid, apply: F) -> Result<()> {
        if self.failing_writes.lock().unwrap().contains(&id) {
            return Err(anyhow!("scripted write failure for {}", id));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("application {} not found", id))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for TestApplicationStore {
    async fn find_stale_for_status_check(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>> {
        let mut stale: Vec<ApplicationRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status.is_trackable())
            .filter(|r| r.status_checked_at.map_or(true, |at| at < cutoff))
            .cloned()
            .collect();
        stale.sort_by_key(|r| (r.status_checked_at.is_some(), r.status_checked_at, r.applied_at));
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }

    async fn find_due_for_follow_up(
        &self,
        applied_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApplicationRecord>> {
        let mut due: Vec<ApplicationRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == ApplicationStatus::Applied)
            .filter(|r| !r.follow_up_sent && r.applied_at <= applied_before)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.applied_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update(id, |r| {
            r.status = status;
            r.status_checked_at = Some(checked_at);
        })
    }

    async fn touch_status_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |r| r.status_checked_at = Some(checked_at))
    }

    async fn mark_follow_up_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        let mut flipped = false;
        self.update(id, |r| {
            if !r.follow_up_sent {
                r.follow_up_sent = true;
                r.follow_up_sent_at = Some(sent_at);
                flipped = true;
            }
        })?;
        Ok(flipped)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<ApplicationRecord> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let existing = records.iter_mut().find(|r| {
            r.user_id == attempt.user_id
                && r.platform == attempt.platform
                && r.platform_job_id == attempt.platform_job_id
        });

        if let Some(record) = existing {
            if matches!(
                record.status,
                ApplicationStatus::Pending | ApplicationStatus::Failed
            ) {
                if attempt.status == ApplicationStatus::Applied {
                    record.applied_at = now;
                }
                record.status = attempt.status;
            }
            record.retries += 1;
            record.last_error = attempt.last_error.clone();
            record.updated_at = now;
            return Ok(record.clone());
        }

        let record = ApplicationRecord {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            platform: attempt.platform,
            platform_job_id: attempt.platform_job_id.clone(),
            job_title: attempt.job_title.clone(),
            company: attempt.company.clone(),
            link: attempt.link.clone(),
            status: attempt.status,
            applied_at: now,
            status_checked_at: None,
            follow_up_sent: false,
            follow_up_sent_at: None,
            retries: 1,
            last_error: attempt.last_error.clone(),
            metadata: attempt.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }
}

pub fn sample_credentials() -> PlatformCredentials {
    PlatformCredentials {
        email: "applicant@example.com".to_string(),
        password: "correct horse".to_string(),
        phone: Some("5551234567".to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        resume_path: Some("/data/resumes/ada.pdf".to_string()),
    }
}

#[derive(Default)]
pub struct TestCredentialStore {
    credentials: Mutex<HashMap<String, PlatformCredentials>>,
}

impl TestCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, reference: &str, credentials: PlatformCredentials) -> Self {
        self.credentials
            .lock()
            .unwrap()
            .insert(reference.to_string(), credentials);
        self
    }
}

#[async_trait]
impl CredentialStore for TestCredentialStore {
    async fn resolve(&self, reference: &str) -> Result<Option<PlatformCredentials>> {
        Ok(self.credentials.lock().unwrap().get(reference).cloned())
    }
}

// =============================================================================
// Recording Delay
// =============================================================================

/// Never waits; remembers which bands were asked for.
#[derive(Default)]
pub struct RecordingDelay {
    requested: Mutex<Vec<PauseBand>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bands(&self) -> Vec<PauseBand> {
        self.requested.lock().unwrap().clone()
    }

    pub fn count(&self, band: PauseBand) -> usize {
        self.bands().iter().filter(|b| **b == band).count()
    }
}

impl DelayStrategy for RecordingDelay {
    fn pick(&self, band: PauseBand) -> Duration {
        self.requested.lock().unwrap().push(band);
        Duration::ZERO
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub cache: Arc<MemoryCache>,
    pub nats: Arc<TestNats>,
    pub applications: Arc<TestApplicationStore>,
    pub credentials: Arc<TestCredentialStore>,
    pub browser: Arc<MockBrowser>,
    pub page: Arc<MockPage>,
    pub queue: Arc<TestTaskQueue>,
    pub delay: Arc<RecordingDelay>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(MemoryCache::new()),
            nats: Arc::new(TestNats::new()),
            applications: Arc::new(TestApplicationStore::new()),
            credentials: Arc::new(TestCredentialStore::new()),
            browser: Arc::new(MockBrowser::new()),
            page: Arc::new(MockPage::new()),
            queue: Arc::new(TestTaskQueue::new()),
            delay: Arc::new(RecordingDelay::new()),
        }
    }

    /// Set the page the worker drives
    pub fn mock_page(mut self, page: MockPage) -> Self {
        self.page = Arc::new(page);
        self
    }

    /// Set the browser the schedulers open pages from
    pub fn mock_browser(mut self, browser: MockBrowser) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    pub fn mock_credentials(mut self, credentials: TestCredentialStore) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Pacer that records bands instead of sleeping.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.delay.clone())
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_on_tokio_clock() {
        let cache = MemoryCache::new();
        assert!(cache.set_nx_ex("lock", "1", Duration::from_secs(10)).await.unwrap());
        assert!(!cache.set_nx_ex("lock", "1", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(cache.get("lock").await.unwrap().is_none());
        assert!(cache.set_nx_ex("lock", "1", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_cache_ltrim_matches_redis() {
        let cache = MemoryCache::new();
        for i in 0..5 {
            cache.lpush("history", &i.to_string()).await.unwrap();
        }

        cache.ltrim("history", 0, 2).await.unwrap();

        assert_eq!(cache.list("history"), vec!["4", "3", "2"]);
        cache.ltrim("history", 5, 10).await.unwrap();
        assert_eq!(cache.llen("history").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_page_advances_screens() {
        let page = MockPage::new()
            .with_screen(MockScreen::new().with("#next", MockElement::new("Next").advancing()))
            .with_screen(MockScreen::new().with("#done", MockElement::present()));

        let next = page.query("#next").await.unwrap().unwrap();
        page.click(&next).await.unwrap();

        assert_eq!(page.screen_index(), 1);
        assert!(page.query("#next").await.unwrap().is_none());
        assert!(page.query("#done").await.unwrap().is_some());
    }
}

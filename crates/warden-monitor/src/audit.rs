//! # Audit Logger
//!
//! Privacy-preserving, batched audit trail of every scan.
//!
//! ## Threat Model
//!
//! | Threat | Defense |
//! |--------|---------|
//! | Audit trail leaks prompts | Input stored only as SHA-256 |
//! | Audit trail leaks identities | User id stored as a 16-hex hash prefix |
//! | Audit outage fails requests | Store errors are logged and swallowed |
//! | Lost records on shutdown | `close()` waits for the timer, then flushes |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      AUDIT LOGGER                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  log() ──▶ AuditRecord ──▶ buffer ──┬─▶ len ≥ batch_size │
//! │                                     │     flush inline   │
//! │           interval timer ───────────┤                    │
//! │                                     │                    │
//! │           close() ─ stop + join ────┘─▶ final flush      │
//! │                                           │              │
//! │                                  ┌────────▼─────────┐    │
//! │                                  │   AuditStore     │    │
//! │                                  │ console / memory │    │
//! │                                  └──────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Notes
//!
//! - Raw input text never enters a record
//! - Flushing an empty buffer is a no-op
//! - The timer is owned by the logger and stopped exactly once
//! - A batch the timer has taken is always written before `close()` returns

use std::io::Write;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_policy::{Decision, ScanContext, ScanResult, Violation};

use crate::error::{MonitorError, Result};

/// Default number of buffered records that triggers an inline flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default timer flush interval.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Hex characters of the user-id hash kept in a record.
pub const USER_HASH_LEN: usize = 16;

/// Shortest timer period accepted.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Kind of request a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    ToolCall,
    Chat,
}

/// Caller-supplied details known only after the model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditExtras {
    pub model: Option<String>,
    pub output_tokens: Option<u64>,
    pub tools_called: Vec<String>,
    pub cost_usd: Option<f64>,
}

impl AuditExtras {
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_output_tokens(mut self, tokens: u64) -> Self {
        self.output_tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn with_tool_called(mut self, tool: impl Into<String>) -> Self {
        self.tools_called.push(tool.into());
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub user_hash: Option<String>,
    pub request_type: RequestType,
    /// SHA-256 of the scanned input, hex encoded.
    pub input_hash: String,
    /// ceil(chars / 4)
    pub input_tokens: u64,
    pub decision: Decision,
    pub reason: String,
    pub violations: Vec<Violation>,
    pub scan_duration_ms: f64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_called: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl AuditRecord {
    /// Build a record without retaining the raw input.
    pub fn build(
        input: &str,
        result: &ScanResult,
        context: &ScanContext,
        extras: AuditExtras,
    ) -> Self {
        let request_type = if context.has_tools() {
            RequestType::ToolCall
        } else {
            RequestType::Chat
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id: context.session_id.clone(),
            agent_id: context.agent_id.clone(),
            user_hash: context.user_id.as_deref().map(hash_user),
            request_type,
            input_hash: hex::encode(Sha256::digest(input.as_bytes())),
            input_tokens: estimate_tokens(input),
            decision: result.decision,
            reason: result.reason(),
            violations: result.violations.clone(),
            scan_duration_ms: result.metadata.duration_ms,
            cached: result.metadata.cached,
            model: extras.model,
            output_tokens: extras.output_tokens,
            tools_called: extras.tools_called,
            cost_usd: extras.cost_usd,
        }
    }
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(input: &str) -> u64 {
    (input.chars().count() as u64).div_ceil(4)
}

fn hash_user(user_id: &str) -> String {
    let mut hash = hex::encode(Sha256::digest(user_id.as_bytes()));
    hash.truncate(USER_HASH_LEN);
    hash
}

/// Destination for audit records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn write(&self, record: &AuditRecord) -> Result<()>;

    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Development sink writing one JSON line per record.
pub struct ConsoleAuditStore {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleAuditStore {
    /// Write to stderr, keeping stdout free for program output.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleAuditStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditStore for ConsoleAuditStore {
    async fn write(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut out = self.out.lock().map_err(MonitorError::store)?;
        writeln!(out, "[audit] {line}")?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.out.lock().map_err(MonitorError::store)?.flush()?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.flush().await
    }
}

/// In-memory sink for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
    batches: AtomicUsize,
    retention: Option<chrono::Duration>,
    closed: AtomicBool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop records older than `days` on every flush.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention = Some(chrono::Duration::days(i64::from(days)));
        self
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `write_batch` calls received.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Insert a record directly, bypassing batching.
    pub fn insert(&self, record: AuditRecord) {
        self.lock().push(record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(MonitorError::Closed("memory audit store"));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn write(&self, record: &AuditRecord) -> Result<()> {
        self.ensure_open()?;
        self.lock().push(record.clone());
        Ok(())
    }

    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        self.ensure_open()?;
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.lock().extend_from_slice(records);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if let Some(retention) = self.retention {
            let cutoff = Utc::now() - retention;
            let mut records = self.lock();
            let before = records.len();
            records.retain(|r| r.timestamp >= cutoff);
            let dropped = before - records.len();
            if dropped > 0 {
                debug!(dropped, "audit retention removed records");
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Batching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLoggerConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl AuditLoggerConfig {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

struct Shared {
    buffer: Mutex<Vec<AuditRecord>>,
    store: Arc<dyn AuditStore>,
}

impl Shared {
    fn buffer(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self) {
        let batch = mem::take(&mut *self.buffer());
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.store.write_batch(&batch).await {
            warn!(error = %e, records = batch.len(), "audit batch write failed, records dropped");
            return;
        }
        if let Err(e) = self.store.flush().await {
            warn!(error = %e, "audit store flush failed");
        }
        debug!(records = batch.len(), "audit batch flushed");
    }
}

/// Buffers records and writes them to an [`AuditStore`] in batches.
pub struct AuditLogger {
    shared: Arc<Shared>,
    batch_size: usize,
    timer: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl AuditLogger {
    /// Create a logger. The flush timer starts when called inside a tokio
    /// runtime. Outside one, records flush on batch size and on close only.
    pub fn new(store: Arc<dyn AuditStore>, config: AuditLoggerConfig) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Vec::new()),
            store,
        });

        let (shutdown, mut stop) = watch::channel(false);
        let timer = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&shared);
                let period = config.flush_interval.max(MIN_FLUSH_INTERVAL);
                Some(handle.spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    // the first tick completes immediately
                    ticker.tick().await;
                    loop {
                        // a flush in progress always runs to completion
                        tokio::select! {
                            _ = ticker.tick() => shared.flush().await,
                            _ = stop.changed() => break,
                        }
                    }
                    debug!("audit flush timer stopped");
                }))
            }
            Err(_) => {
                warn!("no tokio runtime, audit flush timer disabled");
                None
            }
        };

        Self {
            shared,
            batch_size: config.batch_size.max(1),
            timer: Mutex::new(timer),
            shutdown,
            closed: AtomicBool::new(false),
        }
    }

    /// Record one scan. Never fails; store errors are logged.
    pub async fn log(
        &self,
        input: &str,
        result: &ScanResult,
        context: &ScanContext,
        extras: AuditExtras,
    ) {
        if self.is_closed() {
            debug!("audit logger closed, record dropped");
            return;
        }

        let record = AuditRecord::build(input, result, context, extras);
        let full = {
            let mut buffer = self.shared.buffer();
            buffer.push(record);
            buffer.len() >= self.batch_size
        };
        if full {
            self.shared.flush().await;
        }
    }

    /// Write everything buffered so far.
    pub async fn flush(&self) {
        self.shared.flush().await;
    }

    /// Stop the timer, flush the remainder and close the store. Idempotent.
    ///
    /// Waits for a timer flush already in progress, so no batch taken from
    /// the buffer is lost.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        if let Some(timer) = self.take_timer() {
            if let Err(e) = timer.await {
                warn!(error = %e, "audit flush timer failed");
            }
        }
        self.shared.flush().await;
        if let Err(e) = self.shared.store.close().await {
            warn!(error = %e, "audit store close failed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.shared.buffer().len()
    }

    /// True while the flush timer task is alive.
    pub fn timer_active(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn take_timer(&self) -> Option<JoinHandle<()>> {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        // the timer finishes any in-flight write, then exits
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("batch_size", &self.batch_size)
            .field("buffered", &self.buffered())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_policy::{ScanMetadata, ToolCall, ViolationCategory};

    fn result(decision: Decision) -> ScanResult {
        let violations = if decision.is_blocked() {
            vec![Violation::new(
                ViolationCategory::PromptInjection,
                "heuristic",
                0.9,
                0.3,
                "Prompt injection: override",
            )]
        } else {
            Vec::new()
        };
        ScanResult::new(decision, "x".to_string(), violations, ScanMetadata::default())
    }

    fn config(batch_size: usize) -> AuditLoggerConfig {
        AuditLoggerConfig::default()
            .with_batch_size(batch_size)
            .with_flush_interval(Duration::from_secs(3600))
    }

    #[test]
    fn test_record_hashes_input_and_user() {
        let ctx = ScanContext::new().with_user("alice@example.com");
        let record = AuditRecord::build(
            "my secret prompt",
            &result(Decision::Allow),
            &ctx,
            AuditExtras::default(),
        );

        assert_eq!(record.input_hash.len(), 64);
        assert_eq!(record.user_hash.as_ref().map(String::len), Some(USER_HASH_LEN));
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("alice"));
    }

    #[test]
    fn test_request_type_and_reason() {
        let ctx = ScanContext::new().with_tool(ToolCall::new("search"));
        let record = AuditRecord::build("hi", &result(Decision::Block), &ctx, AuditExtras::default());
        assert_eq!(record.request_type, RequestType::ToolCall);
        assert_eq!(record.reason, "Prompt injection: override");

        let record = AuditRecord::build(
            "hi",
            &result(Decision::Allow),
            &ScanContext::new(),
            AuditExtras::default(),
        );
        assert_eq!(record.request_type, RequestType::Chat);
        assert_eq!(record.reason, "allow");
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_extras_are_carried() {
        let extras = AuditExtras::default()
            .with_model("gpt-4o")
            .with_output_tokens(42)
            .with_tool_called("search")
            .with_cost(0.01);
        let record =
            AuditRecord::build("hi", &result(Decision::Allow), &ScanContext::new(), extras);
        assert_eq!(record.model.as_deref(), Some("gpt-4o"));
        assert_eq!(record.output_tokens, Some(42));
        assert_eq!(record.tools_called, vec!["search"]);
        assert_eq!(record.cost_usd, Some(0.01));
    }

    #[tokio::test]
    async fn test_batch_size_triggers_single_write() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone(), config(3));
        let ctx = ScanContext::new();

        for _ in 0..3 {
            logger.log("hi", &result(Decision::Allow), &ctx, AuditExtras::default()).await;
        }

        assert_eq!(store.batch_count(), 1);
        assert_eq!(store.len(), 3);
        assert_eq!(logger.buffered(), 0);
    }

    #[tokio::test]
    async fn test_close_flushes_remainder_and_stops_timer() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone(), config(10));
        logger
            .log("hi", &result(Decision::Allow), &ScanContext::new(), AuditExtras::default())
            .await;
        assert!(logger.timer_active());
        assert_eq!(store.len(), 0);

        logger.close().await;
        assert_eq!(store.len(), 1);
        assert!(!logger.timer_active());
        assert!(store.is_closed());

        // second close is a no-op
        logger.close().await;
        logger
            .log("late", &result(Decision::Allow), &ScanContext::new(), AuditExtras::default())
            .await;
        assert_eq!(logger.buffered(), 0);
    }

    #[tokio::test]
    async fn test_timer_flushes_in_background() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(
            store.clone(),
            AuditLoggerConfig::default()
                .with_batch_size(100)
                .with_flush_interval(Duration::from_millis(20)),
        );
        logger
            .log("hi", &result(Decision::Allow), &ScanContext::new(), AuditExtras::default())
            .await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.len(), 1);
        logger.close().await;
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone(), config(10));
        logger.flush().await;
        logger.flush().await;
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn test_logger_without_runtime_has_no_timer() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone(), config(1));
        assert!(!logger.timer_active());

        tokio_test::block_on(logger.log(
            "hi",
            &result(Decision::Allow),
            &ScanContext::new(),
            AuditExtras::default(),
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_retention_drops_old_records() {
        let store = MemoryAuditStore::new().with_retention_days(7);
        let mut old = AuditRecord::build(
            "old",
            &result(Decision::Allow),
            &ScanContext::new(),
            AuditExtras::default(),
        );
        old.timestamp = Utc::now() - chrono::Duration::days(30);
        store.insert(old);
        store
            .write(&AuditRecord::build(
                "new",
                &result(Decision::Allow),
                &ScanContext::new(),
                AuditExtras::default(),
            ))
            .await
            .unwrap();

        store.flush().await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_console_store_writes_json_lines() {
        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);
        impl Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = Capture::default();
        let store = ConsoleAuditStore::with_writer(Box::new(sink.clone()));
        let record = AuditRecord::build(
            "hi",
            &result(Decision::Block),
            &ScanContext::new(),
            AuditExtras::default(),
        );
        store.write_batch(&[record.clone(), record]).await.unwrap();

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("[audit] {")));
    }

    // =========================================================================
    // Security-focused tests
    // =========================================================================

    struct FailingStore;

    #[async_trait]
    impl AuditStore for FailingStore {
        async fn write(&self, _record: &AuditRecord) -> Result<()> {
            Err(MonitorError::store("disk full"))
        }
        async fn flush(&self) -> Result<()> {
            Err(MonitorError::store("disk full"))
        }
        async fn close(&self) -> Result<()> {
            Err(MonitorError::store("disk full"))
        }
    }

    /// Store whose writes take a while, to catch the timer mid-batch.
    #[derive(Default)]
    struct SlowStore {
        written: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditStore for SlowStore {
        async fn write(&self, record: &AuditRecord) -> Result<()> {
            self.written.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.written.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
        async fn flush(&self) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_during_timer_write_keeps_every_record() {
        let store = Arc::new(SlowStore::default());
        let logger = AuditLogger::new(
            store.clone(),
            AuditLoggerConfig::default()
                .with_batch_size(100)
                .with_flush_interval(Duration::from_millis(20)),
        );
        for i in 0..5 {
            let input = format!("request {i}");
            logger
                .log(&input, &result(Decision::Allow), &ScanContext::new(), AuditExtras::default())
                .await;
        }

        // the timer has taken the batch and is inside the slow write
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(logger.buffered(), 0);
        assert!(store.written.lock().unwrap().is_empty());

        logger.close().await;
        assert_eq!(store.written.lock().unwrap().len(), 5);
        assert!(!logger.timer_active());
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let logger = AuditLogger::new(Arc::new(FailingStore), config(1));
        logger
            .log("hi", &result(Decision::Allow), &ScanContext::new(), AuditExtras::default())
            .await;
        assert_eq!(logger.buffered(), 0);
        logger.close().await;
        assert!(logger.is_closed());
    }
}

//! Integration tests for the cache manager: quota enforcement, pin
//! lifecycle, access bookkeeping, and eviction ordering against a real
//! in-memory SQLite store.

use async_trait::async_trait;
use bridge_traits::assets::AssetFetcher;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::remote::{RecipeId, RemoteRecipe};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_cache::{
    create_test_pool, CacheError, CacheManager, QuotaConfig, SyncStatus, ASSET_BYTES_ESTIMATE,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::sync::Arc;

// ============================================================================
// Test doubles
// ============================================================================

/// Asset fetcher returning fixed bytes, with per-URL failure injection.
struct FakeFetcher {
    payload: Vec<u8>,
    failing_urls: Vec<String>,
}

impl FakeFetcher {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            failing_urls: Vec::new(),
        }
    }

    fn failing_for(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> BridgeResult<Bytes> {
        if self.failing_urls.iter().any(|u| u == url) {
            return Err(BridgeError::OperationFailed(format!(
                "injected failure for {url}"
            )));
        }
        Ok(Bytes::from(self.payload.clone()))
    }
}

/// Manually advanced clock so access recency is deterministic.
struct SteppingClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    fn starting_at(at: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::Mutex::new(at),
        })
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn recipe(id: &str, with_image: bool) -> RemoteRecipe {
    RemoteRecipe {
        id: RecipeId::new(id),
        title: format!("Recipe {id}"),
        description: Some("test fixture".to_string()),
        ingredients: vec!["flour".to_string(), "water".to_string()],
        instructions: vec!["mix".to_string(), "bake".to_string()],
        image_url: with_image.then(|| format!("https://img.example/{id}.jpg")),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

async fn manager_with(
    quota: QuotaConfig,
    fetcher: Arc<dyn AssetFetcher>,
    clock: Arc<SteppingClock>,
    event_bus: EventBus,
) -> CacheManager {
    let pool = create_test_pool().await.expect("in-memory pool");
    CacheManager::new(pool, quota, fetcher, clock, event_bus)
}

fn roomy_quota() -> QuotaConfig {
    QuotaConfig {
        max_bytes: 50 * 1024 * 1024,
        max_count: 100,
    }
}

// ============================================================================
// Quota invariant
// ============================================================================

#[tokio::test]
async fn test_usage_never_exceeds_ceilings_across_lifecycle() {
    let quota = QuotaConfig {
        max_bytes: 3 * ASSET_BYTES_ESTIMATE,
        max_count: 100,
    };
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        quota,
        Arc::new(FakeFetcher::new(vec![7; 64])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    // Two image-bearing pins fit; a third crosses the byte ceiling.
    manager.pin(&recipe("r1", true)).await.unwrap();
    manager.pin(&recipe("r2", true)).await.unwrap();
    let err = manager.pin(&recipe("r3", true)).await.unwrap_err();
    assert!(matches!(err, CacheError::QuotaExceeded { .. }));

    let usage = manager.usage().await.unwrap();
    assert_eq!(usage.count, 2);
    assert!(usage.total_bytes <= quota.max_bytes);

    // Explicit eviction makes room; the retry then succeeds.
    let removed = manager.evict(ASSET_BYTES_ESTIMATE).await.unwrap();
    assert_eq!(removed, 1);
    manager.pin(&recipe("r3", true)).await.unwrap();

    let usage = manager.usage().await.unwrap();
    assert_eq!(usage.count, 2);
    assert!(usage.total_bytes <= quota.max_bytes);
}

#[tokio::test]
async fn test_concurrent_pins_cannot_over_admit() {
    // Two pins of different records race for the last slot; the admission
    // check and the insert commit as one step, so exactly one wins.
    for _ in 0..25 {
        let quota = QuotaConfig {
            max_bytes: 50 * 1024 * 1024,
            max_count: 1,
        };
        let clock = SteppingClock::starting_at(start_time());
        let manager = Arc::new(
            manager_with(
                quota,
                Arc::new(FakeFetcher::new(vec![0])),
                clock.clone(),
                EventBus::default(),
            )
            .await,
        );

        let (a, b) = tokio::join!(
            {
                let manager = manager.clone();
                tokio::spawn(async move { manager.pin(&recipe("a", false)).await })
            },
            {
                let manager = manager.clone();
                tokio::spawn(async move { manager.pin(&recipe("b", false)).await })
            }
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(
            a.is_ok() != b.is_ok(),
            "exactly one pin must win the last slot (a={:?}, b={:?})",
            a.is_ok(),
            b.is_ok()
        );
        for outcome in [a, b] {
            if let Err(err) = outcome {
                assert!(matches!(err, CacheError::QuotaExceeded { .. }));
            }
        }

        let usage = manager.usage().await.unwrap();
        assert_eq!(usage.count, 1);
        assert!(usage.total_bytes <= quota.max_bytes);
    }
}

#[tokio::test]
async fn test_count_ceiling_of_one() {
    let quota = QuotaConfig {
        max_bytes: 50 * 1024 * 1024,
        max_count: 1,
    };
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        quota,
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    manager.pin(&recipe("only", false)).await.unwrap();
    assert!(matches!(
        manager.pin(&recipe("second", false)).await,
        Err(CacheError::QuotaExceeded { .. })
    ));

    // Re-pinning the resident record is a replacement, not an admission.
    manager.pin(&recipe("only", false)).await.unwrap();
    assert_eq!(manager.usage().await.unwrap().count, 1);
}

// ============================================================================
// Pin lifecycle
// ============================================================================

#[tokio::test]
async fn test_unpin_is_idempotent() {
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        roomy_quota(),
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    manager.pin(&recipe("r1", false)).await.unwrap();
    assert!(manager.unpin(&RecipeId::new("r1")).await.unwrap());
    assert!(!manager.unpin(&RecipeId::new("r1")).await.unwrap());
    assert!(!manager.is_pinned(&RecipeId::new("r1")).await.unwrap());
}

#[tokio::test]
async fn test_touch_advances_access_bookkeeping() {
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        roomy_quota(),
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    let pinned = manager.pin(&recipe("r1", false)).await.unwrap();
    assert_eq!(pinned.access_count, 0);

    clock.advance(Duration::minutes(5));
    let touched = manager.touch(&RecipeId::new("r1")).await.unwrap();
    assert_eq!(touched.access_count, 1);
    assert_eq!(touched.last_accessed_at, pinned.last_accessed_at + Duration::minutes(5));

    // Touching an absent record is an error, not a silent no-op.
    assert!(matches!(
        manager.touch(&RecipeId::new("ghost")).await,
        Err(CacheError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_list_pinned_orders_by_recency() {
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        roomy_quota(),
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    manager.pin(&recipe("r1", false)).await.unwrap();
    clock.advance(Duration::minutes(1));
    manager.pin(&recipe("r2", false)).await.unwrap();
    clock.advance(Duration::minutes(1));
    manager.touch(&RecipeId::new("r1")).await.unwrap();

    let listed = manager.list_pinned().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.remote_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2"]);
}

// ============================================================================
// Eviction ordering
// ============================================================================

#[tokio::test]
async fn test_eviction_prefers_low_access_count_then_stale() {
    let clock = SteppingClock::starting_at(start_time());
    let manager = manager_with(
        roomy_quota(),
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        EventBus::default(),
    )
    .await;

    // A: 5 accesses. B: 1 access, touched later than C. C: 1 access, stale.
    manager.pin(&recipe("a", false)).await.unwrap();
    manager.pin(&recipe("b", false)).await.unwrap();
    manager.pin(&recipe("c", false)).await.unwrap();

    clock.advance(Duration::minutes(1));
    manager.touch(&RecipeId::new("c")).await.unwrap();
    clock.advance(Duration::minutes(1));
    manager.touch(&RecipeId::new("b")).await.unwrap();
    for _ in 0..5 {
        clock.advance(Duration::minutes(1));
        manager.touch(&RecipeId::new("a")).await.unwrap();
    }

    let record_bytes = manager.list_pinned().await.unwrap()[0].storage_bytes;

    // Freeing one record's worth must take C (tie on access_count with B,
    // by staler last access).
    let removed = manager.evict(record_bytes).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!manager.is_pinned(&RecipeId::new("c")).await.unwrap());
    assert!(manager.is_pinned(&RecipeId::new("b")).await.unwrap());
    assert!(manager.is_pinned(&RecipeId::new("a")).await.unwrap());

    // The next request takes B before A.
    manager.evict(record_bytes).await.unwrap();
    assert!(!manager.is_pinned(&RecipeId::new("b")).await.unwrap());
    assert!(manager.is_pinned(&RecipeId::new("a")).await.unwrap());
}

#[tokio::test]
async fn test_evict_emits_events_and_reports_freed_bytes() {
    let clock = SteppingClock::starting_at(start_time());
    let event_bus = EventBus::default();
    let mut events = event_bus.subscribe();
    let manager = manager_with(
        roomy_quota(),
        Arc::new(FakeFetcher::new(vec![0])),
        clock.clone(),
        event_bus,
    )
    .await;

    manager.pin(&recipe("r1", false)).await.unwrap();
    manager.pin(&recipe("r2", false)).await.unwrap();

    let removed = manager.evict(i64::MAX / 2).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(manager.usage().await.unwrap().count, 0);

    let mut evicted_ids = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Cache(CacheEvent::Evicted { remote_id, .. }) = event {
            evicted_ids.push(remote_id);
        }
    }
    evicted_ids.sort();
    assert_eq!(evicted_ids, vec!["r1", "r2"]);
}

// ============================================================================
// Asset handling
// ============================================================================

#[tokio::test]
async fn test_asset_failure_downgrades_but_pin_succeeds() {
    let clock = SteppingClock::starting_at(start_time());
    let event_bus = EventBus::default();
    let mut events = event_bus.subscribe();

    let fetcher = FakeFetcher::new(vec![1, 2, 3]).failing_for("https://img.example/bad.jpg");
    let manager = manager_with(roomy_quota(), Arc::new(fetcher), clock.clone(), event_bus).await;

    let good = manager.pin(&recipe("good", true)).await.unwrap();
    assert!(good.has_asset);

    let bad = manager.pin(&recipe("bad", true)).await.unwrap();
    assert!(!bad.has_asset);
    assert_eq!(bad.sync_status, SyncStatus::Synced);
    assert!(manager.is_pinned(&RecipeId::new("bad")).await.unwrap());

    let failures: Vec<CoreEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, CoreEvent::Cache(CacheEvent::AssetCacheFailed { .. })))
        .collect();
    assert_eq!(failures.len(), 1);
}

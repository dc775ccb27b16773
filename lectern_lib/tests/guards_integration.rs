use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lectern_lib::{GuardConfig, GuardError, ManualClock, RateLimiter, TtlCache};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    user_id: u64,
    display_name: String,
}

/// Stand-in for the remote profile lookup, counting how often it is hit.
struct ProfileBackend {
    calls: AtomicU64,
}

impl ProfileBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
        })
    }

    async fn fetch(&self, user_id: u64) -> Result<Profile, GuardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if user_id == 0 {
            return Err(GuardError::Upstream("no such user".into()));
        }
        Ok(Profile {
            user_id,
            display_name: format!("student-{user_id}"),
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Application-scoped guards, constructed explicitly instead of as globals.
struct Guards {
    clock: Arc<ManualClock>,
    profiles: Arc<TtlCache<Profile>>,
    limiter: Arc<RateLimiter>,
}

impl Guards {
    fn new(config: &GuardConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        Self {
            profiles: Arc::new(TtlCache::with_clock(config.cache_ttl(), clock.clone())),
            limiter: Arc::new(RateLimiter::with_clock(
                config.rate_limit_max_requests,
                config.rate_limit_window(),
                clock.clone(),
            )),
            clock,
        }
    }
}

fn test_config() -> GuardConfig {
    GuardConfig {
        cache_ttl_ms: 5_000,
        rate_limit_max_requests: 2,
        rate_limit_window_ms: 1_000,
    }
}

// ============================================================================
// Composition Tests
// ============================================================================

#[tokio::test]
async fn throttled_memoized_fetch_hits_backend_once() {
    let guards = Guards::new(&test_config());
    let backend = ProfileBackend::new();

    let b = Arc::clone(&backend);
    let memo = guards.profiles.memoize_by(
        move |user_id: u64| {
            let b = Arc::clone(&b);
            async move { b.fetch(user_id).await }
        },
        |user_id: &u64| format!("profile:{user_id}"),
    );

    // Cache hits still pass through the limiter, so the two-per-second budget
    // bounds the caller even when the backend is not touched.
    for _ in 0..2 {
        let profile = guards
            .limiter
            .with_rate_limit("user:7", || memo.call(7))
            .await
            .unwrap();
        assert_eq!(profile.display_name, "student-7");
    }
    assert_eq!(backend.calls(), 1);

    let third = guards
        .limiter
        .with_rate_limit("user:7", || memo.call(7))
        .await;
    assert!(matches!(third, Err(GuardError::RateLimited(_))));

    guards.clock.advance(Duration::from_millis(1_000));
    let fourth = guards
        .limiter
        .with_rate_limit("user:7", || memo.call(7))
        .await
        .unwrap();
    assert_eq!(fourth.user_id, 7);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn upstream_failure_passes_through_both_layers() {
    let guards = Guards::new(&test_config());
    let backend = ProfileBackend::new();

    let b = Arc::clone(&backend);
    let memo = guards.profiles.memoize(
        move |user_id: u64| {
            let b = Arc::clone(&b);
            async move { b.fetch(user_id).await }
        },
        "profile:missing",
    );

    let result = guards
        .limiter
        .with_rate_limit("user:0", || memo.call(0))
        .await;
    match result {
        Err(GuardError::Upstream(msg)) => assert_eq!(msg, "no such user"),
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert!(guards.profiles.get("profile:missing").is_none());
    assert_eq!(guards.limiter.remaining("user:0"), 1);
}

#[tokio::test]
async fn cached_profile_expires_after_ttl() {
    let guards = Guards::new(&test_config());
    let backend = ProfileBackend::new();

    let b = Arc::clone(&backend);
    let memo = guards.profiles.memoize(
        move |_: ()| {
            let b = Arc::clone(&b);
            async move { b.fetch(42).await }
        },
        "profile:me",
    );

    memo.call(()).await.unwrap();
    guards.clock.advance(Duration::from_millis(4_999));
    memo.call(()).await.unwrap();
    assert_eq!(backend.calls(), 1);

    guards.clock.advance(Duration::from_millis(2));
    memo.call(()).await.unwrap();
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn separate_instances_do_not_share_state() {
    let a = Guards::new(&test_config());
    let b = Guards::new(&test_config());

    a.profiles.set(
        "profile:1",
        Profile {
            user_id: 1,
            display_name: "one".into(),
        },
    );
    a.limiter.is_rate_limited("user:1");
    a.limiter.is_rate_limited("user:1");

    assert!(b.profiles.get("profile:1").is_none());
    assert!(!b.limiter.is_rate_limited("user:1"));
    assert!(a.limiter.is_rate_limited("user:1"));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_over_admit() {
    let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(3600)));
    let admitted = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let limiter = Arc::clone(&limiter);
        let admitted = Arc::clone(&admitted);
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                if !limiter.is_rate_limited("shared") {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 50);
    let stats = limiter.stats();
    assert_eq!(stats.admitted, 50);
    assert_eq!(stats.rejected, 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cache_is_shareable_across_tasks() {
    let cache: Arc<TtlCache<u64>> = Arc::new(TtlCache::new(Duration::from_secs(60)));

    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for i in 0..100u64 {
                cache.set(format!("w{worker}:{i}"), worker * 1000 + i);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len(), 400);
    assert_eq!(cache.get("w3:99"), Some(3099));
}

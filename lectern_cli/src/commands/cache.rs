use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use lectern_lib::{GuardConfig, TtlCache};

use crate::output::{print_cache_report, CacheCallRow, CacheReport, OutputFormat};
use crate::sim::{Pacer, Profile, SimulatedBackend};

#[derive(Args)]
pub struct CacheArgs {
    /// Number of profile lookups to perform
    #[arg(long, default_value = "5")]
    pub calls: u32,

    /// Delay between lookups in milliseconds
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Comma-separated user ids, cycled through in order
    #[arg(long, value_delimiter = ',', default_value = "me")]
    pub users: Vec<String>,

    /// Override the configured cache TTL in milliseconds
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Key the cache by user id instead of using one fixed slot
    #[arg(long)]
    pub derived_keys: bool,

    /// Make the first backend call fail
    #[arg(long)]
    pub fail_first: bool,

    /// Sweep expired entries after the last lookup
    #[arg(long)]
    pub purge: bool,
}

pub async fn run(
    args: &CacheArgs,
    config: &GuardConfig,
    pacer: &Pacer,
    format: &OutputFormat,
) -> Result<()> {
    if args.users.is_empty() {
        bail!("--users must name at least one user id");
    }

    let ttl = args
        .ttl_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.cache_ttl());
    let clock = pacer.clock();
    let cache: Arc<TtlCache<Profile>> = Arc::new(TtlCache::with_clock(ttl, clock.clone()));
    let backend = Arc::new(SimulatedBackend::new(args.fail_first));

    let b = Arc::clone(&backend);
    let fetch = move |user: String| {
        let b = Arc::clone(&b);
        async move { b.fetch_profile(&user).await }
    };
    let memo = if args.derived_keys {
        cache.memoize_by(fetch, |user: &String| format!("profile:{user}"))
    } else {
        cache.memoize(fetch, "profile")
    };

    tracing::info!(
        ttl_ms = ttl.as_millis() as u64,
        calls = args.calls,
        derived_keys = args.derived_keys,
        "running memoized profile lookups"
    );

    let start = clock.now();
    let mut rows = Vec::with_capacity(args.calls as usize);
    for call in 1..=args.calls {
        if call > 1 {
            pacer.wait(Duration::from_millis(args.interval_ms)).await;
        }
        let user = args.users[(call as usize - 1) % args.users.len()].clone();
        let key = memo.key_for(&user);
        let at_ms = clock.now().duration_since(start).as_millis();
        let before = backend.calls();

        let (outcome, value) = match memo.call(user.clone()).await {
            Ok(profile) if backend.calls() > before => ("miss", profile.display_name),
            Ok(profile) => ("hit", profile.display_name),
            Err(e) => ("error", e.to_string()),
        };
        rows.push(CacheCallRow {
            call,
            at_ms,
            user,
            key,
            outcome: outcome.to_string(),
            value,
        });
    }

    if args.purge {
        cache.purge_expired();
    }

    let report = CacheReport {
        calls: &rows,
        stats: cache.stats(),
        backend_calls: backend.calls(),
    };
    print_cache_report(&report, format);
    Ok(())
}

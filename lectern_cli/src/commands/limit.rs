use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use lectern_lib::{GuardConfig, RateLimiter};

use crate::output::{print_limit_report, LimitCallRow, LimitReport, OutputFormat};
use crate::sim::{Pacer, SimulatedBackend};

#[derive(Args)]
pub struct LimitArgs {
    /// Identity to throttle (user id, IP, ...)
    #[arg(long, default_value = "user:me")]
    pub key: String,

    /// Number of messages to attempt
    #[arg(long, default_value = "10")]
    pub requests: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value = "100")]
    pub interval_ms: u64,

    /// Override the configured budget per window
    #[arg(long)]
    pub max_requests: Option<u64>,

    /// Override the configured window length in milliseconds
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Clear the key's history after this many attempts
    #[arg(long)]
    pub reset_after: Option<u32>,
}

pub async fn run(
    args: &LimitArgs,
    config: &GuardConfig,
    pacer: &Pacer,
    format: &OutputFormat,
) -> Result<()> {
    let max_requests = args.max_requests.unwrap_or(config.rate_limit_max_requests);
    let window = args
        .window_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.rate_limit_window());
    let clock = pacer.clock();
    let limiter = Arc::new(RateLimiter::with_clock(max_requests, window, clock.clone()));
    let backend = Arc::new(SimulatedBackend::new(false));

    let b = Arc::clone(&backend);
    let to = args.key.clone();
    let send = limiter.throttle(
        move |body: String| {
            let b = Arc::clone(&b);
            let to = to.clone();
            async move { b.send_message(&to, &body).await }
        },
        args.key.clone(),
    );

    tracing::info!(
        key = %args.key,
        max_requests,
        window_ms = window.as_millis() as u64,
        "sending throttled messages"
    );

    let start = clock.now();
    let mut rows = Vec::with_capacity(args.requests as usize);
    for request in 1..=args.requests {
        if request > 1 {
            pacer.wait(Duration::from_millis(args.interval_ms)).await;
        }
        let at_ms = clock.now().duration_since(start).as_millis();
        let outcome = match send.call(format!("message #{request}")).await {
            Ok(_) => "admitted".to_string(),
            Err(e) if e.is_rate_limited() => "throttled".to_string(),
            Err(e) => format!("error: {e}"),
        };
        rows.push(LimitCallRow {
            request,
            at_ms,
            outcome,
            remaining: limiter.remaining(&args.key),
        });

        if args.reset_after == Some(request) {
            tracing::info!(key = %args.key, "resetting rate limit history");
            limiter.reset(&args.key);
        }
    }

    let report = LimitReport {
        key: &args.key,
        requests: &rows,
        stats: limiter.stats(),
    };
    print_limit_report(&report, format);
    Ok(())
}

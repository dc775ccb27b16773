//! Simulated upstream collaborator and pacing for the demo subcommands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lectern_lib::{Clock, GuardError, ManualClock, SystemClock};
use serde::Serialize;

/// Drives time between calls: real sleeps, or instant jumps on a manual clock.
pub enum Pacer {
    Real(Arc<SystemClock>),
    Simulated(Arc<ManualClock>),
}

impl Pacer {
    pub fn new(simulated: bool) -> Self {
        if simulated {
            Self::Simulated(Arc::new(ManualClock::new()))
        } else {
            Self::Real(Arc::new(SystemClock))
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        match self {
            Self::Real(clock) => clock.clone(),
            Self::Simulated(clock) => clock.clone(),
        }
    }

    pub async fn wait(&self, duration: Duration) {
        match self {
            Self::Real(_) => tokio::time::sleep(duration).await,
            Self::Simulated(clock) => clock.advance(duration),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    /// Which backend call produced this record.
    pub fetch_number: u64,
}

/// In-process stand-in for the hosted profile/messaging backend.
pub struct SimulatedBackend {
    calls: AtomicU64,
    fail_first: bool,
}

impl SimulatedBackend {
    pub fn new(fail_first: bool) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_first,
        }
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Profile, GuardError> {
        let fetch_number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        if self.fail_first && fetch_number == 1 {
            tracing::warn!(user_id, "simulated backend failure");
            return Err(GuardError::Upstream(format!(
                "profile lookup for {user_id} timed out"
            )));
        }
        Ok(Profile {
            user_id: user_id.to_string(),
            display_name: format!("Student {user_id}"),
            fetch_number,
        })
    }

    pub async fn send_message(&self, to: &str, body: &str) -> Result<usize, GuardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        tracing::debug!(to, bytes = body.len(), "message delivered");
        Ok(body.len())
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_first_only_fails_once() {
        let backend = SimulatedBackend::new(true);
        assert!(backend.fetch_profile("a").await.is_err());
        let profile = backend.fetch_profile("a").await.unwrap();
        assert_eq!(profile.fetch_number, 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn simulated_pacer_advances_clock() {
        let pacer = Pacer::new(true);
        let clock = pacer.clock();
        let start = clock.now();
        pacer.wait(Duration::from_millis(750)).await;
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(750));
    }
}

//! Periodic purge of expired tokens and stale rate-limit windows.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_auth::{AuthService, RateLimiter};
use tokio::task::JoinHandle;

/// Runs one purge pass. Failures are logged, never propagated.
pub async fn purge_once(service: &AuthService, limiter: &RateLimiter) {
    match service.purge_expired().await {
        Ok(report) if report.refresh_tokens > 0 || report.reset_tokens > 0 => {
            tracing::debug!(
                refresh_tokens = report.refresh_tokens,
                reset_tokens = report.reset_tokens,
                "expired tokens purged"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "token purge failed");
        }
        _ => {}
    }

    let windows = limiter.purge_stale();
    if windows > 0 {
        tracing::debug!(windows, "stale rate limit windows purged");
    }
}

/// Spawns the purge loop. The first pass runs one full interval after start.
pub fn spawn_purge_task(
    service: Arc<AuthService>,
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            purge_once(&service, &limiter).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_auth::{AuthConfig, Collaborators, Environment, RouteClass};

    fn config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.environment = Environment::Test;
        config.signing.secret = "maintenance-test-secret-0123456789abcdef".to_string();
        config
    }

    fn short_window_limiter(config: &AuthConfig) -> Arc<RateLimiter> {
        let mut config = config.clone();
        config.rate_limiting.login.window = Duration::from_millis(5);
        let limiter = Arc::new(RateLimiter::new(&config));
        let _ = limiter.check("10.0.0.1", RouteClass::Login);
        limiter
    }

    #[tokio::test]
    async fn test_purge_once_drops_elapsed_windows() {
        let config = config();
        let service = AuthService::new(&config, Collaborators::in_memory());
        let limiter = short_window_limiter(&config);
        assert_eq!(limiter.tracked_keys(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        purge_once(&service, &limiter).await;
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_purge_task_runs_on_interval() {
        let config = config();
        let service = Arc::new(AuthService::new(&config, Collaborators::in_memory()));
        let limiter = short_window_limiter(&config);

        let handle = spawn_purge_task(service, limiter.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(limiter.tracked_keys(), 0);
        handle.abort();
    }
}

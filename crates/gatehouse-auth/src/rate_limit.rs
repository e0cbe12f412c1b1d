//! Per-route-class rate limiting.
//!
//! Fixed-window counters keyed by `(client key, route class)`. Each route
//! class has its own `(window, max_requests)` budget from
//! [`RateLimitingConfig`]; in development every budget is multiplied by
//! `development_multiplier`. Counters are process-local, so with several
//! instances the limits apply per instance.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{AuthConfig, RateLimitRule, RateLimitingConfig};
use crate::device::ClientContext;
use crate::environment::Environment;
use crate::error::AuthError;
use crate::path_pattern;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Client key used when the peer address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Independently budgeted route classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Login,
    PasswordReset,
    PasswordResetShort,
    AuthenticatedGeneral,
    Invitation,
    SuperAdmin,
    VerificationEmail,
    BulkImport,
}

impl RouteClass {
    pub const ALL: [RouteClass; 8] = [
        Self::Login,
        Self::PasswordReset,
        Self::PasswordResetShort,
        Self::AuthenticatedGeneral,
        Self::Invitation,
        Self::SuperAdmin,
        Self::VerificationEmail,
        Self::BulkImport,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
            Self::PasswordResetShort => "password_reset_short",
            Self::AuthenticatedGeneral => "authenticated_general",
            Self::Invitation => "invitation",
            Self::SuperAdmin => "super_admin",
            Self::VerificationEmail => "verification_email",
            Self::BulkImport => "bulk_import",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitingConfig,
    environment: Environment,
    windows: DashMap<(String, RouteClass), Window>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: config.rate_limiting.clone(),
            environment: config.environment,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[must_use]
    pub fn trust_proxy(&self) -> bool {
        self.config.trust_proxy
    }

    /// Returns `true` for the health path and configured exemptions.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        path_pattern::matches(&self.config.health_path, path)
            || path_pattern::matches_any(&self.config.exempt_paths, path)
    }

    /// Maps a path to its route class. First matching binding wins.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        self.config
            .routes
            .iter()
            .find(|binding| path_pattern::matches(&binding.path, path))
            .map(|binding| binding.class)
    }

    /// Budget in force for a class after the environment multiplier.
    #[must_use]
    pub fn effective_rule(&self, class: RouteClass) -> RateLimitRule {
        let mut rule = self.config.rule(class);
        if self.environment.relaxes_rate_limits() {
            rule.max_requests = rule
                .max_requests
                .saturating_mul(self.config.development_multiplier);
        }
        rule
    }

    /// Counts one request for `key` against `class`.
    pub fn check(&self, key: &str, class: RouteClass) -> RateLimitDecision {
        self.check_at(key, class, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    pub fn check_at(&self, key: &str, class: RouteClass, now: Instant) -> RateLimitDecision {
        let rule = self.effective_rule(class);
        let mut window = self
            .windows
            .entry((key.to_string(), class))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= rule.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }
        let reset_after = rule
            .window
            .saturating_sub(now.saturating_duration_since(window.started));

        if window.count >= rule.max_requests {
            return RateLimitDecision::Limited {
                limit: rule.max_requests,
                retry_after: reset_after,
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed {
            limit: rule.max_requests,
            remaining: rule.max_requests - window.count,
            reset_after,
        }
    }

    /// Drops windows that have fully elapsed. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        self.purge_stale_at(Instant::now())
    }

    pub fn purge_stale_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|(_, class), window| {
            now.saturating_duration_since(window.started) < self.config.rule(*class).window
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Rounds a duration up to whole seconds, minimum one.
fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

/// Rate-limiting middleware for `axum::middleware::from_fn_with_state`.
///
/// Requests on exempt paths, or on paths that match no route binding, pass
/// through without touching a counter.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !limiter.is_enabled() || limiter.is_exempt(&path) {
        return next.run(request).await;
    }
    let Some(class) = limiter.classify(&path) else {
        return next.run(request).await;
    };

    let key = ClientContext::from_request(request.headers(), request.extensions(), limiter.trust_proxy())
        .ip
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match limiter.check(&key, class) {
        RateLimitDecision::Limited { limit, retry_after } => {
            warn!(class = %class, key = %key, path = %path, "rate limit exceeded");
            AuthError::RateLimited {
                retry_after_secs: ceil_secs(retry_after),
                limit,
            }
            .into_response()
        }
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
            headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_after)));
            response
        }
    }
}

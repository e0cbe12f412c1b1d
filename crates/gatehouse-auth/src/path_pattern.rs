//! Path pattern matching shared by the CSRF guard and the rate limiter.
//!
//! A pattern ending in `*` matches every path that starts with the text
//! before the `*`. Any other pattern matches the path itself and everything
//! below it (`/auth/login` matches `/auth/login` and `/auth/login/sso`, but
//! not `/auth/logins`).

/// Returns `true` if `path` matches `pattern`.
#[must_use]
pub fn matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }

    let pattern = pattern.trim_end_matches('/');
    match path.strip_prefix(pattern) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || pattern.is_empty(),
        None => false,
    }
}

/// Returns `true` if `path` matches any of `patterns`.
#[must_use]
pub fn matches_any<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), path))
}

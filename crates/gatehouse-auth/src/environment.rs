//! Deployment environment.
//!
//! Every environment-dependent decision (cookie flags, rate-limit relaxation)
//! is derived from this one enum. Components receive it through
//! [`AuthConfig`](crate::config::AuthConfig) and never read process
//! environment variables themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The environment the service is deployed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Environment {
    /// Local development. Cookies are not `Secure`, rate limits are relaxed.
    #[default]
    Development,
    /// Automated tests. Cookies are not `Secure`, rate limits are exact.
    Test,
    /// Production deployment. Cookies are `Secure` and `SameSite=Strict`.
    Production,
}

impl Environment {
    /// Returns `true` for production deployments.
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns `true` when configured rate limits should be multiplied.
    ///
    /// Only local development is relaxed; tests must observe the exact limits.
    #[must_use]
    pub fn relaxes_rate_limits(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical lower-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an environment name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment '{0}': expected development, test or production")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = UnknownEnvironment;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        env.as_str().to_string()
    }
}

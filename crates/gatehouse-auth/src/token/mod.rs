//! Access tokens.

pub mod extract;
pub mod jwt;

pub use extract::{access_token, bearer_token, signed_cookie_value};
pub use jwt::{AccessTokenClaims, AccessTokenClaimsBuilder, TokenError, TokenIssuer};

//! Table definitions. Every statement is idempotent.

use sqlx_core::raw_sql::raw_sql;

use crate::{PgPool, StorageResult};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    tenant_id     UUID NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,
    is_demo       BOOLEAN NOT NULL DEFAULT FALSE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS refresh_tokens (
    token_hash         TEXT PRIMARY KEY,
    user_id            UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    expires_at         TIMESTAMPTZ NOT NULL,
    created_ip         TEXT,
    created_user_agent TEXT,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS refresh_tokens_user_id_idx ON refresh_tokens (user_id);
CREATE INDEX IF NOT EXISTS refresh_tokens_expires_at_idx ON refresh_tokens (expires_at);

CREATE TABLE IF NOT EXISTS password_reset_tokens (
    token_hash         TEXT PRIMARY KEY,
    user_id            UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    expires_at         TIMESTAMPTZ NOT NULL,
    created_ip         TEXT,
    created_user_agent TEXT
);

CREATE INDEX IF NOT EXISTS password_reset_tokens_user_id_idx ON password_reset_tokens (user_id);
CREATE INDEX IF NOT EXISTS password_reset_tokens_expires_at_idx ON password_reset_tokens (expires_at);
"#;

/// Applies [`SCHEMA`].
pub async fn apply(pool: &PgPool) -> StorageResult<()> {
    raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("auth schema applied");
    Ok(())
}

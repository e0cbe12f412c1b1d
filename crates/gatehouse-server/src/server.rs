use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::get,
};
use gatehouse_auth::{
    AuthService, AuthState, Collaborators, CookiePolicy, CsrfGuard, RateLimiter, auth_router,
    cookie_key, csrf_middleware, rate_limit_middleware,
};
use gatehouse_auth_postgres::{ConnectOptions, PostgresAuthStorage};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, StorageBackend};
use crate::maintenance::spawn_purge_task;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration: {0}")]
    Config(#[from] crate::config::AppConfigError),

    #[error("auth configuration: {0}")]
    Auth(#[from] gatehouse_auth::ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] gatehouse_auth_postgres::StorageError),
}

/// Shared components behind the router.
#[derive(Clone)]
pub struct AppComponents {
    pub service: Arc<AuthService>,
    pub limiter: Arc<RateLimiter>,
    pub csrf: Arc<CsrfGuard>,
    pub auth: AuthState,
}

impl AppComponents {
    pub fn new(cfg: &AppConfig, collaborators: Collaborators) -> Result<Self, ServerError> {
        let auth_cfg = &cfg.auth;
        let key = cookie_key(auth_cfg)?;
        let service = Arc::new(AuthService::new(auth_cfg, collaborators));
        let auth = AuthState::new(service.clone(), CookiePolicy::new(auth_cfg), key.clone())
            .with_trust_proxy(auth_cfg.rate_limiting.trust_proxy);

        Ok(Self {
            service,
            limiter: Arc::new(RateLimiter::new(auth_cfg)),
            csrf: Arc::new(CsrfGuard::new(auth_cfg, key)?),
            auth,
        })
    }
}

/// Opens the configured storage backend.
pub async fn build_collaborators(cfg: &AppConfig) -> Result<Collaborators, ServerError> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory auth storage");
            Ok(Collaborators::in_memory())
        }
        StorageBackend::Postgres => {
            let pg = &cfg.storage.postgres;
            let url = pg.url.as_deref().unwrap_or_default();
            let options = ConnectOptions {
                max_connections: pg.pool_size,
                acquire_timeout: Duration::from_secs(pg.connect_timeout_secs),
            };
            let storage = PostgresAuthStorage::connect_with(url, &options).await?;
            storage.migrate().await?;
            tracing::info!(pool_size = pg.pool_size, "using PostgreSQL auth storage");
            Ok(Collaborators::from_storage(Arc::new(storage)))
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assembles the router. Layers, outermost first: trace, timeout, rate
/// limiter, CSRF guard.
pub fn build_app(cfg: &AppConfig, components: &AppComponents) -> Router {
    let health_path = cfg.auth.rate_limiting.health_path.clone();

    Router::new()
        .route(&health_path, get(health))
        .merge(auth_router(components.auth.clone()))
        .layer(from_fn_with_state(components.csrf.clone(), csrf_middleware))
        .layer(from_fn_with_state(
            components.limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(TimeoutLayer::new(cfg.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    collaborators: Option<Collaborators>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            config: AppConfig::default(),
            collaborators: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        if let Ok(addr) = cfg.addr() {
            self.addr = addr;
        }
        self.config = cfg;
        self
    }

    /// Overrides the storage backend chosen by the configuration.
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    pub async fn build(self) -> Result<GatehouseServer, ServerError> {
        self.config.validate()?;
        let collaborators = match self.collaborators {
            Some(c) => c,
            None => build_collaborators(&self.config).await?,
        };
        let components = AppComponents::new(&self.config, collaborators)?;
        let app = build_app(&self.config, &components);

        Ok(GatehouseServer {
            addr: self.addr,
            app,
            components,
            purge_interval: self.config.auth.maintenance.purge_interval,
        })
    }
}

pub struct GatehouseServer {
    addr: SocketAddr,
    app: Router,
    components: AppComponents,
    purge_interval: Duration,
}

impl GatehouseServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn components(&self) -> &AppComponents {
        &self.components
    }

    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        spawn_purge_task(
            self.components.service.clone(),
            self.components.limiter.clone(),
            self.purge_interval,
        )
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let purge = self.spawn_maintenance();
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        purge.abort();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

pub mod config;
pub mod maintenance;
pub mod observability;
pub mod server;

pub use config::{
    AppConfig, AppConfigError, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use maintenance::{purge_once, spawn_purge_task};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{
    AppComponents, GatehouseServer, ServerBuilder, ServerError, build_app, build_collaborators,
};

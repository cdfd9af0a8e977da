//! VocalScale Admin Common Library
//!
//! Shared code behind the admin gateway including:
//! - Hosted store access (REST and in-memory adapters)
//! - The query layer with its result cache
//! - The support desk and knowledge processor client
//! - Table views, error types, configuration and metrics

pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fixtures;
pub mod metrics;
pub mod models;
pub mod presentation;
pub mod queries;
pub mod store;
pub mod support;

// Re-export commonly used types
pub use cache::{QueryCache, QueryKey};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use queries::{AdminQueries, ListParams, Page};
pub use store::DataStore;
pub use support::{KnowledgeProcessor, SupportService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

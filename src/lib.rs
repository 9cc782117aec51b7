//! # EsoxSolutions.ResourcePool
//!
//! Lifecycle coordinator for groups of lazily-opened, closable resources
//! such as file handles or sockets.
//!
//! ## Features
//!
//! - Background opening of added resources, with failed opens dropped from the pool
//! - Concurrent close of every member with aggregated errors
//! - Nested pools: sizes, active counts and queries recurse into child pools
//! - Attribute queries with wildcard patterns, regexes, literals and predicates
//! - Shared wait-groups to aggregate readiness across pools
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{ListOptions, Pool, PoolError, Query};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pool = Pool::default();
//! let resource = pool.resource(()).unwrap();
//! pool.ready().await.unwrap();
//!
//! assert_eq!(pool.size(), 1);
//! assert_eq!(pool.query(&Query::new(), ListOptions::default()).unwrap().len(), 1);
//!
//! resource.close(None).await.unwrap();
//! assert_eq!(pool.size(), 0);
//!
//! pool.close(None).await.unwrap();
//! assert_eq!(pool.resource(()).unwrap_err(), PoolError::PoolClosed);
//! # });
//! ```

mod pool;
mod config;
mod metrics;
mod guard;
mod resource;
mod query;
mod errors;
pub mod pattern;

pub use pool::{Pool, PoolState, Handle, QueryablePool};
pub use config::{PoolConfiguration, AddOptions, ListOptions};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use guard::Guard;
pub use resource::{Resource, Lifecycle, BasicResource};
pub use query::{Query, Matcher, Value};
pub use errors::{PoolError, PoolResult};

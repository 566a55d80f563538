//! tend core library
//!
//! A local-first record store for task, goal, and note entities, shared
//! between an interactive human interface and an automated agent
//! interface, kept consistent across processes and synchronized
//! opportunistically with a remote git copy.
//!
//! # Architecture
//!
//! - **Codec** parses and serializes one record (YAML header + body)
//! - **Store** owns the data directory, atomic writes, and the header index
//! - **Lock** serializes writers across processes via an advisory side-file
//! - **Sync** reconciles local and remote copies through git without ever
//!   losing a local edit
//! - **Query** filters/sorts/paginates header projections
//! - **Service** is the facade both surfaces talk to
//!
//! # Quick Start
//!
//! ```text
//! let mut service = Service::open(Config::load()?)?;
//!
//! let outcome = service.create(Draft::new("Call the bank"))?;
//! let headers = service.list(&Query::default());
//! ```
//!
//! # Modules
//!
//! - `service`: tool facade (main entry point)
//! - `models`: record data structures
//! - `codec`: record file format
//! - `store`: file store and index
//! - `lock`: cross-process concurrency controller
//! - `sync`: git-backed sync engine
//! - `query`: filtering and sorting
//! - `config`: application configuration

pub mod codec;
pub mod config;
pub mod lock;
pub mod models;
pub mod query;
pub mod service;
pub mod store;
pub mod sync;

pub use codec::ParseError;
pub use config::Config;
pub use lock::{LockError, LockGuard, Lockfile};
pub use models::{Draft, Header, Kind, Patch, Priority, Record, Status};
pub use query::{Filter, Query, SortKey};
pub use service::{DailySummary, Service, ServiceError, WriteOutcome};
pub use store::{RecordStore, StoreError, ValidationError};
pub use sync::{SyncEngine, SyncPhase, SyncStatus};

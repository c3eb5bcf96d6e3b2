//! # Cinema Core
//!
//! Core library for the cinema catalog API.
//! Provides the HTTP server, routing, entity schemas, validation and
//! record stores behind the genre, actor, cinema hall and movie resources.
//!
//! ## Architecture
//!
//! Every resource is one [`Resource`] parameterized by an entity schema and a
//! [`RecordStore`]. Requests flow `Server -> Router -> handler -> Resource ->
//! RecordStore`; movies additionally resolve their actor and genre ids through
//! [`ReferenceLookup`]s before anything is written.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper
//! - `router` - Routing using matchit (radix trie)
//! - `route` - Route metadata and information
//! - `request` - HTTP request wrapper
//! - `middleware` - Request/response middleware system
//! - `catalog` - Route wiring for the four catalog resources
//! - `resource` - Generic CRUD handler
//! - `entity` - Record types and their schemas
//! - `schema` - Declarative field rules
//! - `store` - Record store trait and in-memory store
//! - `sql_store` - SQL record store and table creation
//! - `database` - SQLx database connectivity (SQLite, PostgreSQL)
//! - `json` - JSON parsing with simd-json
//! - `validation` - Structured validation errors
//! - `config` - Environment configuration
//! - `types` - Path parameter types and conversion
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod json;
pub mod middleware;
pub mod request;
pub mod resource;
pub mod route;
pub mod router;
pub mod schema;
pub mod server;
pub mod sql_store;
pub mod store;
pub mod types;
pub mod validation;

pub use catalog::{mount, mount_catalog, CatalogStores};
pub use config::{Config, Storage};
pub use database::{DatabasePool, DbTransaction, DbValue};
pub use entity::{Actor, CinemaHall, Entity, Genre, Movie, ALL_SCHEMAS};
pub use error::{Error, Result};
pub use json::parse_json;
pub use middleware::{CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain};
pub use request::ApiRequest;
pub use resource::Resource;
pub use route::RouteInfo;
pub use router::{Method, Router};
pub use schema::{Field, FieldKind, Fields, Mode, Schema};
pub use server::{handler, ApiResponse, Server, ServerConfig};
pub use sql_store::{migrate, SqlStore};
pub use store::{MemoryStore, RecordStore, ReferenceLookup};
pub use types::{ParamType, ParamValue};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Catalog Routes
//!
//! Mounts the four catalog resources on a [`Server`]. Each resource gets
//! the same six routes:
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/{name}/` | 200, list |
//! | POST | `/{name}/` | 201, created record |
//! | GET | `/{name}/{id}/` | 200, record |
//! | PUT | `/{name}/{id}/` | 200, replaced record |
//! | PATCH | `/{name}/{id}/` | 200, merged record |
//! | DELETE | `/{name}/{id}/` | 204 |
//!
//! `GET /` lists every resource with its collection path.

use crate::database::DatabasePool;
use crate::entity::{Actor, CinemaHall, Genre, Movie, ALL_SCHEMAS};
use crate::error::{Error, Result};
use crate::json::parse_json;
use crate::request::ApiRequest;
use crate::resource::Resource;
use crate::router::Method;
use crate::server::{handler, ApiResponse, Server};
use crate::sql_store::{migrate, SqlStore};
use crate::store::{MemoryStore, RecordStore};
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Stores backing the four catalog resources
pub struct CatalogStores<G, A, H, M> {
    /// Genre records
    pub genres: Arc<G>,
    /// Actor records
    pub actors: Arc<A>,
    /// Cinema hall records
    pub cinema_halls: Arc<H>,
    /// Movie records
    pub movies: Arc<M>,
}

impl CatalogStores<
    MemoryStore<Genre>,
    MemoryStore<Actor>,
    MemoryStore<CinemaHall>,
    MemoryStore<Movie>,
>
{
    /// Empty in-process stores
    #[must_use]
    pub fn memory() -> Self {
        Self {
            genres: Arc::new(MemoryStore::new()),
            actors: Arc::new(MemoryStore::new()),
            cinema_halls: Arc::new(MemoryStore::new()),
            movies: Arc::new(MemoryStore::new()),
        }
    }
}

impl CatalogStores<SqlStore<Genre>, SqlStore<Actor>, SqlStore<CinemaHall>, SqlStore<Movie>> {
    /// SQL stores sharing `pool`, with the catalog tables created if missing
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the tables cannot be created.
    pub async fn sql(pool: DatabasePool) -> Result<Self> {
        migrate(&pool, &ALL_SCHEMAS).await?;
        Ok(Self {
            genres: Arc::new(SqlStore::new(pool.clone())),
            actors: Arc::new(SqlStore::new(pool.clone())),
            cinema_halls: Arc::new(SqlStore::new(pool.clone())),
            movies: Arc::new(SqlStore::new(pool)),
        })
    }
}

/// Register every catalog route on `server`
///
/// Movie writes resolve `actors` and `genres` against the actor and genre
/// stores.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route is already registered.
pub fn mount_catalog<G, A, H, M>(
    server: &mut Server,
    stores: CatalogStores<G, A, H, M>,
) -> Result<()>
where
    G: RecordStore<Record = Genre>,
    A: RecordStore<Record = Actor>,
    H: RecordStore<Record = CinemaHall>,
    M: RecordStore<Record = Movie>,
{
    let movies = Resource::new(stores.movies)
        .with_reference("actors", stores.actors.clone())
        .with_reference("genres", stores.genres.clone());

    mount(server, Resource::new(stores.genres))?;
    mount(server, Resource::new(stores.actors))?;
    mount(server, Resource::new(stores.cinema_halls))?;
    mount(server, movies)?;

    let root: Map<String, Value> = ALL_SCHEMAS
        .iter()
        .map(|schema| {
            (
                schema.resource.to_string(),
                Value::String(collection_path(schema.resource)),
            )
        })
        .collect();
    let root = Arc::new(Value::Object(root));
    server.add_route(
        Method::Get,
        "/",
        handler(move |_req| {
            let root = Arc::clone(&root);
            async move { ApiResponse::json_value(200, &*root) }
        }),
    )?;

    info!(resources = ALL_SCHEMAS.len(), "Catalog routes mounted");
    Ok(())
}

/// Register the six CRUD routes of one resource
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route is already registered.
pub fn mount<S: RecordStore>(server: &mut Server, resource: Resource<S>) -> Result<()> {
    let name = Resource::<S>::name();
    let collection = collection_path(name);
    let member = format!("{collection}{{id:int}}/");

    let list = resource.clone();
    server.add_route(
        Method::Get,
        &collection,
        handler(move |_req| {
            let resource = list.clone();
            async move { respond(200, resource.list().await) }
        }),
    )?;

    let create = resource.clone();
    server.add_route(
        Method::Post,
        &collection,
        handler(move |req| {
            let resource = create.clone();
            async move {
                match parse_json::<Value>(req.body_bytes()) {
                    Ok(body) => respond(201, resource.create(&body).await),
                    Err(err) => error_response(&err),
                }
            }
        }),
    )?;

    let retrieve = resource.clone();
    server.add_route(
        Method::Get,
        &member,
        handler(move |req| {
            let resource = retrieve.clone();
            with_id(req, move |id, _| async move { respond(200, resource.retrieve(id).await) })
        }),
    )?;

    let replace = resource.clone();
    server.add_route(
        Method::Put,
        &member,
        handler(move |req| {
            let resource = replace.clone();
            with_id(req, move |id, req| async move {
                match parse_json::<Value>(req.body_bytes()) {
                    Ok(body) => respond(200, resource.replace(id, &body).await),
                    Err(err) => error_response(&err),
                }
            })
        }),
    )?;

    let merge = resource.clone();
    server.add_route(
        Method::Patch,
        &member,
        handler(move |req| {
            let resource = merge.clone();
            with_id(req, move |id, req| async move {
                match parse_json::<Value>(req.body_bytes()) {
                    Ok(body) => respond(200, resource.merge(id, &body).await),
                    Err(err) => error_response(&err),
                }
            })
        }),
    )?;

    server.add_route(
        Method::Delete,
        &member,
        handler(move |req| {
            let resource = resource.clone();
            with_id(req, move |id, _| async move {
                match resource.delete(id).await {
                    Ok(()) => ApiResponse::no_content(),
                    Err(err) => error_response(&err),
                }
            })
        }),
    )?;

    debug!(resource = name, collection = %collection, "Resource mounted");
    Ok(())
}

fn collection_path(name: &str) -> String {
    format!("/{name}/")
}

/// Run `f` with the integer `id` path parameter, 404 when it is not one
async fn with_id<F, Fut>(req: ApiRequest, f: F) -> ApiResponse
where
    F: FnOnce(i64, ApiRequest) -> Fut,
    Fut: Future<Output = ApiResponse>,
{
    match req.param_int("id") {
        Some(id) => f(id, req).await,
        None => ApiResponse::detail(404, "Not found."),
    }
}

fn respond<T: Serialize>(status: u16, result: Result<T>) -> ApiResponse {
    match result {
        Ok(value) => ApiResponse::json_value(status, &value),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &Error) -> ApiResponse {
    if err.is_client_error() {
        debug!(error = %err, "Request rejected");
    } else {
        error!(error = %err, "Catalog operation failed");
    }
    ApiResponse::from_error(err)
}

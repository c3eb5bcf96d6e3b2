//! End-to-end tests of the catalog HTTP surface, run in-process through
//! `Server::test_request` against memory and SQLite storage.

use cinema_core::server::Bytes;
use cinema_core::{
    mount_catalog, ApiResponse, CatalogStores, CorsMiddleware, DatabasePool, LoggingMiddleware,
    Method, Server,
};
use serde_json::{json, Value};
use std::collections::HashMap;

fn memory_server() -> Server {
    let mut server = Server::default();
    server.add_middleware(LoggingMiddleware::new());
    mount_catalog(&mut server, CatalogStores::memory()).unwrap();
    server
}

async fn sqlite_server() -> Server {
    let pool = DatabasePool::connect("sqlite::memory:", Some(1)).await.unwrap();
    let mut server = Server::default();
    mount_catalog(&mut server, CatalogStores::sql(pool).await.unwrap()).unwrap();
    server
}

async fn call(server: &Server, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
    let body = body.map(|b| Bytes::from(b.to_string()));
    server.test_request(method, path, HashMap::new(), body).await
}

fn field_errors(resp: &ApiResponse, field: &str) -> Vec<String> {
    resp.json_body().unwrap()["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["field"] == field)
        .map(|e| e["code"].as_str().unwrap().to_string())
        .collect()
}

async fn seed_people_and_genres(server: &Server) {
    for body in [
        json!({"first_name": "Keanu", "last_name": "Reeves"}),
        json!({"first_name": "Carrie-Anne", "last_name": "Moss"}),
    ] {
        assert_eq!(call(server, Method::Post, "/actors/", Some(body)).await.status, 201);
    }
    for name in ["Action", "Sci-Fi"] {
        let resp = call(server, Method::Post, "/genres/", Some(json!({"name": name}))).await;
        assert_eq!(resp.status, 201);
    }
}

async fn genre_lifecycle(server: &Server) {
    let resp = call(server, Method::Post, "/genres/", Some(json!({"name": "Horror"}))).await;
    assert_eq!(resp.status, 201);
    assert_eq!(resp.json_body().unwrap(), json!({"id": 1, "name": "Horror"}));

    let resp = call(server, Method::Get, "/genres/1/", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json_body().unwrap(), json!({"id": 1, "name": "Horror"}));

    let resp = call(server, Method::Delete, "/genres/1/", None).await;
    assert_eq!(resp.status, 204);

    let resp = call(server, Method::Get, "/genres/1/", None).await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.json_body().unwrap(), json!({"detail": "Not found."}));
}

async fn movie_references(server: &Server) {
    seed_people_and_genres(server).await;

    let resp = call(
        server,
        Method::Post,
        "/movies/",
        Some(json!({"title": "X", "actors": [999], "genres": []})),
    )
    .await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "actors"), vec!["DOES_NOT_EXIST"]);
    assert_eq!(call(server, Method::Get, "/movies/", None).await.body, "[]");

    let resp = call(
        server,
        Method::Post,
        "/movies/",
        Some(json!({
            "title": "The Matrix",
            "description": "A hacker learns the truth.",
            "duration": 136,
            "actors": [2, 1, 2],
            "genres": [2, 1],
        })),
    )
    .await;
    assert_eq!(resp.status, 201);
    let created = resp.json_body().unwrap();
    assert_eq!(created["actors"], json!([1, 2]));
    assert_eq!(created["genres"], json!([1, 2]));

    let resp = call(server, Method::Get, "/movies/1/", None).await;
    assert_eq!(resp.json_body().unwrap(), created);
}

#[tokio::test]
async fn test_genre_lifecycle_memory() {
    genre_lifecycle(&memory_server()).await;
}

#[tokio::test]
async fn test_genre_lifecycle_sqlite() {
    genre_lifecycle(&sqlite_server().await).await;
}

#[tokio::test]
async fn test_movie_references_memory() {
    movie_references(&memory_server()).await;
}

#[tokio::test]
async fn test_movie_references_sqlite() {
    movie_references(&sqlite_server().await).await;
}

#[tokio::test]
async fn test_list_is_ordered_by_id() {
    let server = memory_server();
    for name in ["Drama", "Comedy", "Western"] {
        call(&server, Method::Post, "/genres/", Some(json!({"name": name}))).await;
    }
    let resp = call(&server, Method::Get, "/genres/", None).await;
    assert_eq!(
        resp.json_body().unwrap(),
        json!([
            {"id": 1, "name": "Drama"},
            {"id": 2, "name": "Comedy"},
            {"id": 3, "name": "Western"},
        ])
    );
}

#[tokio::test]
async fn test_cinema_hall_replace_and_merge() {
    let server = memory_server();
    let resp = call(
        &server,
        Method::Post,
        "/cinema_halls/",
        Some(json!({"name": "Blue", "rows": 10, "seats_in_row": 12})),
    )
    .await;
    assert_eq!(resp.status, 201);

    // full replace missing a required field changes nothing
    let resp = call(
        &server,
        Method::Put,
        "/cinema_halls/1/",
        Some(json!({"name": "Red", "rows": 8})),
    )
    .await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "seats_in_row"), vec!["REQUIRED"]);
    let resp = call(&server, Method::Get, "/cinema_halls/1/", None).await;
    assert_eq!(resp.json_body().unwrap()["name"], "Blue");

    let resp = call(
        &server,
        Method::Put,
        "/cinema_halls/1/",
        Some(json!({"name": "Red", "rows": 8, "seats_in_row": 14})),
    )
    .await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.json_body().unwrap(),
        json!({"id": 1, "name": "Red", "rows": 8, "seats_in_row": 14})
    );

    let resp = call(&server, Method::Patch, "/cinema_halls/1/", Some(json!({"rows": 9}))).await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.json_body().unwrap(),
        json!({"id": 1, "name": "Red", "rows": 9, "seats_in_row": 14})
    );

    let resp = call(&server, Method::Patch, "/cinema_halls/1/", Some(json!({"rows": 0}))).await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "rows"), vec!["TOO_SMALL"]);
}

#[tokio::test]
async fn test_missing_record_wins_over_invalid_body() {
    let server = memory_server();
    for method in [Method::Put, Method::Patch] {
        let resp = call(&server, method, "/actors/42/", Some(json!({"first_name": ""}))).await;
        assert_eq!(resp.status, 404, "{method}");
    }
    let resp = call(&server, Method::Delete, "/actors/42/", None).await;
    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn test_validation_error_body() {
    let server = memory_server();
    let resp = call(
        &server,
        Method::Post,
        "/actors/",
        Some(json!({"first_name": "   ", "last_name": null})),
    )
    .await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "first_name"), vec!["BLANK"]);
    assert_eq!(field_errors(&resp, "last_name"), vec!["NULL"]);

    let resp = call(&server, Method::Post, "/actors/", Some(json!(["not", "an", "object"]))).await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "non_field_errors"), vec!["INVALID_TYPE"]);

    let resp = call(&server, Method::Post, "/actors/", None).await;
    assert_eq!(resp.status, 400);
    assert_eq!(field_errors(&resp, "first_name"), vec!["REQUIRED"]);
    assert_eq!(field_errors(&resp, "last_name"), vec!["REQUIRED"]);
    assert!(field_errors(&resp, "non_field_errors").is_empty());
}

#[tokio::test]
async fn test_routing_surface() {
    let server = memory_server();

    let resp = call(&server, Method::Get, "/screenings/", None).await;
    assert_eq!(resp.status, 404);

    let resp = call(&server, Method::Get, "/movies/first/", None).await;
    assert_eq!(resp.status, 404);

    let resp = call(&server, Method::Delete, "/movies/", None).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.header("allow"), Some("GET, POST, HEAD, OPTIONS"));

    let resp = call(&server, Method::Options, "/movies/1/", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("allow"), Some("GET, PUT, PATCH, DELETE, HEAD, OPTIONS"));

    let resp = call(&server, Method::Head, "/genres/", None).await;
    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());

    let resp = call(&server, Method::Get, "/", None).await;
    assert_eq!(resp.json_body().unwrap()["movies"], "/movies/");
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert!(resp.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_cors_headers_when_enabled() {
    let mut server = Server::default();
    server.add_middleware(CorsMiddleware::new().allow_origin("https://tickets.example"));
    mount_catalog(&mut server, CatalogStores::memory()).unwrap();

    let resp = call(&server, Method::Get, "/genres/", None).await;
    assert_eq!(
        resp.header("access-control-allow-origin"),
        Some("https://tickets.example")
    );
}

#[tokio::test]
async fn test_deleted_references_are_dropped_in_memory() {
    let server = memory_server();
    seed_people_and_genres(&server).await;
    call(
        &server,
        Method::Post,
        "/movies/",
        Some(json!({"title": "Heat", "duration": 170, "actors": [1, 2], "genres": [1]})),
    )
    .await;

    assert_eq!(call(&server, Method::Delete, "/actors/1/", None).await.status, 204);
    assert_eq!(call(&server, Method::Delete, "/genres/1/", None).await.status, 204);
    let resp = call(&server, Method::Get, "/movies/1/", None).await;
    let movie = resp.json_body().unwrap();
    assert_eq!(movie["actors"], json!([2]));
    assert_eq!(movie["genres"], json!([]));

    let resp = call(&server, Method::Patch, "/movies/1/", Some(json!({"title": "Heat 2"}))).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json_body().unwrap()["actors"], json!([2]));

    // the body just read can be written back as-is
    let resp = call(&server, Method::Get, "/movies/1/", None).await;
    let resp = call(&server, Method::Put, "/movies/1/", Some(resp.json_body().unwrap())).await;
    assert_eq!(resp.status, 200);

    let resp = call(&server, Method::Patch, "/movies/1/", Some(json!({"genres": [1]}))).await;
    assert_eq!(field_errors(&resp, "genres"), vec!["DOES_NOT_EXIST"]);
}

#[tokio::test]
async fn test_deleted_genre_cascades_in_sqlite() {
    let server = sqlite_server().await;
    seed_people_and_genres(&server).await;
    call(
        &server,
        Method::Post,
        "/movies/",
        Some(json!({"title": "Heat", "duration": 170, "actors": [1], "genres": [1, 2]})),
    )
    .await;

    assert_eq!(call(&server, Method::Delete, "/genres/1/", None).await.status, 204);
    let resp = call(&server, Method::Get, "/movies/1/", None).await;
    assert_eq!(resp.json_body().unwrap()["genres"], json!([2]));
    assert_eq!(resp.json_body().unwrap()["description"], Value::Null);
}

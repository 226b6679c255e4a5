use std::{collections::HashMap, sync::Arc};

use super::*;
use crate::test_support::{page, record};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    seen_after: Arc<Mutex<Vec<Option<String>>>>,
    created: Arc<Mutex<Vec<CreateImageRequest>>>,
    reject_create: bool,
}

async fn handle_list(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ImagePage> {
    let after = params.get("after").cloned();
    state.seen_after.lock().await.push(after.clone());
    match after.as_deref() {
        None => Json(page(&["A", "B"], Some("c1"))),
        Some(_) => Json(page(&["C"], None)),
    }
}

async fn handle_create(
    State(state): State<ServerState>,
    Json(request): Json<CreateImageRequest>,
) -> Result<Json<ImageRecord>, (StatusCode, Json<ApiError>)> {
    if state.reject_create {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(ErrorCode::Validation, "title already taken")),
        ));
    }
    state.created.lock().await.push(request.clone());
    let mut stored = record("created");
    stored.url = request.url;
    stored.title = request.title;
    stored.description = request.description;
    Ok(Json(stored))
}

async fn spawn_collection_server(state: ServerState) -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/collection", get(handle_list).post(handle_create))
        .route(
            "/broken",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}/collection"))?)
}

#[tokio::test]
async fn lists_pages_and_forwards_cursor() {
    let state = ServerState::default();
    let url = spawn_collection_server(state.clone()).await.expect("spawn server");
    let client = HttpCollectionClient::new(Client::new(), url);

    let first = client.list_images(None).await.expect("first page");
    assert_eq!(first.data.len(), 2);
    let cursor = first.after.clone().expect("cursor");

    let second = client.list_images(Some(&cursor)).await.expect("second page");
    assert!(second.is_last());
    assert_eq!(
        *state.seen_after.lock().await,
        vec![None, Some("c1".to_string())]
    );
}

#[tokio::test]
async fn creates_image_record() {
    let state = ServerState::default();
    let url = spawn_collection_server(state.clone()).await.expect("spawn server");
    let client = HttpCollectionClient::new(Client::new(), url);

    let request = CreateImageRequest {
        url: "https://cdn/pier.png".into(),
        title: "Pier".into(),
        description: "Sunrise".into(),
    };
    let created = client.create_image(&request).await.expect("create");
    assert_eq!(created.url, "https://cdn/pier.png");
    assert_eq!(*state.created.lock().await, vec![request]);
}

#[tokio::test]
async fn rejection_surfaces_service_message() {
    let state = ServerState {
        reject_create: true,
        ..ServerState::default()
    };
    let url = spawn_collection_server(state).await.expect("spawn server");
    let client = HttpCollectionClient::new(Client::new(), url);

    let err = client
        .create_image(&CreateImageRequest {
            url: "https://cdn/pier.png".into(),
            title: "Pier".into(),
            description: "Sunrise".into(),
        })
        .await
        .expect_err("must fail");
    let text = format!("{err:#}");
    assert!(text.contains("422"), "unexpected error: {text}");
    assert!(text.contains("title already taken"), "unexpected error: {text}");
}

#[tokio::test]
async fn non_json_error_body_reports_status() {
    let url = spawn_collection_server(ServerState::default())
        .await
        .expect("spawn server");
    let broken = url.join("/broken").expect("join");
    let client = HttpCollectionClient::new(Client::new(), broken);

    let err = client.list_images(None).await.expect_err("must fail");
    assert!(format!("{err:#}").contains("502"));
}

#[tokio::test]
async fn unreachable_service_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/collection")).expect("url");
    let client = HttpCollectionClient::new(Client::new(), url);
    let err = client.list_images(None).await.expect_err("must fail");
    assert!(format!("{err:#}").contains("collection listing request failed"));
}

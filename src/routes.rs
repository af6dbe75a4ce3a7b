use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{FavoriteRequest, MovieDetail, MovieSummary, SortOrder, SortRequest, SyncStatus},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{tmdb_id}", get(movie_detail))
        .route("/movies/{tmdb_id}/favorite", put(set_favorite))
        .route("/sync", post(sync_now))
        .route("/sync/status", get(sync_status))
        .route("/preferences/sort", put(set_sort))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    favorites: bool,
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let movies =
        if q.favorites { state.store.favorites().await? } else { state.store.ranked().await? };
    Ok(Json(movies.into_iter().map(MovieSummary::from).collect()))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(tmdb_id): Path<i32>,
) -> AppResult<Json<MovieDetail>> {
    state
        .store
        .detail(tmdb_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("movie {tmdb_id}")))
}

pub async fn set_favorite(
    State(state): State<Arc<AppState>>,
    Path(tmdb_id): Path<i32>,
    Json(req): Json<FavoriteRequest>,
) -> AppResult<Json<MovieSummary>> {
    let updated = state
        .store
        .set_favorite(tmdb_id, req.favorite)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("movie {tmdb_id}")))?;
    tracing::info!(tmdb_id = tmdb_id, favorite = req.favorite, "favorite updated");
    Ok(Json(updated.into()))
}

pub async fn sync_now(State(state): State<Arc<AppState>>) -> StatusCode {
    state.scheduler.schedule_immediate_sync();
    StatusCode::ACCEPTED
}

pub async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    Json(state.scheduler.status().await)
}

pub async fn set_sort(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SortRequest>,
) -> AppResult<(StatusCode, Json<SortOrder>)> {
    let pref = req.sort_by.trim();
    if pref.is_empty() {
        return Err(AppError::BadRequest("sort_by is required".to_string()));
    }

    let sort = SortOrder::from_preference(pref);
    let previous = state.sort.send_replace(sort);
    if previous != sort {
        tracing::info!(from = ?previous, to = ?sort, "sort preference changed");
        state.scheduler.schedule_immediate_sync();
    }
    Ok((StatusCode::ACCEPTED, Json(sort)))
}

//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::models::catalog::{Category, Console, GameDetail, GameSummary};
use crate::models::{Page, PageParams};
use crate::state::AppState;

/// How many games the featured shelf shows.
const FEATURED_LIMIT: i64 = 12;

/// Paginated game list, newest first.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn list_games(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<GameSummary>>, AppError> {
    let (games, total) = CatalogRepository::new(state.pool())
        .list_games(params)
        .await?;

    Ok(Json(Page::new(games, params, total)))
}

/// Featured games.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<GameSummary>>, AppError> {
    let games = CatalogRepository::new(state.pool())
        .featured(FEATURED_LIMIT)
        .await?;
    Ok(Json(games))
}

/// Game detail page.
///
/// # Errors
///
/// 404 if no game has this slug.
pub async fn show_game(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<GameDetail>, AppError> {
    CatalogRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No game with slug '{slug}'")))
}

/// All consoles with their game counts.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn consoles(State(state): State<AppState>) -> Result<Json<Vec<Console>>, AppError> {
    Ok(Json(CatalogRepository::new(state.pool()).list_consoles().await?))
}

/// All categories with their game counts.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(
        CatalogRepository::new(state.pool())
            .list_categories()
            .await?,
    ))
}

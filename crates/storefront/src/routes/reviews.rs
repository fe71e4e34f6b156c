//! Review route handlers.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use retro_vault_core::{GameId, ReviewId, Role};

use super::JsonBody;
use crate::db::{CatalogRepository, ReviewRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::review::{NewReview, Review};
use crate::models::{Page, PageParams};
use crate::state::AppState;

const MAX_TITLE_LENGTH: usize = 120;
const MAX_BODY_LENGTH: usize = 5000;

/// `POST /api/games/{slug}/reviews` body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub title: String,
    pub body: String,
}

/// `POST /api/reviews/{id}/vote` body.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub helpful: bool,
}

impl ReviewRequest {
    fn validate(&self) -> Result<NewReview, AppError> {
        let mut errors = BTreeMap::new();

        if !(1..=5).contains(&self.rating) {
            errors.insert("rating".to_owned(), "rating must be between 1 and 5".to_owned());
        }

        let mut text = |field: &str, value: &str, max: usize| -> String {
            let value = value.trim();
            if value.is_empty() {
                errors.insert(field.to_owned(), format!("{field} is required"));
            } else if value.chars().count() > max {
                errors.insert(
                    field.to_owned(),
                    format!("{field} must be at most {max} characters"),
                );
            }
            value.to_owned()
        };

        let title = text("title", &self.title, MAX_TITLE_LENGTH);
        let body = text("body", &self.body, MAX_BODY_LENGTH);

        if !errors.is_empty() {
            return Err(AppError::Validation {
                message: "invalid review".to_owned(),
                fields: errors,
            });
        }

        Ok(NewReview {
            rating: self.rating,
            title,
            body,
        })
    }
}

async fn game_id(state: &AppState, slug: &str) -> Result<GameId, AppError> {
    CatalogRepository::new(state.pool())
        .game_id_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No game with slug '{slug}'")))
}

async fn review(state: &AppState, id: ReviewId) -> Result<Review, AppError> {
    ReviewRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
}

/// Reviews for a game, most helpful first.
///
/// # Errors
///
/// 404 if no game has this slug.
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Review>>, AppError> {
    let game_id = game_id(&state, &slug).await?;

    let (reviews, total) = ReviewRepository::new(state.pool())
        .list_for_game(game_id, params)
        .await?;

    Ok(Json(Page::new(reviews, params, total)))
}

/// Review a game. One review per user per game.
///
/// # Errors
///
/// 400 for an invalid body, 404 for an unknown game, 409 if already reviewed.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    JsonBody(body): JsonBody<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let new = body.validate()?;
    let game_id = game_id(&state, &slug).await?;

    let review = ReviewRepository::new(state.pool())
        .create(user.id, game_id, &new)
        .await?;

    tracing::info!(review_id = %review.id, game_id = %game_id, verified = review.verified_purchase, "Review posted");
    Ok((StatusCode::CREATED, Json(review)))
}

/// Delete a review. Authors may delete their own; admins any.
///
/// # Errors
///
/// 404 if the review doesn't exist, 403 if it isn't the user's.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    let review = review(&state, id).await?;

    if review.user_id != user.id {
        // Session role may be stale; the stored one decides.
        let role = UserRepository::new(state.pool())
            .get_by_id(user.id)
            .await?
            .map(|u| u.role);
        if role != Some(Role::Admin) {
            return Err(AppError::Forbidden(
                "You can only delete your own reviews".to_string(),
            ));
        }
        tracing::info!(review_id = %id, author_id = %review.user_id, "Review removed by admin");
    }

    if !ReviewRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Review not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Vote a review helpful or not. Voting again replaces the earlier vote.
///
/// # Errors
///
/// 404 if the review doesn't exist, 403 for the author's own review.
pub async fn vote(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    JsonBody(body): JsonBody<VoteRequest>,
) -> Result<Json<Review>, AppError> {
    if review(&state, id).await?.user_id == user.id {
        return Err(AppError::Forbidden(
            "You cannot vote on your own review".to_string(),
        ));
    }

    let review = ReviewRepository::new(state.pool())
        .vote(id, user.id, body.helpful)
        .await?;

    Ok(Json(review))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(rating: i32, title: &str, body: &str) -> ReviewRequest {
        ReviewRequest {
            rating,
            title: title.to_owned(),
            body: body.to_owned(),
        }
    }

    #[test]
    fn test_review_trims_text() {
        let review = request(5, "  Still holds up  ", " Best cartridge I own. ")
            .validate()
            .unwrap();
        assert_eq!(review.title, "Still holds up");
        assert_eq!(review.body, "Best cartridge I own.");
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(request(1, "t", "b").validate().is_ok());
        assert!(request(5, "t", "b").validate().is_ok());
        assert!(request(0, "t", "b").validate().is_err());
        assert!(request(6, "t", "b").validate().is_err());
    }

    #[test]
    fn test_review_reports_each_field() {
        let err = request(9, " ", &"x".repeat(MAX_BODY_LENGTH + 1))
            .validate()
            .unwrap_err();
        let AppError::Validation { fields, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            fields.keys().map(String::as_str).collect::<Vec<_>>(),
            ["body", "rating", "title"]
        );
    }
}

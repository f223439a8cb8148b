//! Handlers for individual reviews.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{parse_id, Review, ReviewInput};

use super::{ApiJson, AppState};

const ID_LABEL: &str = "reviewId";

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/{id}", get(detail).put(update).delete(remove))
}

fn not_found(id: i64) -> Error {
    Error::bad_request(format!("the review id of: {id} does not exist"))
}

async fn detail(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<Review>> {
    let id = parse_id(&raw_id, ID_LABEL)?;
    let review = state
        .with_storage(move |storage| storage.get_review(id)?.ok_or_else(|| not_found(id)))
        .await?;
    Ok(Json(review))
}

async fn update(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<Json<Review>> {
    let id = parse_id(&raw_id, ID_LABEL)?;
    let valid = input.validate()?;

    let review = state
        .with_storage(move |storage| {
            storage
                .update_review(id, &valid)?
                .ok_or_else(|| not_found(id))
        })
        .await?;
    info!("Updated review {}", review.id);
    Ok(Json(review))
}

async fn remove(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<Review>> {
    let id = parse_id(&raw_id, ID_LABEL)?;
    let review = state
        .with_storage(move |storage| storage.delete_review(id)?.ok_or_else(|| not_found(id)))
        .await?;
    info!("Deleted review {} from venue {}", review.id, review.parent_id);
    Ok(Json(review))
}

//! Restaurant and store handlers.
//!
//! The same handlers serve both collections; the router attaches the
//! [`VenueKind`] as a request extension.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::auth::Claims;
use crate::error::{Error, Result};
use crate::model::{parse_id, ReviewInput, Venue, VenueInput, VenueKind};

use super::{ApiJson, AppState, MaybeAuthUser};

/// Routes for one venue collection, relative to its mount point.
pub(super) fn routes(kind: VenueKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(detail).put(update).delete(remove))
        .route("/{id}/addReview", post(add_review))
        .layer(Extension(kind))
}

fn not_found(kind: VenueKind, id: i64) -> Error {
    Error::bad_request(format!("the {kind} id of: {id} does not exist"))
}

/// Allow changes to unowned venues, and to owned ones by their author or the admin.
fn authorize(admin_username: &str, venue: &Venue, caller: Option<&Claims>) -> Result<()> {
    let Some(owner) = venue.created_by.as_deref() else {
        return Ok(());
    };
    let Some(caller) = caller else {
        return Err(Error::unauthorized(format!(
            "sign in to modify this {}",
            venue.kind
        )));
    };

    if caller.username == owner || caller.username == admin_username {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "only {owner} can modify this {}",
            venue.kind
        )))
    }
}

async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
) -> Result<Json<Value>> {
    let ratings = state
        .with_storage(move |storage| storage.list_venue_ratings(kind))
        .await?;

    let mut data = Map::new();
    data.insert(kind.ratings_key().to_string(), serde_json::to_value(ratings)?);
    Ok(Json(json!({ "status": "success", "data": data })))
}

async fn detail(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&raw_id, kind.id_label())?;

    let (venue, reviews) = state
        .with_storage(move |storage| {
            let venue = storage.get_venue(kind, id)?.ok_or_else(|| not_found(kind, id))?;
            Ok((venue, storage.list_reviews(id)?))
        })
        .await?;

    let mut data = Map::new();
    data.insert(kind.as_str().to_string(), serde_json::to_value(venue)?);
    data.insert("reviews".to_string(), serde_json::to_value(reviews)?);
    Ok(Json(json!({ "data": data })))
}

async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
    MaybeAuthUser(caller): MaybeAuthUser,
    ApiJson(input): ApiJson<VenueInput>,
) -> Result<Json<Venue>> {
    let valid = input.validate()?;
    let author = caller.map(|c| c.username);

    let venue = state
        .with_storage(move |storage| storage.create_venue(kind, &valid, author.as_deref()))
        .await?;
    info!("Created {} {} ({})", kind, venue.id, venue.name);
    Ok(Json(venue))
}

async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
    Path(raw_id): Path<String>,
    MaybeAuthUser(caller): MaybeAuthUser,
    ApiJson(input): ApiJson<VenueInput>,
) -> Result<Json<Venue>> {
    let id = parse_id(&raw_id, kind.id_label())?;
    let valid = input.validate()?;
    let admin = Arc::clone(&state.admin_username);

    let venue = state
        .with_storage(move |storage| {
            let missing = || Error::bad_request("this id does not exist");
            let existing = storage.get_venue(kind, id)?.ok_or_else(missing)?;
            authorize(&admin, &existing, caller.as_ref())?;
            storage.update_venue(kind, id, &valid)?.ok_or_else(missing)
        })
        .await?;
    info!("Updated {} {}", kind, venue.id);
    Ok(Json(venue))
}

async fn remove(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
    Path(raw_id): Path<String>,
    MaybeAuthUser(caller): MaybeAuthUser,
) -> Result<Json<Venue>> {
    let id = parse_id(&raw_id, kind.id_label())?;
    let admin = Arc::clone(&state.admin_username);

    let venue = state
        .with_storage(move |storage| {
            let existing = storage.get_venue(kind, id)?.ok_or_else(|| not_found(kind, id))?;
            authorize(&admin, &existing, caller.as_ref())?;
            storage
                .delete_venue(kind, id)?
                .ok_or_else(|| not_found(kind, id))
        })
        .await?;
    Ok(Json(venue))
}

async fn add_review(
    State(state): State<AppState>,
    Extension(kind): Extension<VenueKind>,
    Path(raw_id): Path<String>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = parse_id(&raw_id, kind.id_label())?;
    let valid = input.validate()?;

    let review = state
        .with_storage(move |storage| {
            if storage.get_venue(kind, id)?.is_none() {
                return Err(not_found(kind, id));
            }
            storage.create_review(id, &valid)
        })
        .await?;

    info!("Added review {} to {} {}", review.id, kind, id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "review": review } })),
    ))
}

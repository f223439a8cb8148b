//! Sign-up, sign-in and session handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_user_password};
use crate::error::{Error, Result};
use crate::model::{Credentials, User};

use super::{blocking, ApiJson, AppState, AuthUser};

const INVALID_LOGIN: &str = "invalid login";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/me", get(me))
}

async fn sign_up(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<(StatusCode, Json<User>)> {
    let (username, password) = credentials.validate()?;
    // The admin account is provisioned from the CLI only
    if state.is_admin_name(username) {
        warn!("Rejected sign-up for reserved username {username}");
        return Err(Error::forbidden("this username is reserved"));
    }
    let username = username.to_string();

    let password = password.to_string();
    let hashed = blocking(move || hash_password(&password)).await??;

    let user = state
        .with_storage(move |storage| {
            storage.create_user(&username, &hashed).map_err(|e| {
                if e.is_unique_violation() {
                    Error::client(StatusCode::CONFLICT, "username already taken")
                } else {
                    e
                }
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn sign_in(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<Json<Value>> {
    let (username, password) = credentials.validate()?;

    let lookup = username.to_string();
    let user = state
        .with_storage(move |storage| storage.find_user_by_username(&lookup))
        .await?;

    let hash = user.as_ref().map(|u| u.hashed_password.clone());
    let password = password.to_string();
    let verified = blocking(move || verify_user_password(hash.as_deref(), &password)).await?;

    let Some(user) = user.filter(|_| verified) else {
        warn!("Failed sign-in for {username}");
        return Err(Error::unauthorized(INVALID_LOGIN));
    };

    let token = state.tokens.issue(&user)?;
    info!("User {} signed in", user.username);
    Ok(Json(json!({
        "token": token,
        "user": { "userId": user.user_id, "username": user.username },
    })))
}

async fn me(AuthUser(claims): AuthUser) -> Json<Value> {
    Json(json!({ "userId": claims.user_id, "username": claims.username }))
}

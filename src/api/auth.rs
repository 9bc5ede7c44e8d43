//! Session endpoints: login, logout, current user.

use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, Responder};

use crate::auth::{bearer_token, AuthedUser};
use crate::models::{self, LoginData, LoginRequest, MessageData};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created", body = LoginData),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    match state.auth.authenticate(&body.username, &body.password) {
        Ok(Some(user)) => match state.auth.create_session(user.id) {
            Ok(session) => {
                tracing::info!(user = %user.username, "login");
                models::success(LoginData { token: session.token, user })
            }
            Err(err) => models::internal_error(&err, "failed to create session"),
        },
        Ok(None) => models::error_response(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "invalid username or password",
        ),
        Err(err) => models::internal_error(&err, "login failed"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Not authenticated")
    )
)]
#[post("/auth/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    req: HttpRequest,
    _user: AuthedUser,
) -> impl Responder {
    if let Some(token) = bearer_token(&req) {
        if let Err(err) = state.auth.revoke_session(token) {
            return models::internal_error(&err, "logout failed");
        }
    }
    models::success(MessageData::new("logged out"))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Not authenticated")
    )
)]
#[get("/auth/me")]
pub async fn me(user: AuthedUser) -> impl Responder {
    models::success(user.0)
}

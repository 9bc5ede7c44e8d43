//! Credit editing endpoints. Extraction fills credits automatically at
//! upload time; these allow manual curation afterwards.

use actix_web::{delete, get, post, put, web, Responder};

use crate::auth::AuthedUser;
use crate::models::{
    self, CreditCreateRequest, CreditData, CreditListData, CreditUpdateRequest, MessageData,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/tracks/{id}/credits",
    responses(
        (status = 200, description = "Credits in display order", body = CreditListData),
        (status = 404, description = "Track not found")
    )
)]
#[get("/api/tracks/{id}/credits")]
pub async fn get_credits(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    match state.catalog.credits_for_track(*path) {
        Ok(Some(credits)) => models::success(CreditListData { credits }),
        Ok(None) => models::not_found("track not found"),
        Err(err) => models::internal_error(&err, "failed to list credits"),
    }
}

#[utoipa::path(
    post,
    path = "/api/tracks/{id}/credits",
    request_body = CreditCreateRequest,
    responses(
        (status = 200, description = "Credit added", body = CreditData),
        (status = 400, description = "Missing key or value"),
        (status = 404, description = "Track not found")
    )
)]
#[post("/api/tracks/{id}/credits")]
pub async fn add_credit(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    body: web::Json<CreditCreateRequest>,
) -> impl Responder {
    if body.credit_key.trim().is_empty() || body.credit_value.trim().is_empty() {
        return models::bad_request("INVALID_DATA", "credit_key and credit_value are required");
    }
    let added = state.catalog.add_credit(
        *path,
        body.credit_key.trim(),
        body.credit_value.trim(),
        body.display_order,
    );
    match added {
        Ok(Some(credit)) => models::success(CreditData { credit }),
        Ok(None) => models::not_found("track not found"),
        Err(err) => models::internal_error(&err, "failed to add credit"),
    }
}

#[utoipa::path(
    put,
    path = "/api/tracks/{id}/credits/{credit_id}",
    request_body = CreditUpdateRequest,
    responses(
        (status = 200, description = "Credit updated", body = CreditData),
        (status = 404, description = "Credit not found")
    )
)]
#[put("/api/tracks/{id}/credits/{credit_id}")]
pub async fn update_credit(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<(i64, i64)>,
    body: web::Json<CreditUpdateRequest>,
) -> impl Responder {
    let (track_id, credit_id) = path.into_inner();
    let updated = state.catalog.update_credit(
        track_id,
        credit_id,
        &body.credit_key,
        &body.credit_value,
        body.display_order,
    );
    match updated {
        Ok(Some(credit)) => models::success(CreditData { credit }),
        Ok(None) => models::not_found("credit not found"),
        Err(err) => models::internal_error(&err, "failed to update credit"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/tracks/{id}/credits/{credit_id}",
    responses(
        (status = 200, description = "Credit deleted"),
        (status = 404, description = "Credit not found")
    )
)]
#[delete("/api/tracks/{id}/credits/{credit_id}")]
pub async fn delete_credit(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (track_id, credit_id) = path.into_inner();
    match state.catalog.delete_credit(track_id, credit_id) {
        Ok(true) => models::success(MessageData::new("credit deleted")),
        Ok(false) => models::not_found("credit not found"),
        Err(err) => models::internal_error(&err, "failed to delete credit"),
    }
}

//! Album endpoints.

use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, Responder};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::AuthedUser;
use crate::models::{
    self, AlbumDetailData, AlbumListData, AlbumUpdateRequest, MessageData, Pagination,
};
use crate::state::AppState;
use crate::storage::StorageCategory;

use super::tracks::{page_window, remove_blob_best_effort};

/// Query parameters for album and artist listings.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/albums",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated albums with track counts", body = AlbumListData),
        (status = 401, description = "Not authenticated")
    )
)]
#[get("/api/albums")]
pub async fn list_albums(
    state: web::Data<AppState>,
    _user: AuthedUser,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let (page, limit) = page_window(query.page, query.limit);
    match state.catalog.list_albums(query.search.as_deref(), limit, (page - 1) * limit) {
        Ok((albums, total)) => models::success(AlbumListData {
            albums,
            pagination: Pagination::new(page, limit, total),
        }),
        Err(err) => models::internal_error(&err, "failed to list albums"),
    }
}

#[utoipa::path(
    get,
    path = "/api/albums/{id}",
    responses(
        (status = 200, description = "Album with its tracks", body = AlbumDetailData),
        (status = 404, description = "Album not found")
    )
)]
#[get("/api/albums/{id}")]
pub async fn get_album(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    let album = match state.catalog.album_by_id(*path) {
        Ok(Some(album)) => album,
        Ok(None) => return models::not_found("album not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch album"),
    };
    match state.catalog.tracks_for_album(album.id) {
        Ok(tracks) => models::success(AlbumDetailData { album, tracks }),
        Err(err) => models::internal_error(&err, "failed to fetch album tracks"),
    }
}

#[utoipa::path(
    put,
    path = "/api/albums/{id}",
    request_body = AlbumUpdateRequest,
    responses(
        (status = 200, description = "Album updated"),
        (status = 404, description = "Album not found")
    )
)]
#[put("/api/albums/{id}")]
pub async fn update_album(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    body: web::Json<AlbumUpdateRequest>,
) -> impl Responder {
    match state.catalog.update_album(*path, &body.title, body.release_date.as_deref()) {
        Ok(Some(album)) => models::success(album),
        Ok(None) => models::not_found("album not found"),
        Err(err) => models::internal_error(&err, "failed to update album"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/albums/{id}",
    responses(
        (status = 200, description = "Album deleted; its tracks are detached"),
        (status = 404, description = "Album not found")
    )
)]
#[delete("/api/albums/{id}")]
pub async fn delete_album(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    match state.catalog.delete_album(*path) {
        Ok(Some(cover_path)) => {
            if let Some(cover) = cover_path {
                remove_blob_best_effort(&state, &cover).await;
            }
            models::success(MessageData::new("album deleted"))
        }
        Ok(None) => models::not_found("album not found"),
        Err(err) => models::internal_error(&err, "failed to delete album"),
    }
}

#[utoipa::path(
    post,
    path = "/api/albums/{id}/cover",
    responses(
        (status = 200, description = "Cover replaced"),
        (status = 400, description = "No image in request"),
        (status = 404, description = "Album not found")
    )
)]
#[post("/api/albums/{id}/cover")]
/// Unlike ingestion's backfill, this replaces the album cover outright.
pub async fn upload_album_cover(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    payload: Multipart,
) -> impl Responder {
    let mut files = match super::collect_files(
        payload,
        Some("cover"),
        super::UploadKind::CoverImage,
        state.limits.image_bytes,
    )
    .await
    {
        Ok(files) => files,
        Err(err) => return models::bad_request("UPLOAD_ERROR", &err.to_string()),
    };
    let Some(file) = files.pop() else {
        return models::bad_request("NO_FILE", "No cover image uploaded");
    };

    let locator = match state
        .storage
        .upload(&file.bytes, &file.file_name, StorageCategory::Covers)
        .await
    {
        Ok(locator) => locator,
        Err(err) => return models::internal_error(&err, "failed to store cover"),
    };

    match state.catalog.set_album_cover(*path, &locator) {
        Ok(Some(album)) => models::success(album),
        Ok(None) => {
            remove_blob_best_effort(&state, &locator).await;
            models::not_found("album not found")
        }
        Err(err) => {
            remove_blob_best_effort(&state, &locator).await;
            models::internal_error(&err, "failed to update album cover")
        }
    }
}

//! Artist endpoints.

use actix_web::{get, put, web, Responder};

use crate::auth::AuthedUser;
use crate::models::{self, ArtistDetailData, ArtistListData, ArtistUpdateRequest, Pagination};
use crate::state::AppState;

use super::albums::ListQuery;
use super::tracks::page_window;

#[utoipa::path(
    get,
    path = "/api/artists",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated artists with track counts", body = ArtistListData),
        (status = 401, description = "Not authenticated")
    )
)]
#[get("/api/artists")]
pub async fn list_artists(
    state: web::Data<AppState>,
    _user: AuthedUser,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let (page, limit) = page_window(query.page, query.limit);
    match state.catalog.list_artists(query.search.as_deref(), limit, (page - 1) * limit) {
        Ok((artists, total)) => models::success(ArtistListData {
            artists,
            pagination: Pagination::new(page, limit, total),
        }),
        Err(err) => models::internal_error(&err, "failed to list artists"),
    }
}

#[utoipa::path(
    get,
    path = "/api/artists/{id}",
    responses(
        (status = 200, description = "Artist with their tracks", body = ArtistDetailData),
        (status = 404, description = "Artist not found")
    )
)]
#[get("/api/artists/{id}")]
pub async fn get_artist(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    let artist = match state.catalog.artist_by_id(*path) {
        Ok(Some(artist)) => artist,
        Ok(None) => return models::not_found("artist not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch artist"),
    };
    match state.catalog.tracks_for_artist(artist.id) {
        Ok(tracks) => models::success(ArtistDetailData { artist, tracks }),
        Err(err) => models::internal_error(&err, "failed to fetch artist tracks"),
    }
}

#[utoipa::path(
    put,
    path = "/api/artists/{id}",
    request_body = ArtistUpdateRequest,
    responses(
        (status = 200, description = "Artist renamed"),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Artist not found")
    )
)]
#[put("/api/artists/{id}")]
pub async fn update_artist(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    body: web::Json<ArtistUpdateRequest>,
) -> impl Responder {
    let name = body.name.trim();
    if name.is_empty() {
        return models::bad_request("INVALID_DATA", "name is required");
    }
    match state.catalog.rename_artist(*path, name) {
        Ok(Some(artist)) => models::success(artist),
        Ok(None) => models::not_found("artist not found"),
        Err(err) => models::internal_error(&err, "failed to rename artist"),
    }
}

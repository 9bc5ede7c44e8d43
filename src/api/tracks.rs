//! Track endpoints: upload/ingest, listing, editing, streaming, download,
//! and cover replacement.

use std::path::PathBuf;

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::body::SizedStream;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::http::{header, StatusCode};
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;

use crate::auth::AuthedUser;
use crate::catalog::{SortDir, TrackFilter, TrackSort};
use crate::models::{
    self, CoverData, MessageData, Pagination, TrackListData, TrackUpdateRequest, UploadData,
};
use crate::state::AppState;
use crate::storage::StorageCategory;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Query parameters for track listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TrackListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Substring match on track title, album title, or artist name.
    pub search: Option<String>,
    pub sample_rate_min: Option<i64>,
    pub bit_depth: Option<i64>,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub duration_min: Option<i64>,
    pub duration_max: Option<i64>,
    /// One of created_at, title, duration, sample_rate, release_date.
    pub sort_by: Option<String>,
    /// "asc" or "desc" (default).
    pub sort_dir: Option<String>,
}

pub(crate) fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

fn parse_sort(sort_by: Option<&str>) -> TrackSort {
    match sort_by.unwrap_or("created_at") {
        "title" => TrackSort::Title,
        "duration" => TrackSort::Duration,
        "sample_rate" => TrackSort::SampleRate,
        "release_date" => TrackSort::ReleaseDate,
        _ => TrackSort::CreatedAt,
    }
}

fn parse_dir(sort_dir: Option<&str>) -> SortDir {
    match sort_dir.map(str::to_lowercase).as_deref() {
        Some("asc") => SortDir::Asc,
        _ => SortDir::Desc,
    }
}

#[utoipa::path(
    post,
    path = "/api/tracks/upload",
    responses(
        (status = 200, description = "Batch outcome with per-file failures", body = UploadData),
        (status = 400, description = "No files in request"),
        (status = 401, description = "Not authenticated")
    )
)]
#[post("/api/tracks/upload")]
/// Ingest one or more audio files sent as multipart fields named `files`.
pub async fn upload_tracks(
    state: web::Data<AppState>,
    _user: AuthedUser,
    payload: Multipart,
) -> impl Responder {
    let files = match super::collect_files(
        payload,
        Some("files"),
        super::UploadKind::FlacAudio,
        state.limits.audio_bytes,
    )
    .await
    {
        Ok(files) => files,
        Err(err) => return models::bad_request("UPLOAD_ERROR", &err.to_string()),
    };
    if files.is_empty() {
        return models::bad_request("NO_FILES", "No files uploaded");
    }

    let outcome = state.ingestor.ingest_batch(files).await;
    let total = outcome.tracks.len();
    models::success(UploadData { tracks: outcome.tracks, failures: outcome.failures, total })
}

#[utoipa::path(
    get,
    path = "/api/tracks",
    params(TrackListQuery),
    responses(
        (status = 200, description = "Paginated tracks", body = TrackListData),
        (status = 401, description = "Not authenticated")
    )
)]
#[get("/api/tracks")]
pub async fn list_tracks(
    state: web::Data<AppState>,
    _user: AuthedUser,
    query: web::Query<TrackListQuery>,
) -> impl Responder {
    let (page, limit) = page_window(query.page, query.limit);
    let filter = TrackFilter {
        search: query.search.clone(),
        sample_rate_min: query.sample_rate_min,
        bit_depth: query.bit_depth,
        year_from: query.year_from,
        year_to: query.year_to,
        duration_min: query.duration_min,
        duration_max: query.duration_max,
        sort_by: parse_sort(query.sort_by.as_deref()),
        sort_dir: parse_dir(query.sort_dir.as_deref()),
        limit,
        offset: (page - 1) * limit,
    };
    match state.catalog.list_tracks(&filter) {
        Ok((tracks, total)) => models::success(TrackListData {
            tracks,
            pagination: Pagination::new(page, limit, total),
        }),
        Err(err) => models::internal_error(&err, "failed to list tracks"),
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks/{id}",
    responses(
        (status = 200, description = "Track with album and artists"),
        (status = 404, description = "Track not found")
    )
)]
#[get("/api/tracks/{id}")]
pub async fn get_track(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    match state.catalog.track_by_id(*path) {
        Ok(Some(track)) => models::success(track),
        Ok(None) => models::not_found("track not found"),
        Err(err) => models::internal_error(&err, "failed to fetch track"),
    }
}

#[utoipa::path(
    put,
    path = "/api/tracks/{id}",
    request_body = TrackUpdateRequest,
    responses(
        (status = 200, description = "Track updated"),
        (status = 404, description = "Track not found")
    )
)]
#[put("/api/tracks/{id}")]
/// Edits title/artists/album with the same resolution rules as ingestion.
pub async fn update_track(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    body: web::Json<TrackUpdateRequest>,
) -> impl Responder {
    let updated = state.catalog.update_track(
        *path,
        body.title.as_deref(),
        body.artists.as_deref(),
        body.album_title.as_deref(),
    );
    match updated {
        Ok(true) => match state.catalog.track_by_id(*path) {
            Ok(Some(track)) => models::success(track),
            Ok(None) => models::not_found("track not found"),
            Err(err) => models::internal_error(&err, "failed to fetch track"),
        },
        Ok(false) => models::not_found("track not found"),
        Err(err) => models::internal_error(&err, "failed to update track"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/tracks/{id}",
    responses(
        (status = 200, description = "Track deleted"),
        (status = 404, description = "Track not found")
    )
)]
#[delete("/api/tracks/{id}")]
/// Deletes the catalog row (credits and links cascade), then best-effort
/// removes the stored audio and cover blobs.
pub async fn delete_track(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    match state.catalog.delete_track(*path) {
        Ok(Some((file_path, cover_path, lyrics_path))) => {
            remove_blob_best_effort(&state, &file_path).await;
            if let Some(cover) = cover_path {
                remove_blob_best_effort(&state, &cover).await;
            }
            if let Some(lyrics) = lyrics_path {
                remove_blob_best_effort(&state, &lyrics).await;
            }
            models::success(MessageData::new("track deleted"))
        }
        Ok(None) => models::not_found("track not found"),
        Err(err) => models::internal_error(&err, "failed to delete track"),
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks/{id}/stream",
    responses(
        (status = 200, description = "Full file stream"),
        (status = 206, description = "Partial content"),
        (status = 302, description = "Redirect to the remote storage URL"),
        (status = 404, description = "Track or file not found"),
        (status = 416, description = "Invalid range")
    )
)]
#[get("/api/tracks/{id}/stream")]
/// Streams the audio with HTTP range support in local mode; remote storage
/// answers with a redirect to the public URL.
pub async fn stream_track(
    state: web::Data<AppState>,
    _user: AuthedUser,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let track = match state.catalog.track_by_id(*path) {
        Ok(Some(track)) => track,
        Ok(None) => return models::not_found("track not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch track"),
    };

    if state.storage.is_remote() {
        return HttpResponse::Found()
            .insert_header((header::LOCATION, track.file_path))
            .finish();
    }

    let Some(file_path) = state.storage.resolve_local(&track.file_path) else {
        return models::not_found("track file missing");
    };
    serve_file_with_ranges(&req, file_path).await
}

#[utoipa::path(
    get,
    path = "/api/tracks/{id}/download",
    responses(
        (status = 200, description = "Attachment download"),
        (status = 302, description = "Redirect to the remote storage URL"),
        (status = 404, description = "Track or file not found")
    )
)]
#[get("/api/tracks/{id}/download")]
pub async fn download_track(
    state: web::Data<AppState>,
    _user: AuthedUser,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let track = match state.catalog.track_by_id(*path) {
        Ok(Some(track)) => track,
        Ok(None) => return models::not_found("track not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch track"),
    };

    if state.storage.is_remote() {
        return HttpResponse::Found()
            .insert_header((header::LOCATION, track.file_path))
            .finish();
    }

    let Some(file_path) = state.storage.resolve_local(&track.file_path) else {
        return models::not_found("track file missing");
    };
    let file = match NamedFile::open_async(&file_path).await {
        Ok(file) => file,
        Err(_) => return models::not_found("track file missing"),
    };
    file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(format!("{}.flac", track.title))],
    })
    .into_response(&req)
}

#[utoipa::path(
    post,
    path = "/api/tracks/{id}/cover",
    responses(
        (status = 200, description = "Cover replaced", body = CoverData),
        (status = 400, description = "No image in request"),
        (status = 404, description = "Track not found")
    )
)]
#[post("/api/tracks/{id}/cover")]
/// Stores the uploaded image first; if the track turns out to be missing,
/// the stored blob is removed again.
pub async fn upload_track_cover(
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

    match state.catalog.set_track_cover(*path, &locator) {
        Ok(true) => models::success(CoverData { cover_path: locator }),
        Ok(false) => {
            remove_blob_best_effort(&state, &locator).await;
            models::not_found("track not found")
        }
        Err(err) => {
            remove_blob_best_effort(&state, &locator).await;
            models::internal_error(&err, "failed to update cover")
        }
    }
}

pub(crate) async fn remove_blob_best_effort(state: &AppState, locator: &str) {
    if let Err(err) = state.storage.delete(locator).await {
        tracing::warn!(locator = %locator, error = %format!("{err:#}"), "blob cleanup failed");
    }
}

async fn serve_file_with_ranges(req: &HttpRequest, path: PathBuf) -> HttpResponse {
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return models::not_found("track file missing"),
    };
    let meta = match file.metadata().await {
        Ok(meta) => meta,
        Err(_) => return models::not_found("track file missing"),
    };
    let total_len = meta.len();

    let range_header = req.headers().get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = match range_header.and_then(|h| parse_single_range(h, total_len)) {
        Some(range) => Some(range),
        None if range_header.is_some() => {
            return HttpResponse::RangeNotSatisfiable()
                .insert_header((header::ACCEPT_RANGES, "bytes"))
                .finish();
        }
        None => None,
    };

    let (start, len, status_code) = if let Some((start, end)) = range {
        let len = end.saturating_sub(start).saturating_add(1);
        (start, len, StatusCode::PARTIAL_CONTENT)
    } else {
        (0, total_len, StatusCode::OK)
    };

    if start > 0 {
        if file.seek(std::io::SeekFrom::Start(start)).await.is_err() {
            return HttpResponse::InternalServerError().finish();
        }
    }

    let stream = ReaderStream::new(file.take(len));
    let body = SizedStream::new(len, stream);

    let mut resp = HttpResponse::build(status_code);
    resp.insert_header((header::CONTENT_TYPE, "audio/flac"));
    resp.insert_header((header::ACCEPT_RANGES, "bytes"));
    if let Some((start, end)) = range {
        resp.insert_header((header::CONTENT_RANGE, format!("bytes {start}-{end}/{total_len}")));
    }
    resp.insert_header((header::CONTENT_LENGTH, len.to_string()));
    resp.body(body)
}

pub(crate) fn parse_single_range(header: &str, total_len: u64) -> Option<(u64, u64)> {
    let header = header.trim();
    if !header.starts_with("bytes=") {
        return None;
    }
    let range = header.trim_start_matches("bytes=");
    let first = range.split(',').next()?;
    let (start_s, end_s) = first.split_once('-')?;
    if start_s.is_empty() {
        // Suffix form: the last N bytes of the file.
        let suffix = end_s.parse::<u64>().ok()?;
        if suffix == 0 || total_len == 0 {
            return None;
        }
        return Some((total_len.saturating_sub(suffix), total_len - 1));
    }
    let start = start_s.parse::<u64>().ok()?;
    let end = if end_s.is_empty() {
        total_len.saturating_sub(1)
    } else {
        end_s.parse::<u64>().ok()?
    };
    if start >= total_len || end < start {
        return None;
    }
    Some((start, end.min(total_len.saturating_sub(1))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_range_accepts_open_end() {
        let range = parse_single_range("bytes=10-", 100).unwrap();
        assert_eq!(range, (10, 99));
    }

    #[test]
    fn parse_single_range_rejects_invalid() {
        assert!(parse_single_range("items=1-2", 100).is_none());
        assert!(parse_single_range("bytes=200-300", 100).is_none());
        assert!(parse_single_range("bytes=50-40", 100).is_none());
        assert!(parse_single_range("bytes=-", 100).is_none());
    }

    #[test]
    fn parse_single_range_serves_suffix_lengths() {
        assert_eq!(parse_single_range("bytes=-10", 100), Some((90, 99)));
        assert_eq!(parse_single_range("bytes=-200", 100), Some((0, 99)));
        assert!(parse_single_range("bytes=-0", 100).is_none());
        assert!(parse_single_range("bytes=-10", 0).is_none());
    }

    #[test]
    fn parse_single_range_clamps_end_to_length() {
        let range = parse_single_range("bytes=90-200", 100).unwrap();
        assert_eq!(range, (90, 99));
    }

    #[test]
    fn sort_whitelist_falls_back_to_created_at() {
        assert!(matches!(parse_sort(Some("title")), TrackSort::Title));
        assert!(matches!(parse_sort(Some("release_date")), TrackSort::ReleaseDate));
        assert!(matches!(parse_sort(Some("id; DROP TABLE tracks")), TrackSort::CreatedAt));
        assert!(matches!(parse_sort(None), TrackSort::CreatedAt));
    }

    #[test]
    fn page_window_clamps_inputs() {
        assert_eq!(page_window(None, None), (1, 20));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1));
        assert_eq!(page_window(Some(3), Some(500)), (3, 100));
    }

    #[actix_web::test]
    async fn upload_rejects_non_flac_files_with_400() {
        use actix_web::{test, App};

        let (state, token, _storage) = crate::api::testing::state_with_session();
        let app =
            test::init_service(App::new().app_data(state.clone()).service(upload_tracks)).await;

        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"files\"; filename=\"song.mp3\"\r\n",
            "Content-Type: audio/mpeg\r\n",
            "\r\n",
            "not a flac\r\n",
            "--XBOUNDARY--\r\n",
        );
        let req = test::TestRequest::post()
            .uri("/api/tracks/upload")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let conn = state.catalog.pool().get().expect("conn");
        let tracks: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .expect("count");
        assert_eq!(tracks, 0);
    }
}

//! API request/response types and the JSON response envelope.
//!
//! Every JSON endpoint answers `{"success": true, "data": ...}` or
//! `{"success": false, "error": {"code", "message"}}`.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::UserRecord;
use crate::catalog::{AlbumSummary, ArtistSummary, CreditRecord, TrackSummary};
use crate::ingest::{IngestFailure, IngestSuccess};

pub fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn error_response(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": { "code": code, "message": message }
    }))
}

pub fn not_found(message: &str) -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn bad_request(code: &str, message: &str) -> HttpResponse {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

/// Logs the full error chain and answers an opaque 500.
pub fn internal_error(err: &anyhow::Error, what: &str) -> HttpResponse {
    tracing::error!(error = %format!("{err:#}"), "{what}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", what)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: &str) -> Self {
        MessageData { message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Pagination { page, limit, total, total_pages }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackListData {
    pub tracks: Vec<TrackSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadData {
    pub tracks: Vec<IngestSuccess>,
    pub failures: Vec<IngestFailure>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoverData {
    pub cover_path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LyricsRequest {
    pub lyrics: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LyricsPathData {
    pub lyrics_path: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LyricsContentData {
    pub lyrics: String,
    pub lyrics_path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackUpdateRequest {
    pub title: Option<String>,
    pub artists: Option<Vec<String>>,
    pub album_title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditCreateRequest {
    pub credit_key: String,
    pub credit_value: String,
    pub display_order: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditUpdateRequest {
    pub credit_key: String,
    pub credit_value: String,
    pub display_order: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreditData {
    pub credit: CreditRecord,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreditListData {
    pub credits: Vec<CreditRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AlbumUpdateRequest {
    pub title: String,
    pub release_date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlbumListData {
    pub albums: Vec<AlbumSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlbumDetailData {
    pub album: AlbumSummary,
    pub tracks: Vec<TrackSummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ArtistUpdateRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtistListData {
    pub artists: Vec<ArtistSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtistDetailData {
    pub artist: ArtistSummary,
    pub tracks: Vec<TrackSummary>,
}

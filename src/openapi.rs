use utoipa::OpenApi;

use crate::api;
use crate::auth;
use crate::catalog;
use crate::ingest;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::auth::login,
        api::auth::logout,
        api::auth::me,
        api::tracks::upload_tracks,
        api::tracks::list_tracks,
        api::tracks::get_track,
        api::tracks::update_track,
        api::tracks::delete_track,
        api::tracks::stream_track,
        api::tracks::download_track,
        api::tracks::upload_track_cover,
        api::credits::get_credits,
        api::credits::add_credit,
        api::credits::update_credit,
        api::credits::delete_credit,
        api::lyrics::upload_lyrics,
        api::lyrics::get_lyrics,
        api::lyrics::delete_lyrics,
        api::albums::list_albums,
        api::albums::get_album,
        api::albums::update_album,
        api::albums::delete_album,
        api::albums::upload_album_cover,
        api::artists::list_artists,
        api::artists::get_artist,
        api::artists::update_artist,
    ),
    components(
        schemas(
            auth::UserRecord,
            catalog::TrackSummary,
            catalog::ArtistRef,
            catalog::AlbumSummary,
            catalog::ArtistSummary,
            catalog::CreditRecord,
            ingest::IngestSuccess,
            ingest::IngestFailure,
            models::LoginRequest,
            models::LoginData,
            models::MessageData,
            models::Pagination,
            models::TrackListData,
            models::UploadData,
            models::CoverData,
            models::TrackUpdateRequest,
            models::CreditCreateRequest,
            models::CreditUpdateRequest,
            models::CreditData,
            models::CreditListData,
            models::LyricsRequest,
            models::LyricsPathData,
            models::LyricsContentData,
            models::AlbumUpdateRequest,
            models::AlbumListData,
            models::AlbumDetailData,
            models::ArtistUpdateRequest,
            models::ArtistListData,
            models::ArtistDetailData,
        )
    ),
    tags(
        (name = "flacvault", description = "Music library and ingestion API")
    )
)]
pub struct ApiDoc;

//! Per-track lyrics: LRC content stored as a blob in the `lyrics` storage
//! category, referenced by `tracks.lyrics_path`.

use actix_web::http::StatusCode;
use actix_web::{delete, get, post, web, Responder};

use crate::auth::AuthedUser;
use crate::models::{self, LyricsContentData, LyricsPathData, LyricsRequest, MessageData};
use crate::state::AppState;
use crate::storage::StorageCategory;

use super::tracks::remove_blob_best_effort;

#[utoipa::path(
    post,
    path = "/api/tracks/{id}/lyrics",
    request_body = LyricsRequest,
    responses(
        (status = 200, description = "Lyrics stored", body = LyricsPathData),
        (status = 400, description = "Empty or oversized lyrics content"),
        (status = 404, description = "Track not found")
    )
)]
#[post("/api/tracks/{id}/lyrics")]
/// Stores the content as a fresh `.lrc` blob and replaces any previous one.
pub async fn upload_lyrics(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
    body: web::Json<LyricsRequest>,
) -> impl Responder {
    if body.lyrics.trim().is_empty() {
        return models::bad_request("NO_LYRICS", "No lyrics content provided");
    }
    if body.lyrics.len() > state.limits.lyrics_bytes {
        return models::bad_request("LYRICS_TOO_LARGE", "lyrics content exceeds the size limit");
    }

    let previous = match state.catalog.track_lyrics_path(*path) {
        Ok(Some(previous)) => previous,
        Ok(None) => return models::not_found("track not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch track"),
    };

    let locator = match state
        .storage
        .upload(body.lyrics.as_bytes(), "lyrics.lrc", StorageCategory::Lyrics)
        .await
    {
        Ok(locator) => locator,
        Err(err) => return models::internal_error(&err, "failed to store lyrics"),
    };

    match state.catalog.set_track_lyrics(*path, Some(&locator)) {
        Ok(true) => {
            if let Some(old) = previous {
                remove_blob_best_effort(&state, &old).await;
            }
            models::success(LyricsPathData {
                lyrics_path: locator,
                message: "lyrics uploaded".to_string(),
            })
        }
        Ok(false) => {
            remove_blob_best_effort(&state, &locator).await;
            models::not_found("track not found")
        }
        Err(err) => {
            remove_blob_best_effort(&state, &locator).await;
            models::internal_error(&err, "failed to update lyrics")
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/tracks/{id}/lyrics",
    responses(
        (status = 200, description = "LRC content", body = LyricsContentData),
        (status = 404, description = "Track not found, or it has no lyrics")
    )
)]
#[get("/api/tracks/{id}/lyrics")]
pub async fn get_lyrics(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    let locator = match state.catalog.track_lyrics_path(*path) {
        Ok(Some(Some(locator))) => locator,
        Ok(Some(None)) => {
            return models::error_response(
                StatusCode::NOT_FOUND,
                "NO_LYRICS",
                "no lyrics available for this track",
            );
        }
        Ok(None) => return models::not_found("track not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch track"),
    };

    let bytes = match state.storage.download(&locator).await {
        Ok(bytes) => bytes,
        Err(err) => return models::internal_error(&err, "failed to read lyrics"),
    };
    match String::from_utf8(bytes) {
        Ok(lyrics) => models::success(LyricsContentData { lyrics, lyrics_path: locator }),
        Err(err) => {
            models::internal_error(&anyhow::Error::new(err), "failed to read lyrics")
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/tracks/{id}/lyrics",
    responses(
        (status = 200, description = "Lyrics removed; succeeds when none were set"),
        (status = 404, description = "Track not found")
    )
)]
#[delete("/api/tracks/{id}/lyrics")]
pub async fn delete_lyrics(
    state: web::Data<AppState>,
    _user: AuthedUser,
    path: web::Path<i64>,
) -> impl Responder {
    let previous = match state.catalog.track_lyrics_path(*path) {
        Ok(Some(previous)) => previous,
        Ok(None) => return models::not_found("track not found"),
        Err(err) => return models::internal_error(&err, "failed to fetch track"),
    };

    if let Err(err) = state.catalog.set_track_lyrics(*path, None) {
        return models::internal_error(&err, "failed to clear lyrics");
    }
    if let Some(old) = previous {
        remove_blob_best_effort(&state, &old).await;
    }
    models::success(MessageData::new("lyrics deleted"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::json;

    use super::*;
    use crate::api::testing::state_with_session;
    use crate::catalog::NewTrackFile;
    use crate::normalize::NormalizedTrack;
    use crate::state::AppState;

    fn seed_track(state: &web::Data<AppState>) -> i64 {
        let track = NormalizedTrack {
            title: "Song".to_string(),
            artists: vec!["A".to_string()],
            album: None,
            track_number: None,
            release_date: None,
            duration_secs: None,
            sample_rate: None,
            bit_depth: None,
            cover: None,
        };
        state
            .catalog
            .ingest_file(&NewTrackFile {
                track: &track,
                file_path: "/uploads/tracks/a.flac",
                cover_path: None,
                file_size: 1,
                credits: &[],
            })
            .expect("ingest")
            .id
    }

    #[actix_web::test]
    async fn lyrics_round_trip_and_delete() {
        let (state, token, storage) = state_with_session();
        let track_id = seed_track(&state);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(upload_lyrics)
                .service(get_lyrics)
                .service(delete_lyrics),
        )
        .await;
        let uri = format!("/api/tracks/{track_id}/lyrics");
        let auth = (header::AUTHORIZATION, format!("Bearer {token}"));

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(auth.clone())
            .set_json(json!({ "lyrics": "[00:01.00] hello" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri(&uri).insert_header(auth.clone()).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["lyrics"], "[00:01.00] hello");

        let req =
            test::TestRequest::delete().uri(&uri).insert_header(auth.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(storage.blob_count(), 0);

        let req = test::TestRequest::get().uri(&uri).insert_header(auth).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn replacing_lyrics_drops_the_old_blob() {
        let (state, token, storage) = state_with_session();
        let track_id = seed_track(&state);
        let app = test::init_service(
            App::new().app_data(state.clone()).service(upload_lyrics).service(get_lyrics),
        )
        .await;
        let uri = format!("/api/tracks/{track_id}/lyrics");
        let auth = (header::AUTHORIZATION, format!("Bearer {token}"));

        for content in ["first", "second"] {
            let req = test::TestRequest::post()
                .uri(&uri)
                .insert_header(auth.clone())
                .set_json(json!({ "lyrics": content }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        assert_eq!(storage.blob_count(), 1);
        let req = test::TestRequest::get().uri(&uri).insert_header(auth).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["lyrics"], "second");
    }

    #[actix_web::test]
    async fn lyrics_endpoints_answer_404_for_missing_tracks() {
        let (state, token, _storage) = state_with_session();
        let app = test::init_service(
            App::new().app_data(state.clone()).service(upload_lyrics).service(get_lyrics),
        )
        .await;
        let auth = (header::AUTHORIZATION, format!("Bearer {token}"));

        let req = test::TestRequest::post()
            .uri("/api/tracks/999/lyrics")
            .insert_header(auth.clone())
            .set_json(json!({ "lyrics": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/tracks/999/lyrics")
            .insert_header(auth)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn empty_lyrics_content_is_a_400() {
        let (state, token, _storage) = state_with_session();
        let track_id = seed_track(&state);
        let app =
            test::init_service(App::new().app_data(state.clone()).service(upload_lyrics)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/tracks/{track_id}/lyrics"))
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "lyrics": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

//! HTTP API handlers.

pub mod albums;
pub mod artists;
pub mod auth;
pub mod credits;
pub mod lyrics;
pub mod tracks;

use std::path::Path;

use actix_multipart::Multipart;
use actix_web::{get, web, Responder};
use futures_util::TryStreamExt;

use crate::ingest::UploadedFile;
use crate::models::{self, MessageData};
use crate::state::AppState;

/// Acceptance rules per upload surface. A file passes on either its MIME
/// type or its extension, so clients with sloppy content types still work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadKind {
    FlacAudio,
    CoverImage,
}

impl UploadKind {
    pub(crate) fn accepts(self, file_name: &str, content_type: Option<&str>) -> bool {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        match self {
            UploadKind::FlacAudio => {
                matches!(content_type, Some("audio/flac" | "audio/x-flac"))
                    || ext.as_deref() == Some("flac")
            }
            UploadKind::CoverImage => {
                matches!(
                    content_type,
                    Some("image/jpeg" | "image/jpg" | "image/png" | "image/webp")
                ) || matches!(ext.as_deref(), Some("jpg" | "jpeg" | "png" | "webp"))
            }
        }
    }

    fn rejection(self) -> &'static str {
        match self {
            UploadKind::FlacAudio => "only FLAC files are accepted",
            UploadKind::CoverImage => "only JPEG, PNG, or WebP images are accepted",
        }
    }
}

/// Reads multipart file fields into memory. When `field_name` is given,
/// fields under other names are skipped. Each accepted file must pass the
/// `kind` filter and stay under `max_bytes`.
pub(crate) async fn collect_files(
    mut payload: Multipart,
    field_name: Option<&str>,
    kind: UploadKind,
    max_bytes: usize,
) -> anyhow::Result<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| anyhow::anyhow!("read multipart field: {err}"))?
    {
        if let Some(expected) = field_name {
            if field.name() != expected {
                continue;
            }
        }
        let file_name = field
            .content_disposition()
            .get_filename()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
        if !kind.accepts(&file_name, content_type.as_deref()) {
            anyhow::bail!("{file_name}: {}", kind.rejection());
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|err| anyhow::anyhow!("read multipart chunk: {err}"))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                anyhow::bail!("{file_name} exceeds the {max_bytes} byte upload limit");
            }
            bytes.extend_from_slice(&chunk);
        }
        files.push(UploadedFile { file_name, bytes });
    }
    Ok(files)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Catalog unavailable")
    )
)]
#[get("/health")]
/// Liveness check, including a catalog round trip.
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    match state.catalog.health_check() {
        Ok(()) => models::success(MessageData::new("ok")),
        Err(err) => models::internal_error(&err, "catalog unavailable"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flac_filter_accepts_by_mime_or_extension() {
        let kind = UploadKind::FlacAudio;
        assert!(kind.accepts("song.flac", None));
        assert!(kind.accepts("SONG.FLAC", None));
        assert!(kind.accepts("song.bin", Some("audio/flac")));
        assert!(kind.accepts("song.bin", Some("audio/x-flac")));
    }

    #[test]
    fn flac_filter_rejects_other_audio() {
        let kind = UploadKind::FlacAudio;
        assert!(!kind.accepts("song.mp3", Some("audio/mpeg")));
        assert!(!kind.accepts("song.ogg", None));
        assert!(!kind.accepts("song", Some("application/octet-stream")));
    }

    #[test]
    fn image_filter_accepts_common_types_only() {
        let kind = UploadKind::CoverImage;
        assert!(kind.accepts("cover.jpg", None));
        assert!(kind.accepts("cover.jpeg", None));
        assert!(kind.accepts("cover.png", None));
        assert!(kind.accepts("cover.webp", None));
        assert!(kind.accepts("cover.bin", Some("image/png")));
        assert!(!kind.accepts("cover.gif", Some("image/gif")));
        assert!(!kind.accepts("cover.svg", Some("image/svg+xml")));
    }
}

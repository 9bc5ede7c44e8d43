//! Metadata normalization: collapses the parsed tag view into the canonical
//! catalog record, applying the fallback rules for sparse files.

use std::path::Path;

use crate::tags::ParsedAudio;

/// Canonical per-file record fed to the catalog upsert.
#[derive(Debug, Clone)]
pub struct NormalizedTrack {
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    /// `YYYY-01-01` when only a year is known; tags rarely carry more.
    pub release_date: Option<String>,
    pub duration_secs: Option<i64>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
    pub cover: Option<CoverImage>,
}

#[derive(Debug, Clone)]
pub struct CoverImage {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

pub fn normalize(parsed: &ParsedAudio, file_name: &str) -> NormalizedTrack {
    let common = &parsed.common;

    let title = common
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_stem(file_name).to_string());

    let artists = if !common.artists.is_empty() {
        common.artists.clone()
    } else if let Some(artist) = common.artist.clone().filter(|a| !a.is_empty()) {
        vec![artist]
    } else {
        vec!["Unknown Artist".to_string()]
    };

    let cover = common.pictures.first().map(|picture| {
        let ext = cover_extension(&picture.mime);
        CoverImage {
            file_name: format!("{}_cover.{ext}", file_stem(file_name)),
            mime: picture.mime.clone(),
            data: picture.data.clone(),
        }
    });

    let duration = parsed.properties.duration;
    let duration_secs = if duration.is_zero() { None } else { Some(duration.as_secs() as i64) };

    NormalizedTrack {
        title,
        artists,
        album: common.album.clone().filter(|a| !a.is_empty()),
        track_number: common.track,
        release_date: common.year.map(|year| format!("{year:04}-01-01")),
        duration_secs,
        sample_rate: parsed.properties.sample_rate,
        bit_depth: parsed.properties.bit_depth,
        cover,
    }
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}

/// Image MIME type to cover file extension. Unmapped types fall back to the
/// subtype, then to jpg.
pub fn cover_extension(mime: &str) -> String {
    match mime.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg".to_string(),
        "image/png" => "png".to_string(),
        "image/webp" => "webp".to_string(),
        "image/gif" => "gif".to_string(),
        "image/bmp" => "bmp".to_string(),
        other => {
            let subtype = other.split('/').nth(1).unwrap_or("");
            if subtype.is_empty() { "jpg".to_string() } else { subtype.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{AudioProperties, CommonTags, EmbeddedPicture, ParsedAudio};
    use std::time::Duration;

    fn parsed(common: CommonTags, duration: Duration) -> ParsedAudio {
        ParsedAudio {
            common,
            native: Vec::new(),
            properties: AudioProperties {
                duration,
                sample_rate: Some(96_000),
                bit_depth: Some(24),
            },
        }
    }

    #[test]
    fn missing_title_falls_back_to_file_stem() {
        let track = normalize(
            &parsed(CommonTags::default(), Duration::from_secs(10)),
            "01 Moonlight Sonata.flac",
        );
        assert_eq!(track.title, "01 Moonlight Sonata");
    }

    #[test]
    fn missing_artists_fall_back_to_unknown() {
        let track = normalize(&parsed(CommonTags::default(), Duration::from_secs(10)), "x.flac");
        assert_eq!(track.artists, vec!["Unknown Artist"]);
    }

    #[test]
    fn single_artist_field_becomes_one_element_list() {
        let common = CommonTags { artist: Some("Ludwig".to_string()), ..CommonTags::default() };
        let track = normalize(&parsed(common, Duration::from_secs(10)), "x.flac");
        assert_eq!(track.artists, vec!["Ludwig"]);
    }

    #[test]
    fn artists_list_wins_over_single_artist() {
        let common = CommonTags {
            artist: Some("Various".to_string()),
            artists: vec!["A".to_string(), "B".to_string()],
            ..CommonTags::default()
        };
        let track = normalize(&parsed(common, Duration::from_secs(10)), "x.flac");
        assert_eq!(track.artists, vec!["A", "B"]);
    }

    #[test]
    fn year_becomes_first_of_january() {
        let common = CommonTags { year: Some(1999), ..CommonTags::default() };
        let track = normalize(&parsed(common, Duration::from_secs(10)), "x.flac");
        assert_eq!(track.release_date.as_deref(), Some("1999-01-01"));
    }

    #[test]
    fn duration_truncates_to_whole_seconds() {
        let track = normalize(
            &parsed(CommonTags::default(), Duration::from_millis(200_900)),
            "x.flac",
        );
        assert_eq!(track.duration_secs, Some(200));
    }

    #[test]
    fn first_picture_becomes_the_cover() {
        let common = CommonTags {
            pictures: vec![
                EmbeddedPicture { mime: "image/png".to_string(), data: vec![1, 2] },
                EmbeddedPicture { mime: "image/jpeg".to_string(), data: vec![3] },
            ],
            ..CommonTags::default()
        };
        let track = normalize(&parsed(common, Duration::from_secs(10)), "Album Track.flac");
        let cover = track.cover.unwrap();
        assert_eq!(cover.file_name, "Album Track_cover.png");
        assert_eq!(cover.data, vec![1, 2]);
    }

    #[test]
    fn cover_extension_table() {
        assert_eq!(cover_extension("image/jpeg"), "jpg");
        assert_eq!(cover_extension("IMAGE/PNG"), "png");
        assert_eq!(cover_extension("image/tiff"), "tiff");
        assert_eq!(cover_extension("weird"), "jpg");
    }
}

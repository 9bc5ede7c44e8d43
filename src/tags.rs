//! Tag parsing adapter. Wraps lofty behind a parser-agnostic view so the
//! rest of the pipeline never touches parser types directly.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use lofty::{
    Accessor, AudioFile, ItemKey, ItemValue, Probe, Tag, TagType, TaggedFileExt,
};

/// Closed set of tag value shapes. Every consumer matches exhaustively,
/// so a new shape is a compile error instead of a silently dropped field.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Number(i64),
    /// Loudness ratio, e.g. replaygain values.
    Ratio { db: f64 },
    /// Position-in-set values like track 3 of 12.
    Pair { no: Option<u32>, of: Option<u32> },
    Binary,
    List(Vec<TagValue>),
    Unrecognized,
}

/// A single frame inside one native tag namespace, keyed by the frame id
/// as the container spells it (vorbis field name, ID3 frame id, ...).
#[derive(Debug, Clone)]
pub struct TagFrame {
    pub id: String,
    pub value: TagValue,
}

#[derive(Debug, Clone)]
pub struct TagNamespace {
    pub name: String,
    pub frames: Vec<TagFrame>,
}

#[derive(Debug, Clone)]
pub struct EmbeddedPicture {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Container-independent view of the well-known fields.
#[derive(Debug, Clone, Default)]
pub struct CommonTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
    pub track_total: Option<u32>,
    pub disk: Option<u32>,
    pub disk_total: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub pictures: Vec<EmbeddedPicture>,
}

impl CommonTags {
    /// The common view as `(field, value)` pairs for the credit walk. Field
    /// names mirror the structured columns so the skip set applies uniformly.
    pub fn credit_fields(&self) -> Vec<(&'static str, TagValue)> {
        let mut fields = Vec::new();
        if let Some(title) = &self.title {
            fields.push(("title", TagValue::Text(title.clone())));
        }
        if let Some(artist) = &self.artist {
            fields.push(("artist", TagValue::Text(artist.clone())));
        }
        if !self.artists.is_empty() {
            let items = self
                .artists
                .iter()
                .map(|name| TagValue::Text(name.clone()))
                .collect();
            fields.push(("artists", TagValue::List(items)));
        }
        if let Some(album) = &self.album {
            fields.push(("album", TagValue::Text(album.clone())));
        }
        if self.track.is_some() || self.track_total.is_some() {
            fields.push((
                "track",
                TagValue::Pair { no: self.track, of: self.track_total },
            ));
        }
        if self.disk.is_some() || self.disk_total.is_some() {
            fields.push((
                "disk",
                TagValue::Pair { no: self.disk, of: self.disk_total },
            ));
        }
        if let Some(year) = self.year {
            fields.push(("year", TagValue::Number(i64::from(year))));
        }
        if let Some(genre) = &self.genre {
            fields.push(("genre", TagValue::Text(genre.clone())));
        }
        if let Some(comment) = &self.comment {
            fields.push(("comment", TagValue::Text(comment.clone())));
        }
        if !self.pictures.is_empty() {
            fields.push(("picture", TagValue::Binary));
        }
        fields
    }
}

#[derive(Debug, Clone)]
pub struct AudioProperties {
    pub duration: Duration,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ParsedAudio {
    pub common: CommonTags,
    pub native: Vec<TagNamespace>,
    pub properties: AudioProperties,
}

/// Seam between the ingestion pipeline and the tag parser. Tests substitute
/// a canned reader; production uses [`LoftyTagReader`].
pub trait TagReader: Send + Sync {
    fn parse(&self, bytes: &[u8], file_name: &str) -> Result<ParsedAudio>;
}

pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn parse(&self, bytes: &[u8], file_name: &str) -> Result<ParsedAudio> {
        let tagged = Probe::new(Cursor::new(bytes))
            .guess_file_type()
            .with_context(|| format!("detecting container type of {file_name}"))?
            .read()
            .with_context(|| format!("parsing audio tags of {file_name}"))?;

        let properties = tagged.properties();
        let properties = AudioProperties {
            duration: properties.duration(),
            sample_rate: properties.sample_rate(),
            bit_depth: properties.bit_depth(),
        };

        let common = tagged
            .primary_tag()
            .or_else(|| tagged.first_tag())
            .map(common_from_tag)
            .unwrap_or_default();

        let native = tagged.tags().iter().map(namespace_from_tag).collect();

        Ok(ParsedAudio { common, native, properties })
    }
}

fn common_from_tag(tag: &Tag) -> CommonTags {
    let artists = tag
        .items()
        .filter(|item| matches!(item.key(), ItemKey::TrackArtist))
        .filter_map(|item| match item.value() {
            ItemValue::Text(text) => Some(text.clone()),
            _ => None,
        })
        .collect();

    let pictures = tag
        .pictures()
        .iter()
        .map(|picture| EmbeddedPicture {
            mime: picture.mime_type().map(|m| m.as_str()).unwrap_or_default().to_string(),
            data: picture.data().to_vec(),
        })
        .collect();

    CommonTags {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        artists,
        album: tag.album().map(|s| s.to_string()),
        track: tag.track(),
        track_total: tag.track_total(),
        disk: tag.disk(),
        disk_total: tag.disk_total(),
        year: tag.year(),
        genre: tag.genre().map(|s| s.to_string()),
        comment: tag.comment().map(|s| s.to_string()),
        pictures,
    }
}

fn namespace_from_tag(tag: &Tag) -> TagNamespace {
    let frames = tag
        .items()
        .map(|item| {
            let value = match item.value() {
                ItemValue::Text(text) => TagValue::Text(text.clone()),
                ItemValue::Locator(locator) => TagValue::Text(locator.clone()),
                ItemValue::Binary(_) => TagValue::Binary,
            };
            TagFrame { id: frame_id(item.key()), value }
        })
        .collect();
    TagNamespace { name: namespace_name(tag.tag_type()).to_string(), frames }
}

/// Frame id used for credit keys. Unknown keys keep the container's raw
/// spelling; well-known keys use the parser's canonical name.
fn frame_id(key: &ItemKey) -> String {
    match key {
        ItemKey::Unknown(raw) => raw.clone(),
        known => format!("{known:?}"),
    }
}

fn namespace_name(tag_type: TagType) -> &'static str {
    match tag_type {
        TagType::VorbisComments => "vorbis",
        TagType::Id3v2 => "id3v2",
        TagType::Id3v1 => "id3v1",
        TagType::Mp4Ilst => "itunes",
        TagType::Ape => "ape",
        TagType::RiffInfo => "riff",
        TagType::AiffText => "aiff",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vorbis_tag() -> Tag {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.set_title("Moonlight".to_string());
        tag.set_album("Nocturnes".to_string());
        tag.set_track(3);
        tag
    }

    #[test]
    fn common_view_reads_accessor_fields() {
        let tag = vorbis_tag();
        let common = common_from_tag(&tag);
        assert_eq!(common.title.as_deref(), Some("Moonlight"));
        assert_eq!(common.album.as_deref(), Some("Nocturnes"));
        assert_eq!(common.track, Some(3));
        assert!(common.artists.is_empty());
    }

    #[test]
    fn unknown_frames_keep_their_raw_id() {
        let mut tag = vorbis_tag();
        tag.insert_unchecked(lofty::TagItem::new(
            ItemKey::Unknown("MIXED_BY".to_string()),
            ItemValue::Text("R. Ludwig".to_string()),
        ));
        let namespace = namespace_from_tag(&tag);
        assert_eq!(namespace.name, "vorbis");
        assert!(namespace
            .frames
            .iter()
            .any(|f| f.id == "MIXED_BY" && f.value == TagValue::Text("R. Ludwig".to_string())));
    }

    #[test]
    fn credit_fields_mirror_structured_column_names() {
        let common = CommonTags {
            title: Some("Moonlight".to_string()),
            artists: vec!["Ludwig".to_string()],
            track: Some(3),
            track_total: Some(12),
            year: Some(1999),
            genre: Some("Classical".to_string()),
            ..CommonTags::default()
        };
        let fields = common.credit_fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["title", "artists", "track", "year", "genre"]);
        assert_eq!(
            fields[2].1,
            TagValue::Pair { no: Some(3), of: Some(12) }
        );
    }
}

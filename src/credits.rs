//! Credit extraction: walks every native tag namespace, then the common
//! view, turning leftover fields into ordered key/value credit rows.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::tags::{ParsedAudio, TagValue};

/// Fields already captured as structured columns, plus technical noise
/// (replaygain, encoder info, fingerprint ids). Compared lowercased.
/// Contains both the raw container spellings and the parser's canonical
/// frame names so a field is skipped no matter which form it arrives in.
const CREDIT_SKIP_KEYS: &[&str] = &[
    "title", "titlesort", "titlesortorder",
    "artist", "artists", "artistsort", "artistsortorder",
    "albumartist", "albumartistsort", "albumartistsortorder",
    "album", "albumsort", "albumsortorder",
    "track", "tracknumber", "trackno", "trck", "tracktotal",
    "disk", "discnumber", "tpos", "disctotal",
    "date", "year", "originaldate", "originalyear", "tdrc", "tyer", "tdor",
    "picture", "apic", "covr", "metadata_block_picture",
    "replaygain_track_gain", "replaygain_track_peak",
    "replaygain_album_gain", "replaygain_album_peak",
    "replaygain_reference_loudness",
    "replaygain_track_gain_ratio", "replaygain_track_peak_ratio",
    "replaygain_album_gain_ratio", "replaygain_album_peak_ratio",
    "replaygain_track_minmax", "replaygain_album_minmax", "replaygain_undo",
    "waveformatextensible_channel_mask",
    "encoder", "encoding", "encodingsettings", "encodedby", "encodersettings",
    "musicbrainz_trackid", "musicbrainz_albumid", "musicbrainz_artistid",
    "musicbrainz_albumartistid", "musicbrainz_releasegroupid",
    "musicbrainz_workid", "musicbrainz_trmid", "musicbrainz_discid",
    "musicbrainz_recordingid", "musicip_puid", "musicip_fingerprint",
    "acoustid_id", "acoustid_fingerprint",
    "averagelevel", "peaklevel",
    "gapless", "compilation",
    "stik", "hdvideo",
    "playcounter",
    "discogs_artist_id", "discogs_release_id", "discogs_label_id",
    "discogs_master_release_id", "discogs_votes", "discogs_rating",
    // canonical parser names for the same fields
    "tracktitle", "trackartist", "albumtitle",
    "tracktitlesortorder", "trackartistsortorder",
    "albumtitlesortorder", "albumartistsortorder",
    "recordingdate", "originalreleasedate",
    "replaygaintrackgain", "replaygaintrackpeak",
    "replaygainalbumgain", "replaygainalbumpeak",
    "encodersoftware", "encodingtime",
    "musicbrainztrackid", "musicbrainzrecordingid", "musicbrainzreleaseid",
    "musicbrainzreleasegroupid", "musicbrainzartistid",
    "musicbrainzreleaseartistid", "musicbrainzworkid", "musicbrainzdiscid",
    "acoustidid", "acoustidfingerprint",
    "flagcompilation", "popularimeter",
];

fn skip_keys() -> &'static HashSet<&'static str> {
    static KEYS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    KEYS.get_or_init(|| CREDIT_SKIP_KEYS.iter().copied().collect())
}

fn is_skipped(key: &str) -> bool {
    skip_keys().contains(key.to_lowercase().as_str())
}

/// One extracted credit. `display_order` is the stable extraction position.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditEntry {
    pub key: String,
    pub value: String,
    pub display_order: i64,
}

/// Converts one tag value into zero or more displayable strings. Binary and
/// position-in-set values carry no credit information and yield nothing.
pub fn to_string_list(value: &TagValue) -> Vec<String> {
    match value {
        TagValue::Text(text) => vec![text.clone()],
        TagValue::Number(n) => vec![n.to_string()],
        TagValue::Ratio { db } => vec![format!("{db:.2} dB")],
        TagValue::Pair { .. } => Vec::new(),
        TagValue::Binary => Vec::new(),
        TagValue::List(items) => items.iter().flat_map(to_string_list).collect(),
        TagValue::Unrecognized => Vec::new(),
    }
}

struct CreditCollector {
    seen: HashSet<(String, String)>,
    next_order: i64,
    entries: Vec<CreditEntry>,
}

impl CreditCollector {
    fn new() -> Self {
        CreditCollector { seen: HashSet::new(), next_order: 0, entries: Vec::new() }
    }

    /// Dedup is on (lowercased key, trimmed value); the stored key keeps
    /// its original casing and the stored value is trimmed.
    fn push(&mut self, key: &str, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        let pair = (key.to_lowercase(), trimmed.to_string());
        if !self.seen.insert(pair) {
            return;
        }
        self.entries.push(CreditEntry {
            key: key.to_string(),
            value: trimmed.to_string(),
            display_order: self.next_order,
        });
        self.next_order += 1;
    }

    fn collect(&mut self, key: &str, value: &TagValue) {
        if is_skipped(key) {
            return;
        }
        for text in to_string_list(value) {
            self.push(key, &text);
        }
    }
}

/// Walks native namespaces in parse order, then the common view, so
/// container-level fields win the dedup race over derived ones.
pub fn extract_credits(parsed: &ParsedAudio) -> Vec<CreditEntry> {
    let mut collector = CreditCollector::new();
    for namespace in &parsed.native {
        for frame in &namespace.frames {
            collector.collect(&frame.id, &frame.value);
        }
    }
    for (field, value) in parsed.common.credit_fields() {
        collector.collect(field, &value);
    }
    collector.entries
}

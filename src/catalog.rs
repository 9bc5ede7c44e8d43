//! SQLite catalog for tracks/albums/artists/credits.
//!
//! Provides pooled connections, schema bootstrap, and the per-file ingest
//! transaction. Album and artist resolution is `INSERT OR IGNORE` against a
//! unique index followed by a re-select, so concurrent ingests of the same
//! name converge on one row instead of racing a lookup-then-insert.

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

use crate::credits::CreditEntry;
use crate::normalize::NormalizedTrack;

const SCHEMA_VERSION: i32 = 1;

#[derive(Clone)]
pub struct CatalogDb {
    pool: Pool<SqliteConnectionManager>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ArtistRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct TrackSummary {
    pub id: i64,
    pub title: String,
    pub album_id: Option<i64>,
    pub album_title: Option<String>,
    pub album_cover: Option<String>,
    pub file_path: String,
    pub cover_path: Option<String>,
    pub lyrics_path: Option<String>,
    pub duration: Option<i64>,
    pub track_number: Option<i64>,
    pub sample_rate: Option<i64>,
    pub bit_depth: Option<i64>,
    pub file_size: Option<i64>,
    pub release_date: Option<String>,
    pub created_at: String,
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct AlbumSummary {
    pub id: i64,
    pub title: String,
    pub cover_path: Option<String>,
    pub release_date: Option<String>,
    pub track_count: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ArtistSummary {
    pub id: i64,
    pub name: String,
    pub track_count: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct CreditRecord {
    pub id: i64,
    pub credit_key: String,
    pub credit_value: String,
    pub display_order: i64,
}

#[derive(Debug, Clone)]
pub struct IngestedTrack {
    pub id: i64,
    pub title: String,
}

/// One uploaded file's worth of catalog writes.
pub struct NewTrackFile<'a> {
    pub track: &'a NormalizedTrack,
    pub file_path: &'a str,
    pub cover_path: Option<&'a str>,
    pub file_size: i64,
    pub credits: &'a [CreditEntry],
}

#[derive(Debug, Clone, Copy, Default)]
pub enum TrackSort {
    #[default]
    CreatedAt,
    Title,
    Duration,
    SampleRate,
    ReleaseDate,
}

impl TrackSort {
    fn column(self) -> &'static str {
        match self {
            TrackSort::CreatedAt => "t.created_at",
            TrackSort::Title => "t.title",
            TrackSort::Duration => "t.duration",
            TrackSort::SampleRate => "t.sample_rate",
            TrackSort::ReleaseDate => "t.release_date",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    fn keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    pub search: Option<String>,
    pub sample_rate_min: Option<i64>,
    pub bit_depth: Option<i64>,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub duration_min: Option<i64>,
    pub duration_max: Option<i64>,
    pub sort_by: TrackSort,
    pub sort_dir: SortDir,
    pub limit: i64,
    pub offset: i64,
}

const TRACK_COLUMNS: &str = r#"
    t.id, t.title, t.album_id, al.title, al.cover_path,
    t.file_path, t.cover_path, t.lyrics_path, t.duration, t.track_number,
    t.sample_rate, t.bit_depth, t.file_size, t.release_date, t.created_at
"#;

const TRACK_FILTER_WHERE: &str = r#"
    (?1 IS NULL
        OR LOWER(t.title) LIKE ?1
        OR LOWER(COALESCE(al.title, '')) LIKE ?1
        OR EXISTS (
            SELECT 1 FROM track_artists ta
            JOIN artists ar ON ar.id = ta.artist_id
            WHERE ta.track_id = t.id AND LOWER(ar.name) LIKE ?1))
    AND (?2 IS NULL OR t.sample_rate >= ?2)
    AND (?3 IS NULL OR t.bit_depth = ?3)
    AND (?4 IS NULL OR CAST(substr(t.release_date, 1, 4) AS INTEGER) >= ?4)
    AND (?5 IS NULL OR CAST(substr(t.release_date, 1, 4) AS INTEGER) <= ?5)
    AND (?6 IS NULL OR t.duration >= ?6)
    AND (?7 IS NULL OR t.duration <= ?7)
"#;

fn map_track_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackSummary> {
    Ok(TrackSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        album_id: row.get(2)?,
        album_title: row.get(3)?,
        album_cover: row.get(4)?,
        file_path: row.get(5)?,
        cover_path: row.get(6)?,
        lyrics_path: row.get(7)?,
        duration: row.get(8)?,
        track_number: row.get(9)?,
        sample_rate: row.get(10)?,
        bit_depth: row.get(11)?,
        file_size: row.get(12)?,
        release_date: row.get(13)?,
        created_at: row.get(14)?,
        artists: Vec::new(),
    })
}

fn map_credit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CreditRecord> {
    Ok(CreditRecord {
        id: row.get(0)?,
        credit_key: row.get(1)?,
        credit_value: row.get(2)?,
        display_order: row.get(3)?,
    })
}

impl CatalogDb {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create catalog dir {:?}", parent))?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .context("create catalog db pool")?;

        {
            let conn = pool.get().context("open catalog db")?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Every pooled connection shares the one in-memory database, so the
    /// pool is capped at a single connection.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .context("create in-memory catalog pool")?;
        {
            let conn = pool.get().context("open in-memory catalog")?;
            init_schema(&conn)?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .context("catalog liveness check")?;
        Ok(())
    }

    /// All catalog writes for one uploaded file in a single transaction:
    /// album resolution, the track row, artist links, and credit rows
    /// commit together or not at all.
    pub fn ingest_file(&self, file: &NewTrackFile<'_>) -> Result<IngestedTrack> {
        let mut conn = self.pool.get().context("open catalog db")?;
        let tx = conn.transaction().context("begin ingest tx")?;

        let album_id = match &file.track.album {
            Some(title) => Some(resolve_album(
                &tx,
                title,
                file.cover_path,
                file.track.release_date.as_deref(),
            )?),
            None => None,
        };

        tx.execute(
            r#"
            INSERT INTO tracks
                (title, album_id, file_path, cover_path, duration, track_number,
                 sample_rate, bit_depth, file_size, release_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                file.track.title,
                album_id,
                file.file_path,
                file.cover_path,
                file.track.duration_secs,
                file.track.track_number,
                file.track.sample_rate,
                file.track.bit_depth,
                file.file_size,
                file.track.release_date,
            ],
        )
        .context("insert track")?;
        let track_id = tx.last_insert_rowid();

        for name in &file.track.artists {
            let artist_id = upsert_artist(&tx, name)?;
            link_track_artist(&tx, track_id, artist_id)?;
        }

        for credit in file.credits {
            tx.execute(
                r#"
                INSERT INTO track_credits (track_id, credit_key, credit_value, display_order)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![track_id, credit.key, credit.value, credit.display_order],
            )
            .context("insert credit")?;
        }

        tx.commit().context("commit ingest tx")?;
        Ok(IngestedTrack { id: track_id, title: file.track.title.clone() })
    }

    pub fn list_tracks(&self, filter: &TrackFilter) -> Result<(Vec<TrackSummary>, i64)> {
        let conn = self.pool.get().context("open catalog db")?;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let args = params![
            search,
            filter.sample_rate_min,
            filter.bit_depth,
            filter.year_from,
            filter.year_to,
            filter.duration_min,
            filter.duration_max,
            filter.limit,
            filter.offset,
        ];

        let total: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM tracks t LEFT JOIN albums al ON al.id = t.album_id WHERE {TRACK_FILTER_WHERE}"
                ),
                &args[..7],
                |row| row.get(0),
            )
            .context("count tracks")?;

        let query = format!(
            "SELECT {TRACK_COLUMNS} FROM tracks t LEFT JOIN albums al ON al.id = t.album_id \
             WHERE {TRACK_FILTER_WHERE} ORDER BY {} {} LIMIT ?8 OFFSET ?9",
            filter.sort_by.column(),
            filter.sort_dir.keyword(),
        );
        let mut stmt = conn.prepare(&query).context("prepare track listing")?;
        let mut tracks = stmt
            .query_map(args, map_track_row)
            .context("list tracks")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for track in &mut tracks {
            track.artists = artists_for_track(&conn, track.id)?;
        }
        Ok((tracks, total))
    }

    pub fn track_by_id(&self, track_id: i64) -> Result<Option<TrackSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        track_by_id_inner(&conn, track_id)
    }

    /// Title/artists/album reassignment with the same resolution semantics
    /// as ingestion. Artist links are replaced wholesale when a new list is
    /// given. An empty album title detaches the track from its album.
    pub fn update_track(
        &self,
        track_id: i64,
        title: Option<&str>,
        artists: Option<&[String]>,
        album_title: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.pool.get().context("open catalog db")?;
        let tx = conn.transaction().context("begin track update tx")?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM tracks WHERE id = ?1", params![track_id], |row| row.get(0))
            .optional()
            .context("check track exists")?;
        if exists.is_none() {
            return Ok(false);
        }

        if let Some(title) = title {
            tx.execute(
                "UPDATE tracks SET title = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![title, track_id],
            )
            .context("update track title")?;
        }

        if let Some(album_title) = album_title {
            let album_id = if album_title.trim().is_empty() {
                None
            } else {
                Some(resolve_album(&tx, album_title.trim(), None, None)?)
            };
            tx.execute(
                "UPDATE tracks SET album_id = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![album_id, track_id],
            )
            .context("update track album")?;
        }

        if let Some(artists) = artists {
            tx.execute("DELETE FROM track_artists WHERE track_id = ?1", params![track_id])
                .context("clear track artists")?;
            for name in artists {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let artist_id = upsert_artist(&tx, name)?;
                link_track_artist(&tx, track_id, artist_id)?;
            }
        }

        tx.commit().context("commit track update tx")?;
        Ok(true)
    }

    /// Deletes the row (links and credits cascade) and returns the storage
    /// locators so the caller can clean up blobs afterwards.
    pub fn delete_track(
        &self,
        track_id: i64,
    ) -> Result<Option<(String, Option<String>, Option<String>)>> {
        let conn = self.pool.get().context("open catalog db")?;
        let paths: Option<(String, Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT file_path, cover_path, lyrics_path FROM tracks WHERE id = ?1",
                params![track_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("fetch track paths")?;
        if paths.is_some() {
            conn.execute("DELETE FROM tracks WHERE id = ?1", params![track_id])
                .context("delete track")?;
        }
        Ok(paths)
    }

    pub fn set_track_cover(&self, track_id: i64, cover_path: &str) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE tracks SET cover_path = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![cover_path, track_id],
            )
            .context("set track cover")?;
        Ok(updated > 0)
    }

    /// Outer `None` means the track does not exist; the inner option is the
    /// stored lyrics locator.
    pub fn track_lyrics_path(&self, track_id: i64) -> Result<Option<Option<String>>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            "SELECT lyrics_path FROM tracks WHERE id = ?1",
            params![track_id],
            |row| row.get(0),
        )
        .optional()
        .context("fetch track lyrics path")
    }

    pub fn set_track_lyrics(&self, track_id: i64, lyrics_path: Option<&str>) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE tracks SET lyrics_path = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![lyrics_path, track_id],
            )
            .context("set track lyrics")?;
        Ok(updated > 0)
    }

    pub fn credits_for_track(&self, track_id: i64) -> Result<Option<Vec<CreditRecord>>> {
        let conn = self.pool.get().context("open catalog db")?;
        if !track_exists(&conn, track_id)? {
            return Ok(None);
        }
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, credit_key, credit_value, display_order
                FROM track_credits
                WHERE track_id = ?1
                ORDER BY display_order, id
                "#,
            )
            .context("prepare credit listing")?;
        let credits = stmt
            .query_map(params![track_id], map_credit_row)
            .context("list credits")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(credits))
    }

    pub fn add_credit(
        &self,
        track_id: i64,
        key: &str,
        value: &str,
        display_order: Option<i64>,
    ) -> Result<Option<CreditRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        if !track_exists(&conn, track_id)? {
            return Ok(None);
        }
        conn.execute(
            r#"
            INSERT INTO track_credits (track_id, credit_key, credit_value, display_order)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![track_id, key, value, display_order.unwrap_or(0)],
        )
        .context("insert credit")?;
        let id = conn.last_insert_rowid();
        let credit = conn
            .query_row(
                "SELECT id, credit_key, credit_value, display_order FROM track_credits WHERE id = ?1",
                params![id],
                map_credit_row,
            )
            .context("fetch inserted credit")?;
        Ok(Some(credit))
    }

    pub fn update_credit(
        &self,
        track_id: i64,
        credit_id: i64,
        key: &str,
        value: &str,
        display_order: i64,
    ) -> Result<Option<CreditRecord>> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                r#"
                UPDATE track_credits
                SET credit_key = ?1, credit_value = ?2, display_order = ?3
                WHERE id = ?4 AND track_id = ?5
                "#,
                params![key, value, display_order, credit_id, track_id],
            )
            .context("update credit")?;
        if updated == 0 {
            return Ok(None);
        }
        let credit = conn
            .query_row(
                "SELECT id, credit_key, credit_value, display_order FROM track_credits WHERE id = ?1",
                params![credit_id],
                map_credit_row,
            )
            .context("fetch updated credit")?;
        Ok(Some(credit))
    }

    pub fn delete_credit(&self, track_id: i64, credit_id: i64) -> Result<bool> {
        let conn = self.pool.get().context("open catalog db")?;
        let deleted = conn
            .execute(
                "DELETE FROM track_credits WHERE id = ?1 AND track_id = ?2",
                params![credit_id, track_id],
            )
            .context("delete credit")?;
        Ok(deleted > 0)
    }

    pub fn list_albums(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AlbumSummary>, i64)> {
        let conn = self.pool.get().context("open catalog db")?;
        let pattern = like_pattern(search);
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM albums WHERE (?1 IS NULL OR LOWER(title) LIKE ?1)",
                params![pattern],
                |row| row.get(0),
            )
            .context("count albums")?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT al.id, al.title, al.cover_path, al.release_date,
                       (SELECT COUNT(*) FROM tracks t WHERE t.album_id = al.id)
                FROM albums al
                WHERE (?1 IS NULL OR LOWER(al.title) LIKE ?1)
                ORDER BY al.title
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .context("prepare album listing")?;
        let albums = stmt
            .query_map(params![pattern, limit, offset], map_album_row)
            .context("list albums")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((albums, total))
    }

    pub fn album_by_id(&self, album_id: i64) -> Result<Option<AlbumSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            r#"
            SELECT al.id, al.title, al.cover_path, al.release_date,
                   (SELECT COUNT(*) FROM tracks t WHERE t.album_id = al.id)
            FROM albums al
            WHERE al.id = ?1
            "#,
            params![album_id],
            map_album_row,
        )
        .optional()
        .context("fetch album")
    }

    pub fn tracks_for_album(&self, album_id: i64) -> Result<Vec<TrackSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks t LEFT JOIN albums al ON al.id = t.album_id \
                 WHERE t.album_id = ?1 ORDER BY t.track_number, t.title"
            ))
            .context("prepare album tracks")?;
        let mut tracks = stmt
            .query_map(params![album_id], map_track_row)
            .context("list album tracks")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for track in &mut tracks {
            track.artists = artists_for_track(&conn, track.id)?;
        }
        Ok(tracks)
    }

    pub fn update_album(
        &self,
        album_id: i64,
        title: &str,
        release_date: Option<&str>,
    ) -> Result<Option<AlbumSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE albums SET title = ?1, release_date = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
                params![title, release_date, album_id],
            )
            .context("update album")?;
        if updated == 0 {
            return Ok(None);
        }
        self.album_by_id(album_id)
    }

    /// Tracks keep existing with a null album_id (FK is ON DELETE SET NULL).
    /// Returns the album's cover locator for storage cleanup.
    pub fn delete_album(&self, album_id: i64) -> Result<Option<Option<String>>> {
        let conn = self.pool.get().context("open catalog db")?;
        let cover: Option<Option<String>> = conn
            .query_row(
                "SELECT cover_path FROM albums WHERE id = ?1",
                params![album_id],
                |row| row.get(0),
            )
            .optional()
            .context("fetch album cover")?;
        if cover.is_some() {
            conn.execute("DELETE FROM albums WHERE id = ?1", params![album_id])
                .context("delete album")?;
        }
        Ok(cover)
    }

    pub fn set_album_cover(&self, album_id: i64, cover_path: &str) -> Result<Option<AlbumSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE albums SET cover_path = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![cover_path, album_id],
            )
            .context("set album cover")?;
        if updated == 0 {
            return Ok(None);
        }
        self.album_by_id(album_id)
    }

    pub fn list_artists(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ArtistSummary>, i64)> {
        let conn = self.pool.get().context("open catalog db")?;
        let pattern = like_pattern(search);
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM artists WHERE (?1 IS NULL OR LOWER(name) LIKE ?1)",
                params![pattern],
                |row| row.get(0),
            )
            .context("count artists")?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT ar.id, ar.name,
                       (SELECT COUNT(*) FROM track_artists ta WHERE ta.artist_id = ar.id)
                FROM artists ar
                WHERE (?1 IS NULL OR LOWER(ar.name) LIKE ?1)
                ORDER BY ar.name
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .context("prepare artist listing")?;
        let artists = stmt
            .query_map(params![pattern, limit, offset], map_artist_row)
            .context("list artists")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((artists, total))
    }

    pub fn artist_by_id(&self, artist_id: i64) -> Result<Option<ArtistSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        conn.query_row(
            r#"
            SELECT ar.id, ar.name,
                   (SELECT COUNT(*) FROM track_artists ta WHERE ta.artist_id = ar.id)
            FROM artists ar
            WHERE ar.id = ?1
            "#,
            params![artist_id],
            map_artist_row,
        )
        .optional()
        .context("fetch artist")
    }

    pub fn tracks_for_artist(&self, artist_id: i64) -> Result<Vec<TrackSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRACK_COLUMNS} FROM tracks t LEFT JOIN albums al ON al.id = t.album_id \
                 JOIN track_artists ta ON ta.track_id = t.id \
                 WHERE ta.artist_id = ?1 ORDER BY t.created_at DESC"
            ))
            .context("prepare artist tracks")?;
        let mut tracks = stmt
            .query_map(params![artist_id], map_track_row)
            .context("list artist tracks")?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for track in &mut tracks {
            track.artists = artists_for_track(&conn, track.id)?;
        }
        Ok(tracks)
    }

    pub fn rename_artist(&self, artist_id: i64, name: &str) -> Result<Option<ArtistSummary>> {
        let conn = self.pool.get().context("open catalog db")?;
        let updated = conn
            .execute(
                "UPDATE artists SET name = ?1 WHERE id = ?2",
                params![name, artist_id],
            )
            .context("rename artist")?;
        if updated == 0 {
            return Ok(None);
        }
        self.artist_by_id(artist_id)
    }
}

fn track_by_id_inner(conn: &Connection, track_id: i64) -> Result<Option<TrackSummary>> {
    let track = conn
        .query_row(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks t LEFT JOIN albums al ON al.id = t.album_id \
                 WHERE t.id = ?1"
            ),
            params![track_id],
            map_track_row,
        )
        .optional()
        .context("fetch track")?;
    match track {
        Some(mut track) => {
            track.artists = artists_for_track(conn, track.id)?;
            Ok(Some(track))
        }
        None => Ok(None),
    }
}

fn map_album_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlbumSummary> {
    Ok(AlbumSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        cover_path: row.get(2)?,
        release_date: row.get(3)?,
        track_count: row.get(4)?,
    })
}

fn map_artist_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtistSummary> {
    Ok(ArtistSummary { id: row.get(0)?, name: row.get(1)?, track_count: row.get(2)? })
}

fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

fn track_exists(conn: &Connection, track_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM tracks WHERE id = ?1", params![track_id], |row| row.get(0))
        .optional()
        .context("check track exists")?;
    Ok(found.is_some())
}

/// Link order follows insertion order, which is how the artist list is
/// reconstructed for responses.
fn artists_for_track(conn: &Connection, track_id: i64) -> Result<Vec<ArtistRef>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT ar.id, ar.name
            FROM track_artists ta
            JOIN artists ar ON ar.id = ta.artist_id
            WHERE ta.track_id = ?1
            ORDER BY ta.rowid
            "#,
        )
        .context("prepare track artists")?;
    let artists = stmt
        .query_map(params![track_id], |row| {
            Ok(ArtistRef { id: row.get(0)?, name: row.get(1)? })
        })
        .context("list track artists")?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(artists)
}

fn upsert_artist(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO artists (name) VALUES (?1)", params![name])
        .context("upsert artist")?;
    let id: i64 = conn.query_row(
        "SELECT id FROM artists WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Existing albums only gain a cover while theirs is unset; the first
/// uploaded cover for an album title wins.
fn resolve_album(
    conn: &Connection,
    title: &str,
    cover_path: Option<&str>,
    release_date: Option<&str>,
) -> Result<i64> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO albums (title, cover_path, release_date) VALUES (?1, ?2, ?3)",
            params![title, cover_path, release_date],
        )
        .context("upsert album")?;
    if inserted == 0 {
        if let Some(cover) = cover_path {
            conn.execute(
                "UPDATE albums SET cover_path = ?1 WHERE title = ?2 AND cover_path IS NULL",
                params![cover, title],
            )
            .context("backfill album cover")?;
        }
    }
    let id: i64 = conn.query_row(
        "SELECT id FROM albums WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn link_track_artist(conn: &Connection, track_id: i64, artist_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?1, ?2)",
        params![track_id, artist_id],
    )
    .context("link track artist")?;
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            cover_path TEXT,
            release_date TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            album_id INTEGER,
            file_path TEXT NOT NULL,
            cover_path TEXT,
            lyrics_path TEXT,
            duration INTEGER,
            track_number INTEGER,
            sample_rate INTEGER,
            bit_depth INTEGER,
            file_size INTEGER,
            release_date TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS track_artists (
            track_id INTEGER NOT NULL,
            artist_id INTEGER NOT NULL,
            PRIMARY KEY (track_id, artist_id),
            FOREIGN KEY(track_id) REFERENCES tracks(id) ON DELETE CASCADE,
            FOREIGN KEY(artist_id) REFERENCES artists(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS track_credits (
            id INTEGER PRIMARY KEY,
            track_id INTEGER NOT NULL,
            credit_key TEXT NOT NULL,
            credit_value TEXT NOT NULL,
            display_order INTEGER NOT NULL,
            FOREIGN KEY(track_id) REFERENCES tracks(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_artists_name ON artists(name);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_albums_title ON albums(title);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username);
        CREATE INDEX IF NOT EXISTS idx_tracks_album_id ON tracks(album_id);
        CREATE INDEX IF NOT EXISTS idx_track_artists_artist ON track_artists(artist_id);
        CREATE INDEX IF NOT EXISTS idx_track_credits_track ON track_credits(track_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        "#,
    )
    .context("create catalog schema")?;

    let version_raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let version = version_raw.as_deref().and_then(|value| value.parse::<i32>().ok());
    if version.is_none() {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .context("insert schema version")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(title: &str, album: Option<&str>, artists: &[&str]) -> NormalizedTrack {
        NormalizedTrack {
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: album.map(|a| a.to_string()),
            track_number: Some(1),
            release_date: Some("2020-01-01".to_string()),
            duration_secs: Some(180),
            sample_rate: Some(44_100),
            bit_depth: Some(16),
            cover: None,
        }
    }

    fn ingest(
        db: &CatalogDb,
        track: &NormalizedTrack,
        cover: Option<&str>,
        credits: &[CreditEntry],
    ) -> Result<IngestedTrack> {
        db.ingest_file(&NewTrackFile {
            track,
            file_path: "/uploads/tracks/a.flac",
            cover_path: cover,
            file_size: 1024,
            credits,
        })
    }

    fn credit(key: &str, value: &str, order: i64) -> CreditEntry {
        CreditEntry {
            key: key.to_string(),
            value: value.to_string(),
            display_order: order,
        }
    }

    #[test]
    fn ingest_creates_track_with_links_and_credits() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let track = sample_track("Song", Some("Album"), &["A", "B"]);
        let credits = vec![credit("COMPOSER", "C", 0), credit("PRODUCER", "P", 1)];
        let ingested = ingest(&db, &track, None, &credits).expect("ingest");

        let stored = db.track_by_id(ingested.id).expect("fetch").expect("exists");
        assert_eq!(stored.title, "Song");
        assert_eq!(stored.album_title.as_deref(), Some("Album"));
        let names: Vec<&str> = stored.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        let credits = db.credits_for_track(ingested.id).expect("credits").expect("exists");
        assert_eq!(credits.len(), 2);
        assert_eq!(credits[0].credit_key, "COMPOSER");
    }

    #[test]
    fn duplicate_artist_names_link_once() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let track = sample_track("Song", None, &["Same", "Same"]);
        let ingested = ingest(&db, &track, None, &[]).expect("ingest");
        let stored = db.track_by_id(ingested.id).expect("fetch").expect("exists");
        assert_eq!(stored.artists.len(), 1);

        let conn = db.pool().get().expect("conn");
        let artist_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |row| row.get(0))
            .expect("count");
        assert_eq!(artist_rows, 1);
    }

    #[test]
    fn same_album_title_is_reused_across_files() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let first = ingest(&db, &sample_track("One", Some("Shared"), &["A"]), None, &[])
            .expect("ingest one");
        let second = ingest(&db, &sample_track("Two", Some("Shared"), &["B"]), None, &[])
            .expect("ingest two");

        let one = db.track_by_id(first.id).expect("fetch").expect("exists");
        let two = db.track_by_id(second.id).expect("fetch").expect("exists");
        assert_eq!(one.album_id, two.album_id);

        let conn = db.pool().get().expect("conn");
        let albums: i64 = conn
            .query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))
            .expect("count");
        assert_eq!(albums, 1);
    }

    #[test]
    fn album_cover_is_backfilled_only_while_unset() {
        let db = CatalogDb::open_in_memory().expect("open db");
        ingest(&db, &sample_track("One", Some("Shared"), &["A"]), None, &[]).expect("no cover");
        ingest(&db, &sample_track("Two", Some("Shared"), &["A"]), Some("/uploads/covers/x.jpg"), &[])
            .expect("first cover");
        ingest(&db, &sample_track("Three", Some("Shared"), &["A"]), Some("/uploads/covers/y.jpg"), &[])
            .expect("second cover");

        let conn = db.pool().get().expect("conn");
        let cover: Option<String> = conn
            .query_row("SELECT cover_path FROM albums WHERE title = 'Shared'", [], |row| {
                row.get(0)
            })
            .expect("fetch cover");
        assert_eq!(cover.as_deref(), Some("/uploads/covers/x.jpg"));
    }

    #[test]
    fn failed_credit_insert_rolls_back_the_whole_file() {
        let db = CatalogDb::open_in_memory().expect("open db");
        {
            let conn = db.pool().get().expect("conn");
            conn.execute_batch("DROP TABLE track_credits;").expect("drop");
        }
        let track = sample_track("Song", Some("Album"), &["A"]);
        let result = ingest(&db, &track, None, &[credit("COMPOSER", "C", 0)]);
        assert!(result.is_err());

        let conn = db.pool().get().expect("conn");
        let tracks: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .expect("count tracks");
        let albums: i64 = conn
            .query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))
            .expect("count albums");
        let artists: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |row| row.get(0))
            .expect("count artists");
        assert_eq!((tracks, albums, artists), (0, 0, 0));
    }

    #[test]
    fn update_track_replaces_artists_and_reassigns_album() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let ingested = ingest(&db, &sample_track("Song", Some("Old"), &["A"]), None, &[])
            .expect("ingest");

        let updated = db
            .update_track(
                ingested.id,
                Some("Renamed"),
                Some(&["B".to_string(), "C".to_string()]),
                Some("New Album"),
            )
            .expect("update");
        assert!(updated);

        let stored = db.track_by_id(ingested.id).expect("fetch").expect("exists");
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.album_title.as_deref(), Some("New Album"));
        let names: Vec<&str> = stored.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);

        assert!(!db.update_track(999, Some("x"), None, None).expect("missing"));
    }

    #[test]
    fn delete_track_cascades_credits_and_links() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let ingested = ingest(
            &db,
            &sample_track("Song", Some("Album"), &["A"]),
            None,
            &[credit("COMPOSER", "C", 0)],
        )
        .expect("ingest");

        db.set_track_lyrics(ingested.id, Some("/uploads/lyrics/a.lrc")).expect("set lyrics");

        let paths = db.delete_track(ingested.id).expect("delete").expect("existed");
        assert_eq!(paths.0, "/uploads/tracks/a.flac");
        assert_eq!(paths.2.as_deref(), Some("/uploads/lyrics/a.lrc"));

        let conn = db.pool().get().expect("conn");
        let credits: i64 = conn
            .query_row("SELECT COUNT(*) FROM track_credits", [], |row| row.get(0))
            .expect("count credits");
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM track_artists", [], |row| row.get(0))
            .expect("count links");
        assert_eq!((credits, links), (0, 0));
    }

    #[test]
    fn lyrics_path_is_set_and_cleared() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let ingested = ingest(&db, &sample_track("Song", None, &["A"]), None, &[])
            .expect("ingest");

        assert_eq!(db.track_lyrics_path(ingested.id).expect("fetch"), Some(None));
        assert!(db.set_track_lyrics(ingested.id, Some("/uploads/lyrics/x.lrc")).expect("set"));
        assert_eq!(
            db.track_lyrics_path(ingested.id).expect("fetch"),
            Some(Some("/uploads/lyrics/x.lrc".to_string()))
        );
        let stored = db.track_by_id(ingested.id).expect("fetch").expect("exists");
        assert_eq!(stored.lyrics_path.as_deref(), Some("/uploads/lyrics/x.lrc"));

        assert!(db.set_track_lyrics(ingested.id, None).expect("clear"));
        assert_eq!(db.track_lyrics_path(ingested.id).expect("fetch"), Some(None));

        assert!(db.track_lyrics_path(999).expect("missing").is_none());
        assert!(!db.set_track_lyrics(999, Some("/uploads/lyrics/x.lrc")).expect("missing"));
    }

    #[test]
    fn list_tracks_applies_search_and_filters() {
        let db = CatalogDb::open_in_memory().expect("open db");
        let mut hires = sample_track("Hi-Res Song", Some("Album"), &["The Composer"]);
        hires.sample_rate = Some(96_000);
        hires.release_date = Some("2015-01-01".to_string());
        ingest(&db, &hires, None, &[]).expect("ingest hires");
        ingest(&db, &sample_track("Plain Song", None, &["Somebody"]), None, &[])
            .expect("ingest plain");

        let filter = TrackFilter {
            sample_rate_min: Some(48_000),
            limit: 20,
            ..TrackFilter::default()
        };
        let (tracks, total) = db.list_tracks(&filter).expect("filter by rate");
        assert_eq!(total, 1);
        assert_eq!(tracks[0].title, "Hi-Res Song");

        let filter = TrackFilter {
            search: Some("composer".to_string()),
            limit: 20,
            ..TrackFilter::default()
        };
        let (tracks, total) = db.list_tracks(&filter).expect("search by artist");
        assert_eq!(total, 1);
        assert_eq!(tracks[0].title, "Hi-Res Song");

        let filter = TrackFilter {
            year_from: Some(2016),
            limit: 20,
            ..TrackFilter::default()
        };
        let (_, total) = db.list_tracks(&filter).expect("filter by year");
        assert_eq!(total, 0);
    }

    #[test]
    fn list_tracks_sorts_by_title_ascending() {
        let db = CatalogDb::open_in_memory().expect("open db");
        ingest(&db, &sample_track("Bravo", None, &["A"]), None, &[]).expect("b");
        ingest(&db, &sample_track("Alpha", None, &["A"]), None, &[]).expect("a");

        let filter = TrackFilter {
            sort_by: TrackSort::Title,
            sort_dir: SortDir::Asc,
            limit: 20,
            ..TrackFilter::default()
        };
        let (tracks, _) = db.list_tracks(&filter).expect("sorted");
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Bravo"]);
    }
}
